pub mod apply;
pub mod builder;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod plan;
pub mod provisioner;
pub mod reconcile;
pub mod rules;
pub mod zabbix;

pub use error::{Result, ZalError};
