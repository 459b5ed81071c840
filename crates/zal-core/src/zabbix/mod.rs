//! Zabbix JSON-RPC client: transport, record types and per-entity operations.

pub mod resource;
pub mod rpc;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use resource::Resource;
pub use rpc::{RpcClient, ZabbixClient};
pub use types::{Application, GroupRef, Host, HostGroup, HostInterface, Item, Priority, Tag, Trigger};
