use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use zal_core::apply::ApplySummary;
use zal_core::config::Config;
use zal_core::plan::Plan;
use zal_core::provisioner::Provisioner;

#[derive(Args, Debug)]
pub struct ProvArgs {
    /// Provisioner config file
    #[arg(long, short = 'c', env = "ZAL_CONFIG", default_value = "config.yml")]
    pub config: PathBuf,

    /// Zabbix JSON-RPC endpoint, e.g. http://zabbix/api_jsonrpc.php
    #[arg(long, env = "ZABBIX_URL")]
    pub url: Option<String>,

    #[arg(long, env = "ZABBIX_USER")]
    pub user: Option<String>,

    #[arg(long, env = "ZABBIX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Item key prefix
    #[arg(long)]
    pub key_prefix: Option<String>,

    /// Prometheus base URL used for trigger links
    #[arg(long, env = "PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    /// Print the changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running, one pass every N seconds
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

impl ProvArgs {
    /// Config file with command-line and environment overrides applied.
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(prefix) = &self.key_prefix {
            config.key_prefix = prefix.clone();
        }
        if let Some(url) = &self.prometheus_url {
            config.prometheus_url = Some(url.clone());
        }
        Ok(config)
    }
}

pub fn run(args: ProvArgs, json: bool) -> anyhow::Result<()> {
    let config = args.load_config()?;
    super::report_config(&config.validate())?;

    let mut prov = Provisioner::connect(config).context("connecting to zabbix")?;

    if args.dry_run {
        let plan = prov.plan()?;
        return print_plan(&plan, json);
    }

    let Some(secs) = args.interval else {
        let summary = prov.run_once()?;
        return print_summary(&summary, json);
    };

    tracing::info!(interval = secs, "provisioning continuously");
    loop {
        match prov.poll_once() {
            Ok(summary) => tracing::info!(changes = summary.changes(), "provisioning pass finished"),
            Err(e) => tracing::warn!("provisioning pass failed: {e:#}"),
        }
        std::thread::sleep(Duration::from_secs(secs));
    }
}

fn print_plan(plan: &Plan, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(plan);
    }
    if plan.is_empty() {
        println!("Zabbix is up to date.");
        return Ok(());
    }
    let rows = plan
        .changes
        .iter()
        .map(|c| {
            vec![
                c.action.to_string(),
                c.kind.to_string(),
                c.host.clone().unwrap_or_else(|| "-".to_string()),
                c.key.clone(),
            ]
        })
        .collect();
    print_table(&["ACTION", "KIND", "HOST", "KEY"], rows);
    Ok(())
}

fn print_summary(summary: &ApplySummary, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(summary);
    }
    let rows = summary
        .kinds()
        .iter()
        .map(|(kind, k)| {
            vec![
                kind.to_string(),
                k.created.to_string(),
                k.updated.to_string(),
                k.deleted.to_string(),
                k.unchanged.to_string(),
            ]
        })
        .collect();
    print_table(&["KIND", "CREATED", "UPDATED", "DELETED", "UNCHANGED"], rows);
    Ok(())
}
