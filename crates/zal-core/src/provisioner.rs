//! One provisioning pass: build, fetch, merge, apply.

use crate::apply::{apply, ApplySummary};
use crate::builder::build_desired;
use crate::config::{Config, HostConfig};
use crate::error::{Result, ResultExt};
use crate::fetch::fetch_remote;
use crate::graph::Graph;
use crate::plan::Plan;
use crate::rules::{self, AlertRule};
use crate::zabbix::{RpcClient, ZabbixClient};

/// One provisioning target: a config plus an authenticated transport.
///
/// Every pass rebuilds the desired and remote graphs from scratch.
pub struct Provisioner<R: RpcClient> {
    rpc: R,
    config: Config,
}

impl Provisioner<ZabbixClient> {
    /// Log in to the configured API.
    pub fn connect(config: Config) -> Result<Self> {
        let mut client = ZabbixClient::new(config.url.clone())?;
        client.login(&config.user, &config.password)?;
        tracing::info!(url = %config.url, hosts = config.hosts.len(), "connected to zabbix");
        Ok(Self::new(client, config))
    }

    pub fn relogin(&mut self) -> Result<()> {
        self.rpc.login(&self.config.user, &self.config.password)
    }

    /// One pass of a polling loop. An expired session is renewed before the
    /// pass's error is returned.
    pub fn poll_once(&mut self) -> Result<ApplySummary> {
        let result = self.run_once();
        if let Err(e) = &result {
            if e.is_session_expired() {
                tracing::info!("zabbix session expired; logging in again");
                self.relogin().with_op(|| "renewing zabbix session")?;
            }
        }
        result
    }
}

impl<R: RpcClient> Provisioner<R> {
    pub fn new(rpc: R, config: Config) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn desired(&self) -> Result<Graph> {
        build_desired(&self.config, load_host_rules)
    }

    /// Desired graph merged with the server's current state.
    pub fn reconcile(&mut self) -> Result<Graph> {
        let mut graph = self.desired()?;
        let remote = fetch_remote(&mut self.rpc, &self.config).with_op(|| "fetching zabbix state")?;
        graph.merge(remote);
        Ok(graph)
    }

    pub fn plan(&mut self) -> Result<Plan> {
        Ok(Plan::from_graph(&self.reconcile()?))
    }

    pub fn run_once(&mut self) -> Result<ApplySummary> {
        let mut graph = self.reconcile()?;
        let summary = apply(&mut self.rpc, &mut graph).with_op(|| "applying changes")?;
        for (kind, counts) in summary.kinds() {
            if counts.changes() > 0 {
                tracing::info!(
                    kind,
                    created = counts.created,
                    updated = counts.updated,
                    deleted = counts.deleted,
                    "applied"
                );
            }
        }
        Ok(summary)
    }
}

/// A host without an alerts path simply has no rules.
pub fn load_host_rules(host: &HostConfig) -> Result<Vec<AlertRule>> {
    if host.alerts_dir.as_os_str().is_empty() {
        return Ok(Vec::new());
    }
    let rules = rules::load(&host.alerts_dir)?;
    tracing::info!(host = %host.name, rules = rules.len(), "loaded prometheus rules");
    Ok(rules)
}
