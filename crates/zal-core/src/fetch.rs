//! Reads the current Zabbix state for the configured hosts into a graph of
//! [`State::Old`](crate::graph::State::Old) nodes.

use crate::config::Config;
use crate::error::{Result, ResultExt, ZalError};
use crate::graph::{AppNode, Graph, GroupNode, HostNode, ItemNode, State, TriggerNode};
use crate::zabbix::resource::get;
use crate::zabbix::types::{Application, Host, HostGroup, Item, Trigger};
use crate::zabbix::RpcClient;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

/// Fetch the server's view of every configured host group and host, with
/// each host's applications, items and triggers. Every node is [`State::Old`].
pub fn fetch_remote(rpc: &mut dyn RpcClient, config: &Config) -> Result<Graph> {
    let host_names = config.host_names();
    if host_names.is_empty() {
        return Err(ZalError::Config("no hosts are defined".into()));
    }
    let group_names = config.host_group_names();
    let mut graph = Graph::new();

    if !group_names.is_empty() {
        let groups: Vec<HostGroup> = get(
            rpc,
            json!({ "output": "extend", "filter": { "name": group_names } }),
        )
        .with_op(|| format!("getting host groups {group_names:?}"))?;
        for group in groups {
            graph.add_group(GroupNode::new(State::Old, group));
        }
    }

    let hosts: Vec<Host> = get(
        rpc,
        json!({
            "output": "extend",
            "selectInventory": ["tag", "deployment_status"],
            "selectGroups": ["groupid", "name"],
            "filter": { "host": host_names },
        }),
    )
    .with_op(|| format!("getting hosts {host_names:?}"))?;

    for host in hosts {
        let node = fetch_host(rpc, host)?;
        tracing::debug!(
            host = node.name(),
            applications = node.applications.len(),
            items = node.items.len(),
            triggers = node.triggers.len(),
            "fetched remote host"
        );
        graph.add_host(node);
    }
    Ok(graph)
}

fn fetch_host(rpc: &mut dyn RpcClient, mut host: Host) -> Result<HostNode> {
    let hostid = host.hostid.clone().ok_or_else(|| ZalError::MissingId {
        kind: "host",
        key: host.host.clone(),
    })?;
    let name = host.host.clone();
    let op = |what: &str| format!("getting {what} of host '{name}'");

    // The server adds the owner id to the inventory; it is not ours to compare.
    host.inventory.remove("hostid");
    let group_names: BTreeSet<String> = host.groups.iter().filter_map(|g| g.name.clone()).collect();
    let mut node = HostNode::new(State::Old, host, group_names);

    let apps: Vec<Application> = get(rpc, json!({ "output": "extend", "hostids": hostid }))
        .with_op(|| op("applications"))?;
    let app_names: HashMap<String, String> = apps
        .iter()
        .filter_map(|a| Some((a.applicationid.clone()?, a.name.clone())))
        .collect();
    for app in apps {
        node.add_application(AppNode::new(State::Old, app));
    }

    let items: Vec<Item> = get(
        rpc,
        json!({
            "output": "extend",
            "hostids": hostid,
            "selectApplications": ["applicationid"],
        }),
    )
    .with_op(|| op("items"))?;
    for item in items {
        let names = item
            .applications
            .iter()
            .filter_map(|id| app_names.get(id).cloned())
            .collect();
        node.add_item(ItemNode::new(State::Old, item, names));
    }

    let triggers: Vec<Trigger> = get(
        rpc,
        json!({
            "output": "extend",
            "hostids": hostid,
            "expandExpression": true,
            "selectTags": "extend",
        }),
    )
    .with_op(|| op("triggers"))?;
    for trigger in triggers {
        node.add_trigger(TriggerNode::new(State::Old, trigger));
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zabbix::testing::ScriptedRpc;

    fn config() -> Config {
        Config::parse("hosts:\n  - name: web1\n    hostGroups: [prod]\n").unwrap()
    }

    fn remote_web1() -> ScriptedRpc {
        ScriptedRpc::new()
            .on("hostgroup.get", json!([{ "groupid": "7", "name": "prod" }]))
            .on(
                "host.get",
                json!([{
                    "hostid": "10105",
                    "host": "web1",
                    "name": "web1",
                    "status": "0",
                    "inventory_mode": "0",
                    "inventory": { "hostid": "10105", "tag": "x", "deployment_status": "0" },
                    "groups": [{ "groupid": "7", "name": "prod" }]
                }]),
            )
            .on(
                "application.get",
                json!([{ "applicationid": "400", "hostid": "10105", "name": "prometheus" }]),
            )
            .on(
                "item.get",
                json!([{
                    "itemid": "23",
                    "hostid": "10105",
                    "key_": "prometheus.highcpu",
                    "name": "HighCPU",
                    "type": "2",
                    "value_type": "3",
                    "history": "7d",
                    "trends": "365d",
                    "applications": [{ "applicationid": "400" }]
                }]),
            )
            .on(
                "trigger.get",
                json!([{
                    "triggerid": "301",
                    "description": "HighCPU",
                    "expression": "last(/web1/prometheus.highcpu)<>0",
                    "priority": "4",
                    "manual_close": "1",
                    "tags": [{ "tag": "team", "value": "ops" }]
                }]),
            )
    }

    #[test]
    fn remote_entities_are_old_and_carry_ids() {
        let mut rpc = remote_web1();
        let graph = fetch_remote(&mut rpc, &config()).unwrap();

        assert_eq!(graph.host_groups["prod"].state, State::Old);
        let host = graph.host("web1").unwrap();
        assert_eq!(host.state, State::Old);
        assert_eq!(host.record.hostid.as_deref(), Some("10105"));
        assert!(!host.record.inventory.contains_key("hostid"));
        assert!(host.group_names.contains("prod"));

        let item = &host.items["prometheus.highcpu"];
        assert_eq!(item.state, State::Old);
        assert!(item.app_names.contains("prometheus"));
        assert_eq!(
            host.triggers["last(/web1/prometheus.highcpu)<>0"].record.triggerid.as_deref(),
            Some("301")
        );
    }

    #[test]
    fn queries_filter_by_configured_names() {
        let mut rpc = remote_web1();
        fetch_remote(&mut rpc, &config()).unwrap();

        assert_eq!(
            rpc.methods(),
            vec!["hostgroup.get", "host.get", "application.get", "item.get", "trigger.get"]
        );
        assert_eq!(rpc.calls[0].1["filter"]["name"], json!(["prod"]));
        assert_eq!(rpc.calls[1].1["filter"]["host"], json!(["web1"]));
        assert_eq!(rpc.calls[4].1["expandExpression"], json!(true));
    }

    #[test]
    fn unknown_host_fetches_nothing_more() {
        let mut rpc = ScriptedRpc::new();
        let graph = fetch_remote(&mut rpc, &config()).unwrap();
        assert!(graph.hosts.is_empty());
        assert_eq!(rpc.methods(), vec!["hostgroup.get", "host.get"]);
    }

    #[test]
    fn no_hosts_is_a_config_error() {
        let mut rpc = ScriptedRpc::new();
        let err = fetch_remote(&mut rpc, &Config::default()).unwrap_err();
        assert!(matches!(err, ZalError::Config(_)));
        assert!(rpc.calls.is_empty());
    }

    #[test]
    fn remote_failure_aborts_with_context() {
        let mut rpc = ScriptedRpc::new().fail("host.get", "No permissions.");
        let err = fetch_remote(&mut rpc, &config()).unwrap_err();
        assert!(err.to_string().starts_with("getting hosts"));
        assert!(matches!(err.root(), ZalError::Api { .. }));
    }
}
