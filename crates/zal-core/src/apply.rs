//! Dependency-ordered writes for a merged graph.

use crate::error::{Result, ResultExt};
use crate::graph::Graph;
use crate::reconcile::{clear_ids, propagate_ids, Buckets};
use crate::zabbix::resource::{self, Resource};
use crate::zabbix::types::{Application, Host, HostGroup, Item, Trigger};
use crate::zabbix::RpcClient;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl KindSummary {
    fn tally<T>(&mut self, buckets: &Buckets<T>) {
        self.unchanged += buckets.equal.len();
    }

    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// What one apply pass did, per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub host_groups: KindSummary,
    pub hosts: KindSummary,
    pub applications: KindSummary,
    pub items: KindSummary,
    pub triggers: KindSummary,
}

impl ApplySummary {
    pub fn changes(&self) -> usize {
        self.kinds().iter().map(|(_, k)| k.changes()).sum()
    }

    pub fn kinds(&self) -> [(&'static str, KindSummary); 5] {
        [
            ("host groups", self.host_groups),
            ("hosts", self.hosts),
            ("applications", self.applications),
            ("items", self.items),
            ("triggers", self.triggers),
        ]
    }
}

fn create<T: Resource>(rpc: &mut dyn RpcClient, records: &[T], scope: &str) -> Result<Vec<String>> {
    if !records.is_empty() {
        tracing::info!(scope, count = records.len(), "creating {}s", T::KIND);
    }
    resource::create(rpc, records).with_op(|| format!("{scope}creating {}s", T::KIND))
}

fn update<T: Resource>(rpc: &mut dyn RpcClient, records: &[T], scope: &str) -> Result<usize> {
    if !records.is_empty() {
        tracing::info!(scope, count = records.len(), "updating {}s", T::KIND);
    }
    resource::update(rpc, records).with_op(|| format!("{scope}updating {}s", T::KIND))?;
    Ok(records.len())
}

fn delete<T: Resource>(rpc: &mut dyn RpcClient, records: &[T], scope: &str) -> Result<usize> {
    let ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.remote_id().map(str::to_string))
        .collect();
    if !ids.is_empty() {
        tracing::info!(scope, count = ids.len(), "deleting {}s", T::KIND);
    }
    resource::delete::<T>(rpc, &ids).with_op(|| format!("{scope}deleting {}s", T::KIND))
}

/// Write `graph` to the server in dependency order.
///
/// Host groups and hosts first, then per host (by name): applications,
/// deletions of triggers before their items, updates, and finally new items
/// before the triggers that reference them. The first failure stops the pass.
pub fn apply(rpc: &mut dyn RpcClient, graph: &mut Graph) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    let groups = graph.group_buckets()?;
    let ids = create::<HostGroup>(rpc, &groups.new, "")?;
    propagate_ids(&mut graph.host_groups, &groups.new, ids)?;
    summary.host_groups.created = groups.new.len();
    summary.host_groups.tally(&groups);

    let hosts = graph.host_buckets()?;
    let ids = create::<Host>(rpc, &hosts.new, "")?;
    propagate_ids(&mut graph.hosts, &hosts.new, ids)?;
    summary.hosts.created = hosts.new.len();
    summary.hosts.updated = update::<Host>(rpc, &hosts.updated, "")?;
    summary.hosts.tally(&hosts);

    for (name, host) in graph.hosts.iter_mut() {
        if host.state == crate::graph::State::Old {
            tracing::debug!(host = %name, "host is not configured; leaving it alone");
            continue;
        }
        let scope = format!("host '{name}': ");

        let apps = host.application_buckets().with_op(|| scope.clone())?;
        summary.applications.deleted += delete::<Application>(rpc, &apps.old, &scope)?;
        clear_ids(&mut host.applications, &apps.old);
        let ids = create::<Application>(rpc, &apps.new, &scope)?;
        propagate_ids(&mut host.applications, &apps.new, ids)?;
        summary.applications.created += apps.new.len();
        summary.applications.tally(&apps);

        // Items resolve application ids, so bucket them after applications exist.
        let items = host.item_buckets().with_op(|| scope.clone())?;
        let triggers = host.trigger_buckets()?;

        summary.triggers.deleted += delete::<Trigger>(rpc, &triggers.old, &scope)?;
        clear_ids(&mut host.triggers, &triggers.old);
        summary.items.deleted += delete::<Item>(rpc, &items.old, &scope)?;
        clear_ids(&mut host.items, &items.old);

        summary.items.updated += update::<Item>(rpc, &items.updated, &scope)?;
        summary.triggers.updated += update::<Trigger>(rpc, &triggers.updated, &scope)?;

        let ids = create::<Item>(rpc, &items.new, &scope)?;
        propagate_ids(&mut host.items, &items.new, ids)?;
        summary.items.created += items.new.len();
        let ids = create::<Trigger>(rpc, &triggers.new, &scope)?;
        propagate_ids(&mut host.triggers, &triggers.new, ids)?;
        summary.triggers.created += triggers.new.len();

        summary.items.tally(&items);
        summary.triggers.tally(&triggers);
    }

    tracing::info!(changes = summary.changes(), "apply finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_desired;
    use crate::config::Config;
    use crate::error::ZalError;
    use crate::graph::State;
    use crate::rules::AlertRule;
    use crate::zabbix::testing::ScriptedRpc;
    use serde_json::json;
    use std::path::PathBuf;

    fn config() -> Config {
        Config::parse("hosts:\n  - name: web1\n    hostGroups: [prod]\n    tag: x\n").unwrap()
    }

    fn rules(names: &[&str]) -> Vec<AlertRule> {
        names
            .iter()
            .map(|n| AlertRule {
                name: n.to_string(),
                expr: "up == 0".into(),
                source: PathBuf::from("rules.yml"),
                ..Default::default()
            })
            .collect()
    }

    fn desired(names: &[&str]) -> Graph {
        desired_for(&config(), names)
    }

    fn desired_for(cfg: &Config, names: &[&str]) -> Graph {
        let set = rules(names);
        build_desired(cfg, |_| Ok(set.clone())).unwrap()
    }

    /// Marks the group and host as already present on the server.
    fn existing_host(graph: &mut Graph) -> &mut crate::graph::HostNode {
        for g in graph.host_groups.values_mut() {
            g.state = State::Equal;
            g.record.groupid = Some("7".into());
        }
        let host = graph.hosts.get_mut("web1").unwrap();
        host.state = State::Equal;
        host.record.hostid = Some("10105".into());
        host
    }

    #[test]
    fn fresh_graph_is_created_in_dependency_order() {
        let mut graph = desired(&["HighCPU"]);
        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();

        assert_eq!(
            rpc.methods(),
            vec!["hostgroup.create", "host.create", "item.create", "trigger.create"]
        );
        assert_eq!(summary.host_groups.created, 1);
        assert_eq!(summary.hosts.created, 1);
        assert_eq!(summary.items.created, 1);
        assert_eq!(summary.triggers.created, 1);

        // The host create carries the freshly created group id.
        let group_id = graph.host_groups["prod"].record.groupid.clone().unwrap();
        assert_eq!(rpc.calls[1].1[0]["groups"], json!([{ "groupid": group_id }]));
        // Items are stamped with the new host id.
        let host_id = graph.hosts["web1"].record.hostid.clone().unwrap();
        assert_eq!(rpc.calls[2].1[0]["hostid"], json!(host_id));
        assert!(graph.hosts["web1"].items["prometheus.highcpu"].record.itemid.is_some());
    }

    #[test]
    fn equal_graph_issues_no_calls() {
        let mut graph = desired(&["HighCPU"]);
        for g in graph.host_groups.values_mut() {
            g.state = State::Equal;
            g.record.groupid = Some("7".into());
        }
        for h in graph.hosts.values_mut() {
            h.state = State::Equal;
            h.record.hostid = Some("10105".into());
            for i in h.items.values_mut() {
                i.state = State::Equal;
            }
            for t in h.triggers.values_mut() {
                t.state = State::Equal;
            }
        }

        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();
        assert!(rpc.calls.is_empty());
        assert_eq!(summary.changes(), 0);
        assert_eq!(summary.items.unchanged, 1);
    }

    #[test]
    fn short_item_create_aborts_before_triggers() {
        let mut graph = desired(&["A", "B", "C"]);
        let mut rpc = ScriptedRpc::new().on("item.create", json!({ "itemids": ["1", "2"] }));

        let err = apply(&mut rpc, &mut graph).unwrap_err();
        assert!(matches!(
            err.root(),
            ZalError::CountMismatch { expected: 3, got: 2, .. }
        ));
        assert!(err.to_string().contains("host 'web1'"));
        assert!(!rpc.methods().contains(&"trigger.create"));
    }

    #[test]
    fn stale_children_are_deleted_triggers_first() {
        let mut graph = desired(&[]);
        let host = graph.hosts.get_mut("web1").unwrap();
        host.record.hostid = Some("10105".into());
        host.state = State::Equal;
        host.add_item(crate::graph::ItemNode::new(
            State::Old,
            Item {
                itemid: Some("23".into()),
                hostid: "10105".into(),
                key: "prometheus.gone".into(),
                name: "Gone".into(),
                item_type: 2,
                value_type: 3,
                description: String::new(),
                history: String::new(),
                trends: String::new(),
                trapper_hosts: String::new(),
                applications: Vec::new(),
            },
            Default::default(),
        ));
        host.add_trigger(crate::graph::TriggerNode::new(
            State::Old,
            Trigger {
                triggerid: Some("301".into()),
                description: "Gone".into(),
                expression: "last(/web1/prometheus.gone)<>0".into(),
                comments: String::new(),
                priority: Default::default(),
                url: String::new(),
                manual_close: 1,
                tags: Vec::new(),
            },
        ));

        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();

        let writes = rpc.writes();
        assert_eq!(writes, vec!["hostgroup.create", "trigger.delete", "item.delete"]);
        assert_eq!(rpc.calls[1].1, json!(["301"]));
        assert_eq!(summary.items.deleted, 1);
        assert_eq!(summary.triggers.deleted, 1);
        let host = &graph.hosts["web1"];
        assert!(host.items["prometheus.gone"].record.itemid.is_none());
    }

    #[test]
    fn unconfigured_hosts_are_left_alone() {
        let mut graph = Graph::new();
        graph.add_host(crate::graph::HostNode::new(
            State::Old,
            Host {
                hostid: Some("1".into()),
                host: "legacy".into(),
                name: "legacy".into(),
                status: 0,
                inventory_mode: 0,
                inventory: Default::default(),
                groups: Vec::new(),
                interfaces: Vec::new(),
            },
            Default::default(),
        ));

        let mut rpc = ScriptedRpc::new();
        apply(&mut rpc, &mut graph).unwrap();
        assert!(rpc.calls.is_empty());
    }

    #[test]
    fn new_application_ids_reach_item_create() {
        let cfg = Config::parse(
            "hosts:\n  - name: web1\n    hostGroups: [prod]\n    itemDefaultApplication: prometheus\n",
        )
        .unwrap();
        let mut graph = desired_for(&cfg, &["HighCPU"]);
        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();

        assert_eq!(
            rpc.methods(),
            vec![
                "hostgroup.create",
                "host.create",
                "application.create",
                "item.create",
                "trigger.create"
            ]
        );
        assert_eq!(rpc.calls[2].1, json!([{ "hostid": "1002", "name": "prometheus" }]));
        assert_eq!(rpc.calls[3].1[0]["applications"], json!(["1003"]));
        assert_eq!(
            graph.hosts["web1"].applications["prometheus"].record.applicationid.as_deref(),
            Some("1003")
        );
        assert_eq!(summary.applications.created, 1);
    }

    #[test]
    fn stale_application_is_deleted_first() {
        let mut graph = desired(&[]);
        let host = existing_host(&mut graph);
        host.add_application(crate::graph::AppNode::new(
            State::Old,
            Application {
                applicationid: Some("400".into()),
                hostid: "10105".into(),
                name: "legacy".into(),
            },
        ));

        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();

        assert_eq!(rpc.writes(), vec!["application.delete"]);
        assert_eq!(rpc.calls[0].1, json!(["400"]));
        assert_eq!(summary.applications.deleted, 1);
        assert!(graph.hosts["web1"].applications["legacy"].record.applicationid.is_none());
    }

    #[test]
    fn item_updates_precede_trigger_updates() {
        let mut graph = desired(&["HighCPU"]);
        let host = existing_host(&mut graph);
        for i in host.items.values_mut() {
            i.state = State::Updated;
            i.record.itemid = Some("23".into());
        }
        for t in host.triggers.values_mut() {
            t.state = State::Updated;
            t.record.triggerid = Some("301".into());
        }

        let mut rpc = ScriptedRpc::new();
        let summary = apply(&mut rpc, &mut graph).unwrap();

        assert_eq!(rpc.writes(), vec!["item.update", "trigger.update"]);
        assert_eq!(rpc.calls[0].1[0]["itemid"], "23");
        assert_eq!(rpc.calls[0].1[0]["hostid"], "10105");
        assert_eq!(rpc.calls[1].1[0]["triggerid"], "301");
        assert_eq!(summary.items.updated, 1);
        assert_eq!(summary.triggers.updated, 1);
    }
}
