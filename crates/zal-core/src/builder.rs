//! Desired-state construction from host configs and alerting rules.

use crate::config::{Config, HostConfig};
use crate::error::{Result, ResultExt, ZalError};
use crate::graph::{AppNode, Graph, GroupNode, HostNode, ItemNode, State, TriggerNode};
use crate::rules::{self, AlertRule};
use crate::zabbix::types::{
    Application, Host, HostGroup, HostInterface, Item, Priority, Tag, Trigger, HOST_MONITORED,
    INVENTORY_MANUAL, ITEM_TYPE_TRAPPER, VALUE_TYPE_UNSIGNED,
};
use std::collections::{BTreeMap, BTreeSet};

pub const ANN_APPLICATIONS: &str = "zabbix_applications";
pub const ANN_DESCRIPTION: &str = "zabbix_description";
pub const ANN_HISTORY: &str = "zabbix_history";
pub const ANN_TRENDS: &str = "zabbix_trend";
pub const ANN_TRAPPER_HOSTS: &str = "zabbix_trapper_hosts";
pub const ANN_TRIGGER_DESCRIPTION: &str = "zabbix_trigger_description";
pub const ANN_TRIGGER_NODATA: &str = "zabbix_trigger_nodata";

/// Zabbix rejects trigger URLs of 255 characters or more.
const MAX_TRIGGER_URL: usize = 255;

pub struct Builder<'a> {
    key_prefix: &'a str,
    prometheus_url: Option<&'a str>,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            key_prefix: &config.key_prefix,
            prometheus_url: config
                .prometheus_url
                .as_deref()
                .map(|u| u.trim_end_matches('/'))
                .filter(|u| !u.is_empty()),
        }
    }

    pub fn item_key(&self, rule_name: &str) -> String {
        item_key(self.key_prefix, rule_name)
    }

    /// Add `host` with one item and trigger per rule. Nothing is added when
    /// the rule set carries duplicate names.
    pub fn add_host(&self, graph: &mut Graph, host: &HostConfig, rules: &[AlertRule]) -> Result<()> {
        rules::ensure_unique(rules)?;

        let mut node = HostNode::new(
            State::New,
            host_record(host),
            host.host_groups.iter().cloned().collect(),
        );
        for name in &host.host_groups {
            graph.add_group(GroupNode::new(
                State::New,
                HostGroup {
                    groupid: None,
                    name: name.clone(),
                },
            ));
        }

        let tags: Vec<Tag> = host
            .trigger_tags
            .iter()
            .map(|(tag, value)| Tag {
                tag: tag.clone(),
                value: value.clone(),
            })
            .collect();

        for rule in rules {
            let key = self.item_key(&rule.name);
            let app_names = application_names(rule, host);
            for app in &app_names {
                node.add_application(AppNode::new(
                    State::New,
                    Application {
                        applicationid: None,
                        hostid: String::new(),
                        name: app.clone(),
                    },
                ));
            }
            node.add_item(ItemNode::new(State::New, self.item(rule, host, &key), app_names));

            let trigger = self.trigger(rule, &host.name, &key, &tags)?;
            if let Some(secs) = rule.annotation(ANN_TRIGGER_NODATA).map(str::trim) {
                if !secs.is_empty() {
                    node.add_trigger(TriggerNode::new(
                        State::New,
                        nodata_trigger(&trigger, &host.name, &key, secs),
                    ));
                }
            }
            node.add_trigger(TriggerNode::new(State::New, trigger));
        }

        tracing::info!(
            host = %host.name,
            rules = rules.len(),
            items = node.items.len(),
            triggers = node.triggers.len(),
            "built desired host"
        );
        graph.add_host(node);
        Ok(())
    }

    fn item(&self, rule: &AlertRule, host: &HostConfig, key: &str) -> Item {
        let pick = |ann: &str, default: &str| rule.annotation(ann).unwrap_or(default).to_string();
        Item {
            itemid: None,
            hostid: String::new(),
            key: key.to_string(),
            name: rule.name.clone(),
            item_type: ITEM_TYPE_TRAPPER,
            value_type: VALUE_TYPE_UNSIGNED,
            description: pick(ANN_DESCRIPTION, ""),
            history: pick(ANN_HISTORY, &host.item_default_history),
            trends: pick(ANN_TRENDS, &host.item_default_trends),
            trapper_hosts: pick(ANN_TRAPPER_HOSTS, &host.item_default_trapper_hosts),
            applications: Vec::new(),
        }
    }

    fn trigger(&self, rule: &AlertRule, host: &str, key: &str, tags: &[Tag]) -> Result<Trigger> {
        let comments = ["summary", "message", "description"]
            .iter()
            .find_map(|a| rule.annotation(a))
            .unwrap_or_default();
        Ok(Trigger {
            triggerid: None,
            description: rule
                .annotation(ANN_TRIGGER_DESCRIPTION)
                .unwrap_or(&rule.name)
                .to_string(),
            expression: format!("last(/{host}/{key})<>0"),
            comments: comments.to_string(),
            priority: rule
                .labels
                .get("severity")
                .map(|s| Priority::from_severity(s))
                .unwrap_or_default(),
            url: self
                .trigger_url(&rule.expr)
                .with_op(|| format!("rule '{}'", rule.name))?,
            manual_close: 1,
            tags: tags.to_vec(),
        })
    }

    /// Link to the rule's graph in Prometheus, or to the alerts page when
    /// the graph link would be too long.
    pub fn trigger_url(&self, expr: &str) -> Result<String> {
        let Some(base) = self.prometheus_url else {
            return Ok(String::new());
        };
        let graph = reqwest::Url::parse_with_params(&format!("{base}/graph"), [("g0.expr", expr)])
            .map_err(|e| ZalError::Config(format!("invalid prometheus url '{base}': {e}")))?;
        if graph.as_str().len() < MAX_TRIGGER_URL {
            Ok(graph.into())
        } else {
            Ok(format!("{base}/alerts"))
        }
    }
}

/// Trapper item key for an alert: `<prefix>.<lowercased alert name>`.
pub fn item_key(prefix: &str, alert_name: &str) -> String {
    format!("{prefix}.{}", alert_name.to_lowercase())
}

fn host_record(host: &HostConfig) -> Host {
    let mut inventory = BTreeMap::new();
    inventory.insert("tag".to_string(), host.tag.clone());
    inventory.insert("deployment_status".to_string(), host.deployment_status.clone());
    Host {
        hostid: None,
        host: host.name.clone(),
        name: host.name.clone(),
        status: HOST_MONITORED,
        inventory_mode: INVENTORY_MANUAL,
        inventory,
        groups: Vec::new(),
        interfaces: vec![HostInterface::loopback_agent()],
    }
}

fn application_names(rule: &AlertRule, host: &HostConfig) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = rule
        .annotation(ANN_APPLICATIONS)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        if let Some(default) = host.item_default_application.as_deref().filter(|d| !d.is_empty()) {
            names.insert(default.to_string());
        }
    }
    names
}

fn nodata_trigger(main: &Trigger, host: &str, key: &str, secs: &str) -> Trigger {
    Trigger {
        description: format!("{} - no data for the last {secs} seconds", main.description),
        expression: format!("nodata(/{host}/{key},{secs})"),
        ..main.clone()
    }
}

/// Build the desired graph for every configured host. `rules_for` supplies
/// each host's rule set.
pub fn build_desired<F>(config: &Config, mut rules_for: F) -> Result<Graph>
where
    F: FnMut(&HostConfig) -> Result<Vec<AlertRule>>,
{
    let builder = Builder::new(config);
    let mut graph = Graph::new();
    for host in &config.hosts {
        let rules = rules_for(host).with_op(|| format!("loading rules for host '{}'", host.name))?;
        builder
            .add_host(&mut graph, host, &rules)
            .with_op(|| format!("building host '{}'", host.name))?;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> Config {
        Config::parse(
            r#"
prometheusUrl: http://prometheus:9090
hosts:
  - name: web1
    hostGroups: [prod, web]
    tag: x
    deploymentStatus: "0"
    itemDefaultHistory: 30d
    itemDefaultApplication: prometheus
    triggerTags: { team: ops }
"#,
        )
        .unwrap()
    }

    fn rule(name: &str, annotations: &[(&str, &str)], severity: Option<&str>) -> AlertRule {
        AlertRule {
            name: name.to_string(),
            expr: "rate(cpu[5m]) > 0.9".to_string(),
            labels: severity
                .map(|s| [("severity".to_string(), s.to_string())].into_iter().collect())
                .unwrap_or_default(),
            annotations: annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            source: PathBuf::from("rules.yml"),
        }
    }

    fn build(rules: Vec<AlertRule>) -> Result<Graph> {
        let cfg = config();
        build_desired(&cfg, |_| Ok(rules.clone()))
    }

    #[test]
    fn rule_becomes_trapper_item_and_trigger() {
        let graph = build(vec![rule("HighCPU", &[("summary", "CPU hot")], Some("Critical"))]).unwrap();
        let host = graph.host("web1").unwrap();

        let item = &host.items["prometheus.highcpu"];
        assert_eq!(item.state, State::New);
        assert_eq!(item.record.item_type, ITEM_TYPE_TRAPPER);
        assert_eq!(item.record.value_type, VALUE_TYPE_UNSIGNED);
        assert_eq!(item.record.history, "30d");
        assert_eq!(item.record.trends, "365d");

        let trig = &host.triggers["last(/web1/prometheus.highcpu)<>0"];
        assert_eq!(trig.record.description, "HighCPU");
        assert_eq!(trig.record.priority, Priority::Critical);
        assert_eq!(trig.record.comments, "CPU hot");
        assert_eq!(trig.record.manual_close, 1);
        assert_eq!(trig.record.tags, vec![Tag { tag: "team".into(), value: "ops".into() }]);
        assert!(trig.record.url.starts_with("http://prometheus:9090/graph?g0.expr="));
    }

    #[test]
    fn host_and_groups_are_new() {
        let graph = build(vec![]).unwrap();
        assert_eq!(graph.host_groups.keys().collect::<Vec<_>>(), vec!["prod", "web"]);
        let host = graph.host("web1").unwrap();
        assert_eq!(host.state, State::New);
        assert_eq!(host.record.inventory["tag"], "x");
        assert_eq!(host.record.interfaces.len(), 1);
    }

    #[test]
    fn annotations_override_item_defaults() {
        let graph = build(vec![rule(
            "DiskFull",
            &[
                (ANN_HISTORY, "7d"),
                (ANN_TRENDS, "30d"),
                (ANN_TRAPPER_HOSTS, "10.0.0.1"),
                (ANN_DESCRIPTION, "disk usage"),
                (ANN_APPLICATIONS, "disk, storage"),
                (ANN_TRIGGER_DESCRIPTION, "Disk is full"),
            ],
            None,
        )])
        .unwrap();
        let host = graph.host("web1").unwrap();
        let item = &host.items["prometheus.diskfull"];

        assert_eq!(item.record.history, "7d");
        assert_eq!(item.record.trends, "30d");
        assert_eq!(item.record.trapper_hosts, "10.0.0.1");
        assert_eq!(item.record.description, "disk usage");
        assert_eq!(item.app_names.iter().collect::<Vec<_>>(), vec!["disk", "storage"]);
        assert_eq!(host.applications.keys().collect::<Vec<_>>(), vec!["disk", "storage"]);

        let trig = &host.triggers["last(/web1/prometheus.diskfull)<>0"];
        assert_eq!(trig.record.description, "Disk is full");
        assert_eq!(trig.record.priority, Priority::NotClassified);
    }

    #[test]
    fn rule_without_applications_gets_host_default() {
        let graph = build(vec![rule("HighCPU", &[], None)]).unwrap();
        let host = graph.host("web1").unwrap();
        assert!(host.items["prometheus.highcpu"].app_names.contains("prometheus"));
        assert!(host.applications.contains_key("prometheus"));
    }

    #[test]
    fn nodata_annotation_adds_companion_trigger() {
        let graph = build(vec![rule("Heartbeat", &[(ANN_TRIGGER_NODATA, "600")], None)]).unwrap();
        let host = graph.host("web1").unwrap();

        assert_eq!(host.triggers.len(), 2);
        let nodata = &host.triggers["nodata(/web1/prometheus.heartbeat,600)"];
        assert_eq!(nodata.record.description, "Heartbeat - no data for the last 600 seconds");
        assert!(host.triggers.contains_key("last(/web1/prometheus.heartbeat)<>0"));
    }

    #[test]
    fn duplicate_rule_names_build_nothing() {
        let err = build(vec![rule("HighCPU", &[], None), rule("HighCPU", &[], None)]).unwrap_err();
        assert!(matches!(err.root(), ZalError::DuplicateRule { name, .. } if name == "HighCPU"));

        let cfg = config();
        let mut graph = Graph::new();
        let res = Builder::new(&cfg).add_host(
            &mut graph,
            &cfg.hosts[0],
            &[rule("HighCPU", &[], None), rule("HighCPU", &[], None)],
        );
        assert!(res.is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn long_expressions_link_to_alerts_page() {
        let cfg = config();
        let builder = Builder::new(&cfg);
        let url = builder.trigger_url(&"x".repeat(300)).unwrap();
        assert_eq!(url, "http://prometheus:9090/alerts");

        let url = builder.trigger_url("up == 0").unwrap();
        assert_eq!(url, "http://prometheus:9090/graph?g0.expr=up+%3D%3D+0");
    }

    #[test]
    fn no_prometheus_url_means_no_trigger_url() {
        let mut cfg = config();
        cfg.prometheus_url = None;
        assert_eq!(Builder::new(&cfg).trigger_url("up == 0").unwrap(), "");
    }

    #[test]
    fn key_prefix_is_kept_verbatim() {
        let mut cfg = config();
        cfg.key_prefix = "prom".into();
        assert_eq!(Builder::new(&cfg).item_key("HighCPU"), "prom.highcpu");
    }
}
