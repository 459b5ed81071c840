//! Dry-run listing of the writes a merged graph would cause.

use crate::graph::{Entity, Graph, State};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub action: Action,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub key: String,
}

/// The writes an apply pass would issue, without issuing them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub changes: Vec<Change>,
}

fn collect<E: Entity>(
    out: &mut Vec<Change>,
    host: Option<&str>,
    map: &BTreeMap<String, E>,
    deletable: bool,
) {
    for entity in map.values() {
        let action = match entity.state() {
            State::New => Action::Create,
            State::Updated => Action::Update,
            State::Old if deletable => Action::Delete,
            State::Old | State::Equal => continue,
        };
        out.push(Change {
            action,
            kind: E::KIND,
            host: host.map(str::to_string),
            key: entity.key().to_string(),
        });
    }
}

impl Plan {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut changes = Vec::new();
        collect(&mut changes, None, &graph.host_groups, false);
        collect(&mut changes, None, &graph.hosts, false);
        for (name, host) in &graph.hosts {
            if host.state == State::Old {
                continue;
            }
            let name = Some(name.as_str());
            collect(&mut changes, name, &host.applications, true);
            collect(&mut changes, name, &host.items, true);
            collect(&mut changes, name, &host.triggers, true);
        }
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }
}
