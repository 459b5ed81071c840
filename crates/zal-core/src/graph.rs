//! The per-pass entity graph: host groups and hosts, each host owning its
//! applications, items and triggers, every node tagged with a lifecycle
//! [`State`].

use crate::zabbix::types::{Application, Host, HostGroup, Item, Trigger};
use crate::reconcile::insert;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Only in the desired graph.
    New,
    /// In both graphs, content differs.
    Updated,
    /// In both graphs, content matches.
    Equal,
    /// Only on the server.
    Old,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::New => "new",
            State::Updated => "updated",
            State::Equal => "equal",
            State::Old => "old",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A keyed node that the reconciler can merge.
pub trait Entity {
    const KIND: &'static str;

    fn key(&self) -> &str;
    fn state(&self) -> State;
    fn set_state(&mut self, state: State);
    fn remote_id(&self) -> Option<&str>;
    fn set_remote_id(&mut self, id: Option<String>);

    /// Compare the attributes that matter for deciding Equal vs Updated.
    fn same_content(&self, other: &Self) -> bool;

    /// Fold the other side's owned children into `self`.
    fn absorb(&mut self, _other: Self)
    where
        Self: Sized,
    {
    }
}

macro_rules! entity_basics {
    ($id:ident) => {
        fn state(&self) -> State {
            self.state
        }
        fn set_state(&mut self, state: State) {
            self.state = state;
        }
        fn remote_id(&self) -> Option<&str> {
            self.record.$id.as_deref()
        }
        fn set_remote_id(&mut self, id: Option<String>) {
            self.record.$id = id;
        }
    };
}

#[derive(Debug, Clone)]
pub struct GroupNode {
    pub state: State,
    pub record: HostGroup,
}

impl GroupNode {
    pub fn new(state: State, record: HostGroup) -> Self {
        Self { state, record }
    }
}

impl Entity for GroupNode {
    const KIND: &'static str = "host group";

    fn key(&self) -> &str {
        &self.record.name
    }
    entity_basics!(groupid);

    fn same_content(&self, _other: &Self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct AppNode {
    pub state: State,
    pub record: Application,
}

impl AppNode {
    pub fn new(state: State, record: Application) -> Self {
        Self { state, record }
    }
}

impl Entity for AppNode {
    const KIND: &'static str = "application";

    fn key(&self) -> &str {
        &self.record.name
    }
    entity_basics!(applicationid);

    fn same_content(&self, _other: &Self) -> bool {
        true
    }
}

/// An item plus the application names it belongs to. Names are resolved to
/// ids only when the item is submitted.
#[derive(Debug, Clone)]
pub struct ItemNode {
    pub state: State,
    pub record: Item,
    pub app_names: BTreeSet<String>,
}

impl ItemNode {
    pub fn new(state: State, record: Item, app_names: BTreeSet<String>) -> Self {
        Self {
            state,
            record,
            app_names,
        }
    }
}

impl Entity for ItemNode {
    const KIND: &'static str = "item";

    fn key(&self) -> &str {
        &self.record.key
    }
    entity_basics!(itemid);

    fn same_content(&self, other: &Self) -> bool {
        let (a, b) = (&self.record, &other.record);
        a.name == b.name
            && a.description == b.description
            && a.trends == b.trends
            && a.history == b.history
            && a.trapper_hosts == b.trapper_hosts
            && self.app_names == other.app_names
    }
}

#[derive(Debug, Clone)]
pub struct TriggerNode {
    pub state: State,
    pub record: Trigger,
}

impl TriggerNode {
    pub fn new(state: State, record: Trigger) -> Self {
        Self { state, record }
    }
}

impl Entity for TriggerNode {
    const KIND: &'static str = "trigger";

    fn key(&self) -> &str {
        &self.record.expression
    }
    entity_basics!(triggerid);

    fn same_content(&self, other: &Self) -> bool {
        let (a, b) = (&self.record, &other.record);
        a.expression == b.expression
            && a.description == b.description
            && a.priority == b.priority
            && a.comments == b.comments
            && a.url == b.url
            && a.manual_close == b.manual_close
    }
}

/// A host and everything it exclusively owns.
#[derive(Debug, Clone)]
pub struct HostNode {
    pub state: State,
    pub record: Host,
    pub group_names: BTreeSet<String>,
    pub applications: BTreeMap<String, AppNode>,
    pub items: BTreeMap<String, ItemNode>,
    pub triggers: BTreeMap<String, TriggerNode>,
}

impl HostNode {
    pub fn new(state: State, record: Host, group_names: BTreeSet<String>) -> Self {
        Self {
            state,
            record,
            group_names,
            applications: BTreeMap::new(),
            items: BTreeMap::new(),
            triggers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.record.host
    }

    pub fn add_application(&mut self, app: AppNode) -> &mut AppNode {
        insert(&mut self.applications, app)
    }

    pub fn add_item(&mut self, item: ItemNode) -> &mut ItemNode {
        insert(&mut self.items, item)
    }

    pub fn add_trigger(&mut self, trigger: TriggerNode) -> &mut TriggerNode {
        insert(&mut self.triggers, trigger)
    }
}

impl Entity for HostNode {
    const KIND: &'static str = "host";

    fn key(&self) -> &str {
        &self.record.host
    }
    entity_basics!(hostid);

    fn same_content(&self, other: &Self) -> bool {
        self.record.host == other.record.host
            && self.record.name == other.record.name
            && self.group_names == other.group_names
            && self.record.inventory == other.record.inventory
    }

    fn absorb(&mut self, other: Self) {
        for app in other.applications.into_values() {
            insert(&mut self.applications, app);
        }
        for item in other.items.into_values() {
            insert(&mut self.items, item);
        }
        for trigger in other.triggers.into_values() {
            insert(&mut self.triggers, trigger);
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub host_groups: BTreeMap<String, GroupNode>,
    pub hosts: BTreeMap<String, HostNode>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: GroupNode) -> &mut GroupNode {
        insert(&mut self.host_groups, group)
    }

    pub fn add_host(&mut self, host: HostNode) -> &mut HostNode {
        insert(&mut self.hosts, host)
    }

    /// Merge every node of `other` into this graph.
    pub fn merge(&mut self, other: Graph) {
        for group in other.host_groups.into_values() {
            self.add_group(group);
        }
        for host in other.hosts.into_values() {
            self.add_host(host);
        }
    }

    pub fn host(&self, name: &str) -> Option<&HostNode> {
        self.hosts.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.host_groups.is_empty() && self.hosts.is_empty()
    }
}
