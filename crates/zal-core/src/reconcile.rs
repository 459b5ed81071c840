//! Keyed merge of the desired and remote graphs, state bucketing, and
//! write-back of server-assigned ids.

use crate::error::{Result, ZalError};
use crate::graph::{Entity, Graph, HostNode, State};
use crate::zabbix::resource::Resource;
use crate::zabbix::types::{Application, GroupRef, Host, HostGroup, Item, Trigger};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Insert `incoming` into `map`, merging with any entity already stored
/// under the same key.
///
/// A desired/remote pair settles into [`State::Equal`] or
/// [`State::Updated`] whichever side arrives first: desired attributes win
/// and the remote id is kept. Any other collision keeps the existing entity.
pub fn insert<E: Entity>(map: &mut BTreeMap<String, E>, incoming: E) -> &mut E {
    match map.entry(incoming.key().to_string()) {
        Entry::Vacant(slot) => slot.insert(incoming),
        Entry::Occupied(slot) => {
            let existing = slot.into_mut();
            match (existing.state(), incoming.state()) {
                (State::New, State::Old) => settle(existing, incoming),
                (State::Old, State::New) => {
                    let remote = std::mem::replace(existing, incoming);
                    settle(existing, remote);
                }
                (held, dropped) => {
                    tracing::debug!(
                        kind = E::KIND,
                        key = existing.key(),
                        %held,
                        %dropped,
                        "keeping existing entity"
                    );
                }
            }
            existing
        }
    }
}

fn settle<E: Entity>(desired: &mut E, remote: E) {
    let state = if desired.same_content(&remote) {
        State::Equal
    } else {
        State::Updated
    };
    desired.set_remote_id(remote.remote_id().map(str::to_string));
    desired.absorb(remote);
    desired.set_state(state);
    tracing::debug!(kind = E::KIND, key = desired.key(), %state, "merged");
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Entities grouped by lifecycle state, each list sorted by natural key.
#[derive(Debug, Clone)]
pub struct Buckets<T> {
    pub new: Vec<T>,
    pub updated: Vec<T>,
    pub equal: Vec<T>,
    pub old: Vec<T>,
}

impl<T> Default for Buckets<T> {
    fn default() -> Self {
        Self {
            new: Vec::new(),
            updated: Vec::new(),
            equal: Vec::new(),
            old: Vec::new(),
        }
    }
}

impl<T> Buckets<T> {
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.old.is_empty()
    }
}

/// Split `map` by state, converting each entity with `submit`.
pub fn bucket_by_state<E, T, F>(map: &BTreeMap<String, E>, mut submit: F) -> Result<Buckets<T>>
where
    E: Entity,
    F: FnMut(&E) -> Result<T>,
{
    let mut buckets = Buckets::default();
    for entity in map.values() {
        let record = submit(entity)?;
        match entity.state() {
            State::New => buckets.new.push(record),
            State::Updated => buckets.updated.push(record),
            State::Equal => buckets.equal.push(record),
            State::Old => buckets.old.push(record),
        }
    }
    tracing::debug!(
        kind = E::KIND,
        new = buckets.new.len(),
        updated = buckets.updated.len(),
        equal = buckets.equal.len(),
        old = buckets.old.len(),
        "bucketed"
    );
    Ok(buckets)
}

impl Graph {
    pub fn group_buckets(&self) -> Result<Buckets<HostGroup>> {
        bucket_by_state(&self.host_groups, |g| Ok(g.record.clone()))
    }

    /// Host records ready for submission, group names resolved to ids.
    pub fn host_buckets(&self) -> Result<Buckets<Host>> {
        bucket_by_state(&self.hosts, |h| {
            let mut record = h.record.clone();
            match h.state {
                State::New | State::Updated => {
                    record.groups = h
                        .group_names
                        .iter()
                        .map(|name| self.group_ref(name))
                        .collect::<Result<_>>()?;
                    if h.state == State::Updated {
                        record.interfaces.clear();
                    }
                }
                State::Equal | State::Old => {}
            }
            Ok(record)
        })
    }

    fn group_ref(&self, name: &str) -> Result<GroupRef> {
        let groupid = self
            .host_groups
            .get(name)
            .and_then(|g| g.record.groupid.clone())
            .ok_or_else(|| ZalError::UnresolvedReference {
                kind: "host group",
                name: name.to_string(),
            })?;
        Ok(GroupRef {
            groupid,
            name: Some(name.to_string()),
        })
    }
}

impl HostNode {
    fn require_id(&self) -> Result<String> {
        self.record
            .hostid
            .clone()
            .ok_or_else(|| ZalError::MissingId {
                kind: "host",
                key: self.record.host.clone(),
            })
    }

    pub fn application_buckets(&self) -> Result<Buckets<Application>> {
        let hostid = self.require_id()?;
        bucket_by_state(&self.applications, |a| {
            let mut record = a.record.clone();
            record.hostid = hostid.clone();
            Ok(record)
        })
    }

    /// Item records stamped with the host id; submitted items carry
    /// application ids resolved from this host's applications.
    pub fn item_buckets(&self) -> Result<Buckets<Item>> {
        let hostid = self.require_id()?;
        bucket_by_state(&self.items, |i| {
            let mut record = i.record.clone();
            record.hostid = hostid.clone();
            if matches!(i.state, State::New | State::Updated) {
                record.applications = i
                    .app_names
                    .iter()
                    .map(|name| {
                        self.applications
                            .get(name)
                            .and_then(|a| a.record.applicationid.clone())
                            .ok_or_else(|| ZalError::UnresolvedReference {
                                kind: "application",
                                name: name.clone(),
                            })
                    })
                    .collect::<Result<_>>()?;
            }
            Ok(record)
        })
    }

    pub fn trigger_buckets(&self) -> Result<Buckets<Trigger>> {
        bucket_by_state(&self.triggers, |t| Ok(t.record.clone()))
    }
}

// ---------------------------------------------------------------------------
// Id propagation
// ---------------------------------------------------------------------------

/// Write `ids[i]` back onto the entity keyed like `submitted[i]`.
pub fn propagate_ids<E, T>(
    map: &mut BTreeMap<String, E>,
    submitted: &[T],
    ids: Vec<String>,
) -> Result<()>
where
    E: Entity,
    T: Resource,
{
    if submitted.len() != ids.len() {
        return Err(ZalError::CountMismatch {
            method: format!("{}.create", T::API),
            expected: submitted.len(),
            got: ids.len(),
        });
    }
    for (record, id) in submitted.iter().zip(ids) {
        let entity = map
            .get_mut(record.natural_key())
            .ok_or_else(|| ZalError::UnresolvedReference {
                kind: T::KIND,
                name: record.natural_key().to_string(),
            })?;
        entity.set_remote_id(Some(id));
    }
    Ok(())
}

/// Forget the ids of entities that were just deleted.
pub fn clear_ids<E, T>(map: &mut BTreeMap<String, E>, deleted: &[T])
where
    E: Entity,
    T: Resource,
{
    for record in deleted {
        if let Some(entity) = map.get_mut(record.natural_key()) {
            entity.set_remote_id(None);
        }
    }
}
