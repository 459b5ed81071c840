//! Per-entity `get/create/update/delete` over any [`RpcClient`].

use super::rpc::RpcClient;
use super::types::{Application, Host, HostGroup, Item, Trigger};
use crate::error::{Result, ZalError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Describes how one entity type maps onto the `<api>.get/create/update/delete`
/// method family.
pub trait Resource: Serialize + DeserializeOwned {
    /// Human-readable kind, used in logs and error context.
    const KIND: &'static str;
    /// Method prefix, e.g. `hostgroup`.
    const API: &'static str;
    /// Result member listing ids, e.g. `groupids`.
    const IDS: &'static str;

    fn remote_id(&self) -> Option<&str>;
    fn natural_key(&self) -> &str;
}

impl Resource for HostGroup {
    const KIND: &'static str = "host group";
    const API: &'static str = "hostgroup";
    const IDS: &'static str = "groupids";

    fn remote_id(&self) -> Option<&str> {
        self.groupid.as_deref()
    }
    fn natural_key(&self) -> &str {
        &self.name
    }
}

impl Resource for Host {
    const KIND: &'static str = "host";
    const API: &'static str = "host";
    const IDS: &'static str = "hostids";

    fn remote_id(&self) -> Option<&str> {
        self.hostid.as_deref()
    }
    fn natural_key(&self) -> &str {
        &self.host
    }
}

impl Resource for Application {
    const KIND: &'static str = "application";
    const API: &'static str = "application";
    const IDS: &'static str = "applicationids";

    fn remote_id(&self) -> Option<&str> {
        self.applicationid.as_deref()
    }
    fn natural_key(&self) -> &str {
        &self.name
    }
}

impl Resource for Item {
    const KIND: &'static str = "item";
    const API: &'static str = "item";
    const IDS: &'static str = "itemids";

    fn remote_id(&self) -> Option<&str> {
        self.itemid.as_deref()
    }
    fn natural_key(&self) -> &str {
        &self.key
    }
}

impl Resource for Trigger {
    const KIND: &'static str = "trigger";
    const API: &'static str = "trigger";
    const IDS: &'static str = "triggerids";

    fn remote_id(&self) -> Option<&str> {
        self.triggerid.as_deref()
    }
    fn natural_key(&self) -> &str {
        &self.expression
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub fn get<T: Resource>(rpc: &mut dyn RpcClient, params: Value) -> Result<Vec<T>> {
    let method = format!("{}.get", T::API);
    let result = rpc.call(&method, params)?;
    Ok(serde_json::from_value(result)?)
}

/// Create `records` and return the new ids in submission order.
pub fn create<T: Resource>(rpc: &mut dyn RpcClient, records: &[T]) -> Result<Vec<String>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let method = format!("{}.create", T::API);
    let result = rpc.call(&method, serde_json::to_value(records)?)?;
    let ids = result_ids(&method, T::IDS, &result)?;
    expect_count(&method, records.len(), ids.len())?;
    Ok(ids)
}

pub fn update<T: Resource>(rpc: &mut dyn RpcClient, records: &[T]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let method = format!("{}.update", T::API);
    rpc.call(&method, serde_json::to_value(records)?)?;
    Ok(())
}

/// Delete by id. Returns the number of deleted entities.
pub fn delete<T: Resource>(rpc: &mut dyn RpcClient, ids: &[String]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let method = format!("{}.delete", T::API);
    let result = rpc.call(&method, serde_json::to_value(ids)?)?;
    let deleted = result_ids(&method, T::IDS, &result)?;
    expect_count(&method, ids.len(), deleted.len())?;
    Ok(deleted.len())
}

fn expect_count(method: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(ZalError::CountMismatch {
            method: method.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Ids come back as an array, or as an object keyed by position on some
/// server versions. Object keys must be exactly `0..n`.
fn result_ids(method: &str, field: &str, result: &Value) -> Result<Vec<String>> {
    let bad = |reason: String| ZalError::Response {
        method: method.to_string(),
        reason,
    };
    let raw: Vec<&Value> = match result.get(field) {
        Some(Value::Array(ids)) => ids.iter().collect(),
        Some(Value::Object(ids)) => {
            let mut slots: Vec<Option<&Value>> = vec![None; ids.len()];
            for (pos, id) in ids {
                let slot = pos
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| slots.get_mut(i))
                    .filter(|slot| slot.is_none())
                    .ok_or_else(|| bad(format!("unexpected position '{pos}' in '{field}'")))?;
                *slot = Some(id);
            }
            slots.into_iter().flatten().collect()
        }
        Some(other) => return Err(bad(format!("'{field}' is {other}"))),
        None => return Err(bad(format!("missing '{field}'"))),
    };
    raw.into_iter()
        .map(|id| match id {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(bad(format!("unexpected id {other}"))),
        })
        .collect()
}
