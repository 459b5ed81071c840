//! Zabbix API record shapes.
//!
//! The API returns every scalar as a JSON string (`"type": "2"`) but accepts
//! numbers on input, so numeric fields deserialize from either form.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub const ITEM_TYPE_TRAPPER: i32 = 2;
pub const VALUE_TYPE_UNSIGNED: i32 = 3;
pub const INVENTORY_MANUAL: i32 = 0;
pub const HOST_MONITORED: i32 = 0;

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

fn parse_int<E: de::Error>(raw: IntOrString) -> Result<i64, E> {
    match raw {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) if s.is_empty() => Ok(0),
        IntOrString::Str(s) => s
            .parse()
            .map_err(|_| E::custom(format!("expected an integer, got '{s}'"))),
    }
}

fn de_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let n = parse_int(IntOrString::deserialize(d)?)?;
    i32::try_from(n).map_err(|_| de::Error::custom(format!("integer out of range: {n}")))
}

/// Inventory comes back as an object, or as `[]` when inventory is disabled.
fn de_inventory<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, String>),
        List(Vec<serde_json::Value>),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Map(m) => m,
        Raw::List(_) => BTreeMap::new(),
    })
}

/// `item.get` with `selectApplications` yields `[{"applicationid": "1"}]`;
/// our own payloads carry plain ids.
fn de_application_ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(String),
        Object { applicationid: String },
    }
    let raw: Vec<Raw> = Vec::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|r| match r {
            Raw::Id(id) | Raw::Object { applicationid: id } => id,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    #[default]
    NotClassified,
    Information,
    Warning,
    Average,
    High,
    Critical,
}

impl Priority {
    /// Map a Prometheus `severity` label. Unknown severities fall back to
    /// the lowest priority.
    pub fn from_severity(severity: &str) -> Self {
        match severity.to_lowercase().as_str() {
            "information" => Priority::Information,
            "warning" => Priority::Warning,
            "average" => Priority::Average,
            "high" => Priority::High,
            "critical" => Priority::Critical,
            _ => Priority::NotClassified,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(n: i64) -> Option<Self> {
        Some(match n {
            0 => Priority::NotClassified,
            1 => Priority::Information,
            2 => Priority::Warning,
            3 => Priority::Average,
            4 => Priority::High,
            5 => Priority::Critical,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::NotClassified => "not_classified",
            Priority::Information => "information",
            Priority::Warning => "warning",
            Priority::Average => "average",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let n = parse_int(IntOrString::deserialize(d)?)?;
        Priority::from_i64(n).ok_or_else(|| de::Error::custom(format!("unknown priority {n}")))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupid: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub groupid: String,
    #[serde(default, skip_serializing)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInterface {
    #[serde(rename = "type", deserialize_with = "de_i32")]
    pub interface_type: i32,
    #[serde(deserialize_with = "de_i32")]
    pub main: i32,
    #[serde(deserialize_with = "de_i32")]
    pub useip: i32,
    pub ip: String,
    #[serde(default)]
    pub dns: String,
    pub port: String,
}

impl HostInterface {
    /// The placeholder agent interface attached to provisioned hosts.
    pub fn loopback_agent() -> Self {
        Self {
            interface_type: 1,
            main: 1,
            useip: 1,
            ip: "127.0.0.1".to_string(),
            dns: String::new(),
            port: "10050".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostid: Option<String>,
    pub host: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_i32")]
    pub status: i32,
    #[serde(default, deserialize_with = "de_i32")]
    pub inventory_mode: i32,
    #[serde(default, deserialize_with = "de_inventory")]
    pub inventory: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<HostInterface>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicationid: Option<String>,
    #[serde(default)]
    pub hostid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itemid: Option<String>,
    #[serde(default)]
    pub hostid: String,
    #[serde(rename = "key_")]
    pub key: String,
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "de_i32")]
    pub item_type: i32,
    #[serde(default, deserialize_with = "de_i32")]
    pub value_type: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub history: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trends: String,
    #[serde(default)]
    pub trapper_hosts: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "de_application_ids"
    )]
    pub applications: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggerid: Option<String>,
    pub description: String,
    pub expression: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "de_i32")]
    pub manual_close: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_decodes_string_numbers_and_inventory() {
        let host: Host = serde_json::from_value(json!({
            "hostid": "10105",
            "host": "web1",
            "name": "web1",
            "status": "0",
            "inventory_mode": "0",
            "inventory": { "hostid": "10105", "tag": "x", "deployment_status": "0" },
            "groups": [{ "groupid": "7", "name": "prod" }]
        }))
        .unwrap();

        assert_eq!(host.hostid.as_deref(), Some("10105"));
        assert_eq!(host.inventory.get("tag").map(String::as_str), Some("x"));
        assert_eq!(host.groups[0].name.as_deref(), Some("prod"));
    }

    #[test]
    fn disabled_inventory_decodes_as_empty_map() {
        let host: Host =
            serde_json::from_value(json!({ "host": "web1", "inventory": [] })).unwrap();
        assert!(host.inventory.is_empty());
    }

    #[test]
    fn group_ref_serializes_id_only() {
        let group = GroupRef {
            groupid: "7".into(),
            name: Some("prod".into()),
        };
        assert_eq!(serde_json::to_value(&group).unwrap(), json!({ "groupid": "7" }));
    }

    #[test]
    fn item_accepts_application_objects() {
        let item: Item = serde_json::from_value(json!({
            "itemid": "23",
            "key_": "prometheus.highcpu",
            "name": "HighCPU",
            "type": "2",
            "value_type": "3",
            "applications": [{ "applicationid": "400" }, { "applicationid": "401" }]
        }))
        .unwrap();

        assert_eq!(item.item_type, ITEM_TYPE_TRAPPER);
        assert_eq!(item.applications, vec!["400".to_string(), "401".to_string()]);
    }

    #[test]
    fn priority_round_trips_through_api_strings() {
        let trigger: Trigger = serde_json::from_value(json!({
            "description": "HighCPU",
            "expression": "last(/web1/prometheus.highcpu)<>0",
            "priority": "4"
        }))
        .unwrap();
        assert_eq!(trigger.priority, Priority::High);
        assert_eq!(serde_json::to_value(trigger.priority).unwrap(), json!(4));
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let res: Result<Priority, _> = serde_json::from_value(json!("9"));
        assert!(res.is_err());
    }

    #[test]
    fn severity_mapping_is_case_insensitive_and_permissive() {
        assert_eq!(Priority::from_severity("CRITICAL"), Priority::Critical);
        assert_eq!(Priority::from_severity("Warning"), Priority::Warning);
        assert_eq!(Priority::from_severity("page"), Priority::NotClassified);
        assert_eq!(Priority::from_severity(""), Priority::NotClassified);
    }
}
