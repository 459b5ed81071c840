//! Alertmanager webhook payloads and their mapping onto trapper values.

use crate::error::ForwardError;
use crate::sender::Metric;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: String,
}

impl WebhookRequest {
    pub fn decode(body: &[u8]) -> Result<Self, ForwardError> {
        let req: Self =
            serde_json::from_slice(body).map_err(|e| ForwardError::Decode(e.to_string()))?;
        if req.status.is_empty() {
            return Err(ForwardError::Validation("status".into()));
        }
        if req.common_labels.get("alertname").map_or(true, |a| a.is_empty()) {
            return Err(ForwardError::Validation("commonLabels.alertname".into()));
        }
        Ok(req)
    }

    pub fn is_firing(&self) -> bool {
        self.status == "firing"
    }

    /// One trapper value per alert: `1` while firing, `0` once resolved.
    pub fn to_metrics(&self, host: &str, key_prefix: &str, clock: i64) -> Vec<Metric> {
        let value = if self.is_firing() { "1" } else { "0" };
        self.alerts
            .iter()
            .map(|alert| {
                let name = alert.labels.get("alertname").map(String::as_str).unwrap_or_default();
                Metric {
                    host: host.to_string(),
                    key: zal_core::builder::item_key(key_prefix, name),
                    value: value.to_string(),
                    clock,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// HostMap
// ---------------------------------------------------------------------------

/// Routes notifications to a Zabbix host by Alertmanager receiver name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostMap {
    by_receiver: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostMapFile {
    /// `hosts: [{ received: <receiver>, default: <host> }]`
    Listed { hosts: Vec<HostRoute> },
    /// `<receiver>: <host>`
    Plain(HashMap<String, String>),
}

#[derive(Deserialize)]
struct HostRoute {
    received: String,
    default: String,
}

impl HostMap {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("can't read hosts file {}: {e}", path.display()))?;
        Self::parse(&data)
            .map_err(|e| anyhow::anyhow!("can't parse hosts file {}: {e}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self, serde_yaml::Error> {
        let by_receiver = match serde_yaml::from_str::<HostMapFile>(data)? {
            HostMapFile::Listed { hosts } => hosts
                .into_iter()
                .map(|r| (r.received, r.default))
                .collect(),
            HostMapFile::Plain(map) => map,
        };
        Ok(Self { by_receiver })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            by_receiver: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn resolve<'a>(&'a self, receiver: &str, default: &'a str) -> &'a str {
        self.by_receiver.get(receiver).map(String::as_str).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.by_receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_receiver.is_empty()
    }
}
