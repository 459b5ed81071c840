use crate::error::{Result, ZalError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_KEY_PREFIX: &str = "prometheus";
pub const DEFAULT_ITEM_HISTORY: &str = "90d";
pub const DEFAULT_ITEM_TRENDS: &str = "365d";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// One provisioned host and where its alerting rules live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub name: String,
    #[serde(default)]
    pub host_groups: Vec<String>,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub deployment_status: String,
    #[serde(default = "default_history")]
    pub item_default_history: String,
    #[serde(default = "default_trends")]
    pub item_default_trends: String,
    #[serde(default)]
    pub item_default_trapper_hosts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_default_application: Option<String>,
    #[serde(default)]
    pub alerts_dir: PathBuf,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trigger_tags: BTreeMap<String, String>,
}

fn default_history() -> String {
    DEFAULT_ITEM_HISTORY.to_string()
}

fn default_trends() -> String {
    DEFAULT_ITEM_TRENDS.to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_url: Option<String>,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            key_prefix: default_key_prefix(),
            prometheus_url: None,
            hosts: Vec::new(),
        }
    }
}

/// A config file is either a full document or just the host list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Hosts(Vec<HostConfig>),
    Full(Config),
}

impl Config {
    /// Read a config file. Relative `alertsDir` paths are resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ZalError::Config(format!("can't read config file {}: {e}", path.display()))
        })?;
        let mut cfg = Self::parse(&data)
            .map_err(|e| ZalError::Config(format!("can't parse config file {}: {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for host in &mut cfg.hosts {
            if !host.alerts_dir.as_os_str().is_empty() && host.alerts_dir.is_relative() {
                host.alerts_dir = base.join(&host.alerts_dir);
            }
        }
        Ok(cfg)
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(match serde_yaml::from_str(data)? {
            ConfigFile::Hosts(hosts) => Config {
                hosts,
                ..Config::default()
            },
            ConfigFile::Full(cfg) => cfg,
        })
    }

    /// Validate the config and return any warnings or errors.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = self.validate_hosts();
        if self.url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "zabbix api url is not set".to_string(),
            });
        }
        if self.user.trim().is_empty() || self.password.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "zabbix credentials are not set".to_string(),
            });
        }
        warnings
    }

    /// Checks that need no connection settings.
    pub fn validate_hosts(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.hosts.is_empty() {
            push(WarnLevel::Error, "no hosts are defined".to_string());
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                push(WarnLevel::Error, "host with an empty name".to_string());
                continue;
            }
            if !seen.insert(host.name.as_str()) {
                push(WarnLevel::Error, format!("host '{}' is defined more than once", host.name));
            }
            if host.host_groups.is_empty() {
                push(
                    WarnLevel::Warning,
                    format!("host '{}' has no host groups", host.name),
                );
            }
            if host.alerts_dir.as_os_str().is_empty() {
                push(
                    WarnLevel::Warning,
                    format!("host '{}' has no alertsDir; it will get no items", host.name),
                );
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    /// Configured host group names, deduplicated, in first-seen order.
    pub fn host_group_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.hosts
            .iter()
            .flat_map(|h| h.host_groups.iter())
            .filter(|g| seen.insert(g.as_str()))
            .cloned()
            .collect()
    }
}
