//! Prometheus alerting rule files.

use crate::error::{Result, ZalError};
use serde::{de, Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// One alerting rule. Recording rules never make it this far.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertRule {
    pub name: String,
    pub expr: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// File the rule was read from.
    pub source: PathBuf,
}

impl AlertRule {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    groups: Vec<RuleGroup>,
}

#[derive(Deserialize)]
struct RuleGroup {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    alert: Option<String>,
    #[serde(default)]
    expr: String,
    #[serde(default, deserialize_with = "scalar_map")]
    labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "scalar_map")]
    annotations: BTreeMap<String, String>,
}

/// Labels and annotations are strings to Prometheus, but YAML happily
/// types `zabbix_trigger_nodata: 600` as a number.
fn scalar_map<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    use serde_yaml::Value;
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(d)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => return Err(de::Error::custom(format!("'{k}' must be a scalar"))),
            };
            Ok((k, s))
        })
        .collect()
}

/// Load every alerting rule under `path`: a directory (its `*.yml` and
/// `*.yaml` files in name order) or a single file.
pub fn load(path: &Path) -> Result<Vec<AlertRule>> {
    let files = if path.is_dir() {
        rule_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut rules = Vec::new();
    for file in files {
        rules.extend(load_file(&file)?);
    }
    ensure_unique(&rules)?;
    tracing::debug!(path = %path.display(), rules = rules.len(), "loaded alert rules");
    Ok(rules)
}

fn rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ZalError::Config(format!("can't open alerts directory {}: {e}", dir.display()))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_file(path: &Path) -> Result<Vec<AlertRule>> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        ZalError::Config(format!("can't read alerts file {}: {e}", path.display()))
    })?;
    parse(&data, path)
}

/// Parse one rule document; `source` is recorded on each rule.
pub fn parse(data: &str, source: &Path) -> Result<Vec<AlertRule>> {
    let file: RuleFile = serde_yaml::from_str(data).map_err(|e| {
        ZalError::Config(format!("can't parse alerts file {}: {e}", source.display()))
    })?;
    Ok(file
        .groups
        .into_iter()
        .flat_map(|g| g.rules)
        .filter_map(|r| {
            let name = r.alert.filter(|a| !a.is_empty())?;
            Some(AlertRule {
                name,
                expr: r.expr,
                labels: r.labels,
                annotations: r.annotations,
                source: source.to_path_buf(),
            })
        })
        .collect())
}

/// Reject a rule set in which two rules share an alert name.
pub fn ensure_unique(rules: &[AlertRule]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for rule in rules {
        if seen.insert(&rule.name, &rule.source).is_some() {
            return Err(ZalError::DuplicateRule {
                name: rule.name.clone(),
                path: rule.source.display().to_string(),
            });
        }
    }
    Ok(())
}
