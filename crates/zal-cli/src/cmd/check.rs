use crate::output::{print_json, print_table};
use serde::Serialize;
use std::path::Path;
use zal_core::builder::build_desired;
use zal_core::config::{Config, ConfigWarning, WarnLevel};
use zal_core::provisioner::load_host_rules;

#[derive(Serialize)]
struct HostSummary {
    host: String,
    groups: Vec<String>,
    applications: usize,
    items: usize,
    triggers: usize,
}

#[derive(Serialize)]
struct CheckReport {
    warnings: Vec<ConfigWarning>,
    hosts: Vec<HostSummary>,
}

/// Offline: connection settings are not required here.
pub fn run(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(path)?;
    let warnings = config.validate_hosts();

    if !json {
        for w in &warnings {
            let level = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("{level}: {}", w.message);
        }
    }
    if Config::has_errors(&warnings) {
        if json {
            print_json(&CheckReport { warnings, hosts: Vec::new() })?;
        }
        anyhow::bail!("{} is invalid", path.display());
    }

    let graph = build_desired(&config, load_host_rules)?;
    let hosts: Vec<HostSummary> = graph
        .hosts
        .values()
        .map(|h| HostSummary {
            host: h.name().to_string(),
            groups: h.group_names.iter().cloned().collect(),
            applications: h.applications.len(),
            items: h.items.len(),
            triggers: h.triggers.len(),
        })
        .collect();

    if json {
        return print_json(&CheckReport { warnings, hosts });
    }

    let rows = hosts
        .iter()
        .map(|h| {
            vec![
                h.host.clone(),
                h.groups.join(","),
                h.applications.to_string(),
                h.items.to_string(),
                h.triggers.to_string(),
            ]
        })
        .collect();
    print_table(&["HOST", "GROUPS", "APPLICATIONS", "ITEMS", "TRIGGERS"], rows);
    println!("{path} is valid", path = path.display());
    Ok(())
}
