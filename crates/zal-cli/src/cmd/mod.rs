pub mod check;
pub mod prov;
pub mod send;

use zal_core::config::{Config, ConfigWarning, WarnLevel};

/// Log warnings and fail on the first error-level entry.
pub(crate) fn report_config(warnings: &[ConfigWarning]) -> anyhow::Result<()> {
    for w in warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }
    if Config::has_errors(warnings) {
        let errors: Vec<&str> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }
    Ok(())
}
