use crate::alert::HostMap;
use crate::sender::Sender;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9095";
pub const DEFAULT_HOST: &str = "prometheus";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwarder settings, fixed for the life of the server.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub zabbix_addr: String,
    pub key_prefix: String,
    pub default_host: String,
    pub hosts: HostMap,
    pub timeout: Duration,
}

impl ForwarderConfig {
    pub fn new(zabbix_addr: impl Into<String>) -> Self {
        Self {
            zabbix_addr: zabbix_addr.into(),
            key_prefix: zal_core::config::DEFAULT_KEY_PREFIX.to_string(),
            default_host: DEFAULT_HOST.to_string(),
            hosts: HostMap::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Label set for `zal_alerts_sent_total`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

impl StatusLabels {
    fn of(firing: bool) -> Self {
        let status = if firing { "firing" } else { "resolved" };
        Self {
            status: status.to_string(),
        }
    }
}

/// Forwarding counters exposed on `/metrics`.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    pub sent: Family<StatusLabels, Counter>,
    pub errors: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let sent = Family::<StatusLabels, Counter>::default();
        let errors = Counter::default();
        registry.register(
            "zal_alerts_sent",
            "Alert values accepted by zabbix, by alert status",
            sent.clone(),
        );
        registry.register(
            "zal_alert_errors",
            "Notifications or values that could not be forwarded",
            errors.clone(),
        );
        // Both series are exported from the first scrape on.
        for firing in [true, false] {
            sent.get_or_create(&StatusLabels::of(firing));
        }
        Self {
            registry,
            sent,
            errors,
        }
    }

    pub fn record_sent(&self, firing: bool, n: u64) {
        self.sent.get_or_create(&StatusLabels::of(firing)).inc_by(n);
    }

    pub fn record_errors(&self, n: u64) {
        self.errors.inc_by(n);
    }

    pub fn sent_count(&self, firing: bool) -> u64 {
        self.sent.get_or_create(&StatusLabels::of(firing)).get()
    }

    /// OpenMetrics text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ForwarderConfig>,
    pub sender: Sender,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: ForwarderConfig) -> Self {
        let sender = Sender::new(config.zabbix_addr.clone(), config.timeout);
        Self {
            config: Arc::new(config),
            sender,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_targets_configured_server() {
        let state = AppState::new(ForwarderConfig::new("127.0.0.1:10051"));
        assert_eq!(state.sender.addr(), "127.0.0.1:10051");
        assert_eq!(state.config.key_prefix, "prometheus");
    }

    #[test]
    fn metrics_encode_as_openmetrics_text() {
        let metrics = Metrics::new();
        metrics.record_sent(true, 3);
        metrics.record_sent(false, 1);
        metrics.record_errors(2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("zal_alerts_sent_total{status=\"firing\"} 3\n"));
        assert!(text.contains("zal_alerts_sent_total{status=\"resolved\"} 1\n"));
        assert!(text.contains("zal_alert_errors_total 2\n"));
        assert!(text.contains("# TYPE zal_alert_errors counter"));
        assert_eq!(metrics.sent_count(true), 3);
    }

    #[test]
    fn both_status_series_exist_before_any_send() {
        let text = Metrics::new().encode().unwrap();
        assert!(text.contains("zal_alerts_sent_total{status=\"firing\"} 0\n"));
        assert!(text.contains("zal_alerts_sent_total{status=\"resolved\"} 0\n"));
    }
}
