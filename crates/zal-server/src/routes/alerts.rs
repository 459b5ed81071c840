use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use crate::alert::WebhookRequest;
use crate::error::{AppError, ForwardError};
use crate::sender::{Packet, SendSummary};
use crate::state::AppState;

/// POST /alerts: forward one Alertmanager notification to Zabbix
pub async fn receive_alerts(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<SendSummary>, AppError> {
    let req = WebhookRequest::decode(&body).inspect_err(|e| {
        app.metrics.record_errors(1);
        tracing::warn!("rejected webhook: {e}");
    })?;

    let host = app
        .config
        .hosts
        .resolve(&req.receiver, &app.config.default_host)
        .to_string();
    let clock = chrono::Utc::now().timestamp();
    let metrics = req.to_metrics(&host, &app.config.key_prefix, clock);
    if metrics.is_empty() {
        return Ok(Json(SendSummary::default()));
    }
    for m in &metrics {
        tracing::debug!(host = %m.host, key = %m.key, value = %m.value, "forwarding alert");
    }

    let count = metrics.len() as u64;
    match app.sender.send(&Packet::new(metrics, clock)).await {
        Ok(summary) => {
            app.metrics.record_sent(req.is_firing(), summary.processed);
            tracing::info!(
                receiver = %req.receiver,
                host = %host,
                status = %req.status,
                processed = summary.processed,
                "forwarded alerts"
            );
            Ok(Json(summary))
        }
        Err(e) => {
            let failed = match &e {
                ForwardError::Rejected { failed, .. } => *failed,
                _ => count,
            };
            app.metrics.record_errors(failed.max(1));
            tracing::warn!(receiver = %req.receiver, host = %host, "failed to forward alerts: {e}");
            Err(e.into())
        }
    }
}
