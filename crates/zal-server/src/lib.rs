pub mod alert;
pub mod error;
pub mod routes;
pub mod sender;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::{AppState, ForwarderConfig};

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/alerts", post(routes::alerts::receive_alerts))
        .route("/metrics", get(routes::metrics::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the forwarder on `addr`.
pub async fn serve(addr: &str, config: ForwarderConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(listener, config).await
}

/// Start the forwarder on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting.
pub async fn serve_on(listener: tokio::net::TcpListener, config: ForwarderConfig) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(
        zabbix = %config.zabbix_addr,
        receivers = config.hosts.len(),
        default_host = %config.default_host,
        "alert forwarder listening on http://{local}"
    );
    let app = build_router(AppState::new(config));
    axum::serve(listener, app).await?;
    Ok(())
}
