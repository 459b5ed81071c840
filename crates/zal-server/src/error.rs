use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a webhook notification could not be forwarded.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request body is not valid json: {0}")]
    Decode(String),

    #[error("missing fields in request body: {0}")]
    Validation(String),

    #[error("can't reach zabbix at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out talking to zabbix at {0}")]
    Timeout(String),

    #[error("bad zabbix sender response: {0}")]
    Protocol(String),

    #[error("zabbix rejected {failed} of {total} values ({info})")]
    Rejected {
        failed: u64,
        total: u64,
        info: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ForwardError>() {
            Some(ForwardError::Decode(_) | ForwardError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(_) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
