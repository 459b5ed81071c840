use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZalError {
    #[error("config error: {0}")]
    Config(String),

    #[error("duplicate alert rule name '{name}' in {path}")]
    DuplicateRule { name: String, path: String },

    #[error("login failed: {0}")]
    Auth(String),

    #[error("zabbix api error {code} ({message}): {data}")]
    Api {
        code: i64,
        message: String,
        data: String,
    },

    #[error("{method}: expected {expected} ids in result, got {got}")]
    CountMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("unresolved {kind} '{name}'")]
    UnresolvedReference { kind: &'static str, name: String },

    #[error("{kind} '{key}' has no remote id")]
    MissingId { kind: &'static str, key: String },

    #[error("unexpected response from {method}: {reason}")]
    Response { method: String, reason: String },

    /// Renders the whole chain itself, so it reports no `source()`.
    #[error("{op}: {inner}")]
    Context { op: String, inner: Box<ZalError> },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ZalError {
    /// Innermost error beneath any `Context` wrappers.
    pub fn root(&self) -> &ZalError {
        match self {
            ZalError::Context { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// The server no longer accepts the session token.
    pub fn is_session_expired(&self) -> bool {
        let ZalError::Api { message, data, .. } = self.root() else {
            return false;
        };
        let text = format!("{message} {data}").to_lowercase();
        ["re-login", "session terminated", "not authorised", "not authorized"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

pub type Result<T> = std::result::Result<T, ZalError>;

/// Attach operation context (entity kind, host name) to a failure.
pub trait ResultExt<T> {
    fn with_op<F, S>(self, op: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_op<F, S>(self, op: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| ZalError::Context {
            op: op().into(),
            inner: Box::new(e),
        })
    }
}
