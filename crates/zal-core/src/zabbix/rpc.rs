use crate::error::{Result, ZalError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A JSON-RPC transport bound to one Zabbix server session.
pub trait RpcClient {
    /// Call `method` with `params` and return the `result` member.
    fn call(&mut self, method: &str, params: Value) -> Result<Value>;
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a str>,
    id: u64,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

/// Methods whose params or result carry credentials; never logged.
const REDACTED_METHODS: &[&str] = &["user.login"];

// ---------------------------------------------------------------------------
// ZabbixClient
// ---------------------------------------------------------------------------

/// Blocking HTTP client for `api_jsonrpc.php`.
///
/// Every call after [`ZabbixClient::login`] is stamped with the session
/// token. Typical URL: `http://host/zabbix/api_jsonrpc.php`.
pub struct ZabbixClient {
    url: String,
    http: reqwest::blocking::Client,
    auth: Option<String>,
    next_id: u64,
}

impl ZabbixClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            url: url.into(),
            http,
            auth: None,
            next_id: 0,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `user.login` and keep the returned session token.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let params = serde_json::json!({ "user": user, "password": password });
        let result = self.request("user.login", params, false).map_err(|e| match e {
            ZalError::Api { message, data, .. } => ZalError::Auth(format!("{message}: {data}")),
            other => other,
        })?;
        let token = result
            .as_str()
            .ok_or_else(|| ZalError::Auth("user.login returned no session token".into()))?;
        self.auth = Some(token.to_string());
        tracing::debug!(url = %self.url, user, "logged in to zabbix api");
        Ok(())
    }

    /// `apiinfo.version`; must be sent without a session token.
    pub fn version(&mut self) -> Result<String> {
        let result = self.request("apiinfo.version", serde_json::json!([]), false)?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ZalError::Response {
                method: "apiinfo.version".into(),
                reason: "result is not a string".into(),
            })
    }

    fn request(&mut self, method: &str, params: Value, with_auth: bool) -> Result<Value> {
        self.next_id += 1;
        let body = Request {
            jsonrpc: "2.0",
            method,
            params,
            auth: if with_auth { self.auth.as_deref() } else { None },
            id: self.next_id,
        };
        let payload = serde_json::to_vec(&body)?;
        let redact = REDACTED_METHODS.contains(&method);
        if redact {
            tracing::trace!(method, id = body.id, "zabbix request (params redacted)");
        } else {
            // Params only: the envelope carries the session token.
            tracing::trace!(method, id = body.id, "zabbix request: {}", body.params);
        }

        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json-rpc")
            .body(payload)
            .send()?
            .error_for_status()?;
        let bytes = response.bytes()?;
        if !redact {
            tracing::trace!(method, "zabbix response: {}", String::from_utf8_lossy(&bytes));
        }

        let decoded: Response = serde_json::from_slice(&bytes)?;
        if let Some(err) = decoded.error {
            return Err(ZalError::Api {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        decoded.result.ok_or_else(|| ZalError::Response {
            method: method.to_string(),
            reason: "response has neither result nor error".into(),
        })
    }
}

impl RpcClient for ZabbixClient {
    fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.request(method, params, true)
    }
}
