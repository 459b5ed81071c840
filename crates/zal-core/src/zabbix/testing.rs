use super::rpc::RpcClient;
use crate::error::{Result, ZalError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

/// In-memory transport that records every call and replays canned results.
///
/// Unscripted methods answer like an empty, cooperative server: `get`
/// returns `[]`, `create` allocates sequential ids, `update` succeeds and
/// `delete` echoes the submitted ids.
#[derive(Default)]
pub(crate) struct ScriptedRpc {
    scripted: HashMap<String, VecDeque<Result<Value>>>,
    pub calls: Vec<(String, Value)>,
    next_id: u64,
}

impl ScriptedRpc {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            ..Default::default()
        }
    }

    pub fn on(mut self, method: &str, result: Value) -> Self {
        self.scripted
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(result));
        self
    }

    pub fn fail(mut self, method: &str, data: &str) -> Self {
        self.scripted
            .entry(method.to_string())
            .or_default()
            .push_back(Err(ZalError::Api {
                code: -32500,
                message: "Application error.".into(),
                data: data.into(),
            }));
        self
    }

    pub fn methods(&self) -> Vec<&str> {
        self.calls.iter().map(|(m, _)| m.as_str()).collect()
    }

    /// Methods that write to the server.
    pub fn writes(&self) -> Vec<&str> {
        self.methods()
            .into_iter()
            .filter(|m| !m.ends_with(".get"))
            .collect()
    }

    fn default_result(&mut self, method: &str, params: &Value) -> Value {
        let (api, verb) = method.split_once('.').unwrap_or((method, ""));
        let ids_field = match api {
            "hostgroup" => "groupids".to_string(),
            other => format!("{other}ids"),
        };
        match verb {
            "get" => json!([]),
            "create" => {
                let n = params.as_array().map(Vec::len).unwrap_or(1);
                let ids: Vec<String> = (0..n)
                    .map(|_| {
                        self.next_id += 1;
                        self.next_id.to_string()
                    })
                    .collect();
                json!({ ids_field: ids })
            }
            "delete" => json!({ ids_field: params }),
            _ => json!({}),
        }
    }
}

impl RpcClient for ScriptedRpc {
    fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.calls.push((method.to_string(), params.clone()));
        if let Some(next) = self.scripted.get_mut(method).and_then(VecDeque::pop_front) {
            return next;
        }
        Ok(self.default_result(method, &params))
    }
}
