//! JSON-RPC request objects.
//!
//! A [`Request`] is either a *call* (it carries an id and expects exactly one
//! response) or a *notification* (no id, no response ever). The distinction
//! is the presence of the id, not its value: an explicit `"id": null` is
//! still a call.

use serde_json::{Map, Value};

use crate::protocol::error::RpcError;

/// A JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    params: Value,
    id: Option<Value>,
}

impl Request {
    /// Creates a call with the given id.
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Creates a notification (no id, produces no response).
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// The request id, if this is a call.
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// `true` for calls, `false` for notifications.
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Validates and parses a single request object.
    ///
    /// Enforces the JSON-RPC 2.0 shape: `jsonrpc` must be the string
    /// `"2.0"`, `method` a non-empty string, `params` (when present) null,
    /// an array or an object, and `id` (when present) a string, a number or
    /// null. Anything else is an invalid request.
    pub fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_request("request must be a JSON object"))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            _ => return Err(RpcError::invalid_request("jsonrpc must be the string \"2.0\"")),
        }

        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_request("method must be a string"))?;
        if method.is_empty() {
            return Err(RpcError::invalid_request("method must not be empty"));
        }

        let params = match obj.get("params") {
            None => Value::Null,
            Some(p @ (Value::Null | Value::Array(_) | Value::Object(_))) => p.clone(),
            Some(_) => {
                return Err(RpcError::invalid_request(
                    "params must be an array, an object or null",
                ))
            }
        };

        let id = match obj.get("id") {
            None => None,
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => Some(id.clone()),
            Some(_) => {
                return Err(RpcError::invalid_request(
                    "id must be a string, a number or null",
                ))
            }
        };

        Ok(Self {
            method: method.to_owned(),
            params,
            id,
        })
    }

    /// Wire form of this request. `params` is omitted when null, `id` is
    /// omitted for notifications.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::from("2.0"));
        obj.insert("method".into(), Value::from(self.method.clone()));
        if !self.params.is_null() {
            obj.insert("params".into(), self.params.clone());
        }
        if let Some(id) = &self.id {
            obj.insert("id".into(), id.clone());
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_has_id() {
        let req = Request::new("add", json!([1, 2]), 1);
        assert!(req.has_id());
        assert_eq!(req.id(), Some(&json!(1)));
        assert_eq!(req.method(), "add");
    }

    #[test]
    fn test_notification_has_no_id() {
        let req = Request::notification("log", json!(["hello"]));
        assert!(!req.has_id());
        assert_eq!(req.id(), None);
    }

    #[test]
    fn test_from_json_accepts_conforming_request() {
        let req =
            Request::from_json(&json!({"jsonrpc": "2.0", "method": "ping", "id": 1})).unwrap();
        assert_eq!(req.method(), "ping");
        assert!(req.has_id());
        assert!(req.params().is_null());
    }

    #[test]
    fn test_from_json_null_id_is_a_call() {
        let req = Request::from_json(&json!({"jsonrpc": "2.0", "method": "m", "id": null}))
            .unwrap();
        assert!(req.has_id());
        assert_eq!(req.id(), Some(&Value::Null));
    }

    #[test]
    fn test_from_json_rejects_wrong_version() {
        assert!(Request::from_json(&json!({"jsonrpc": "1.0", "method": "m", "id": 1})).is_err());
        assert!(Request::from_json(&json!({"method": "m", "id": 1})).is_err());
        assert!(Request::from_json(&json!({"jsonrpc": 2.0, "method": "m", "id": 1})).is_err());
    }

    #[test]
    fn test_from_json_rejects_bad_method() {
        assert!(Request::from_json(&json!({"jsonrpc": "2.0", "id": 1})).is_err());
        assert!(Request::from_json(&json!({"jsonrpc": "2.0", "method": 42, "id": 1})).is_err());
        assert!(Request::from_json(&json!({"jsonrpc": "2.0", "method": "", "id": 1})).is_err());
    }

    #[test]
    fn test_from_json_rejects_scalar_params() {
        let value = json!({"jsonrpc": "2.0", "method": "m", "params": 3, "id": 1});
        assert!(Request::from_json(&value).is_err());
    }

    #[test]
    fn test_from_json_accepts_object_params() {
        let value = json!({"jsonrpc": "2.0", "method": "m", "params": {"a": 1}, "id": 1});
        let req = Request::from_json(&value).unwrap();
        assert_eq!(req.params(), &json!({"a": 1}));
    }

    #[test]
    fn test_from_json_rejects_bool_id() {
        let value = json!({"jsonrpc": "2.0", "method": "m", "id": true});
        assert!(Request::from_json(&value).is_err());
    }

    #[test]
    fn test_to_json_round_trips() {
        let req = Request::new("add", json!([10, 20]), 1);
        let round = Request::from_json(&req.to_json()).unwrap();
        assert_eq!(round, req);
    }

    #[test]
    fn test_notification_to_json_omits_id() {
        let req = Request::notification("update", json!(["x"]));
        let json = req.to_json();
        assert!(json.get("id").is_none());
        assert_eq!(json["method"], json!("update"));
    }
}
