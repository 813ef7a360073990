use serde_json::{Map, Value};

use crate::protocol::error::RpcError;

/// A JSON-RPC 2.0 response: an id plus either a result or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    id: Value,
    body: Result<Value, RpcError>,
}

impl Response {
    /// Creates a success response.
    pub fn success(result: Value, id: Value) -> Self {
        Self { id, body: Ok(result) }
    }

    /// Creates an error response.
    pub fn failure(error: RpcError, id: Value) -> Self {
        Self { id, body: Err(error) }
    }

    pub fn is_error(&self) -> bool {
        self.body.is_err()
    }

    pub fn result(&self) -> Option<&Value> {
        self.body.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RpcError> {
        self.body.as_ref().err()
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    /// Consumes the response, yielding the result or the error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        self.body
    }

    /// Wire form: `jsonrpc`, exactly one of `result`/`error`, and `id`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::from("2.0"));
        match &self.body {
            Ok(result) => obj.insert("result".into(), result.clone()),
            Err(error) => obj.insert("error".into(), error.to_json()),
        };
        obj.insert("id".into(), self.id.clone());
        Value::Object(obj)
    }

    /// Validates and parses a response object received from a peer.
    pub fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_request("response must be a JSON object"))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            _ => return Err(RpcError::invalid_request("jsonrpc must be the string \"2.0\"")),
        }

        let id = match obj.get("id") {
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id.clone(),
            Some(_) => {
                return Err(RpcError::invalid_request(
                    "id must be a string, a number or null",
                ))
            }
            None => return Err(RpcError::invalid_request("response requires an id")),
        };

        let body = match (obj.get("result"), obj.get("error")) {
            (Some(result), None) => Ok(result.clone()),
            (None, Some(error)) => Err(RpcError::from_json(error)?),
            _ => {
                return Err(RpcError::invalid_request(
                    "response requires exactly one of result and error",
                ))
            }
        };

        Ok(Self { id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let resp = Response::success(json!(42), json!(1));
        assert!(!resp.is_error());
        assert_eq!(resp.result(), Some(&json!(42)));
        assert_eq!(resp.error(), None);
        assert_eq!(resp.id(), &json!(1));
    }

    #[test]
    fn test_error_response() {
        let resp = Response::failure(RpcError::method_not_found("nope"), json!(7));
        assert!(resp.is_error());
        assert!(resp.result().is_none());
        assert_eq!(resp.error().unwrap().code().code(), -32601);
    }

    #[test]
    fn test_to_json_success_shape() {
        let json = Response::success(json!(30), json!(1)).to_json();
        assert_eq!(json["jsonrpc"], json!("2.0"));
        assert_eq!(json["result"], json!(30));
        assert_eq!(json["id"], json!(1));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_round_trip_is_identity() {
        let responses = [
            Response::success(json!({"v": [1, 2]}), json!("req-1")),
            Response::failure(RpcError::invalid_params("bad"), json!(3)),
            Response::failure(
                RpcError::server_error(-32050, "app").with_data(json!([1])),
                Value::Null,
            ),
        ];
        for resp in responses {
            assert_eq!(Response::from_json(&resp.to_json()).unwrap(), resp);
        }
    }

    #[test]
    fn test_from_json_rejects_both_result_and_error() {
        let value = json!({
            "jsonrpc": "2.0",
            "result": 1,
            "error": {"code": -32000, "message": "x"},
            "id": 1
        });
        assert!(Response::from_json(&value).is_err());
    }

    #[test]
    fn test_from_json_rejects_missing_id() {
        let value = json!({"jsonrpc": "2.0", "result": 1});
        assert!(Response::from_json(&value).is_err());
    }

    #[test]
    fn test_from_json_rejects_neither_member() {
        let value = json!({"jsonrpc": "2.0", "id": 1});
        assert!(Response::from_json(&value).is_err());
    }
}
