//! Strict parsing and serialization of JSON-RPC 2.0 bodies.
//!
//! The codec works on whole HTTP bodies: a body is a single request object
//! or a JSON array of them (a batch), and symmetrically for responses. A
//! syntactically broken body is a `ParseError`; a well-formed body that does
//! not conform to the protocol is an `InvalidRequest`. An empty batch is
//! invalid per JSON-RPC 2.0.

use serde_json::Value;

use crate::protocol::error::RpcError;
use crate::protocol::requests::Request;
use crate::protocol::responses::Response;

/// Whether a parsed body is a batch (JSON array).
pub fn is_batch(value: &Value) -> bool {
    value.is_array()
}

/// Parses a request body into an ordered list of requests.
///
/// A single request yields a one-element list. A batch preserves input
/// order; the first non-conforming element aborts the whole batch.
pub fn parse_request(body: &str) -> Result<Vec<Request>, RpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RpcError::parse_error(format!("invalid JSON: {}", e)))?;
    parse_request_value(&value)
}

/// Same as [`parse_request`] for a body that is already parsed into a value.
pub fn parse_request_value(value: &Value) -> Result<Vec<Request>, RpcError> {
    match value {
        Value::Array(elements) => {
            if elements.is_empty() {
                return Err(RpcError::invalid_request("batch must not be empty"));
            }
            elements.iter().map(Request::from_json).collect()
        }
        other => Ok(vec![Request::from_json(other)?]),
    }
}

/// Serializes a single response.
pub fn serialize_response(response: &Response) -> String {
    response.to_json().to_string()
}

/// Serializes a batch of responses in the order supplied. An empty batch
/// serializes to `[]`.
pub fn serialize_batch_response(responses: &[Response]) -> String {
    Value::Array(responses.iter().map(Response::to_json).collect()).to_string()
}

/// Serializes a single request (client side).
pub fn serialize_request(request: &Request) -> String {
    request.to_json().to_string()
}

/// Serializes a batch of requests in the order supplied (client side).
pub fn serialize_batch_request(requests: &[Request]) -> String {
    Value::Array(requests.iter().map(Request::to_json).collect()).to_string()
}

/// Parses a single response body (client side).
pub fn parse_response(body: &str) -> Result<Response, RpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RpcError::parse_error(format!("invalid JSON: {}", e)))?;
    Response::from_json(&value)
}

/// Parses a batch response body (client side). The body must be a JSON
/// array of conforming response objects.
pub fn parse_batch_response(body: &str) -> Result<Vec<Response>, RpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RpcError::parse_error(format!("invalid JSON: {}", e)))?;
    match value {
        Value::Array(elements) => elements.iter().map(Response::from_json).collect(),
        _ => Err(RpcError::invalid_request("batch response must be an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_parse_single_request() {
        let requests = parse_request(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method(), "ping");
        assert!(requests[0].has_id());
    }

    #[test]
    fn test_parse_notification() {
        let requests =
            parse_request(r#"{"jsonrpc":"2.0","method":"update","params":[1,2,3]}"#).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].has_id());
    }

    #[test]
    fn test_parse_batch_preserves_order() {
        let body = r#"[
            {"jsonrpc":"2.0","method":"add","params":[1,2],"id":1},
            {"jsonrpc":"2.0","method":"notify","params":["hello"]},
            {"jsonrpc":"2.0","method":"multiply","params":[3,4],"id":2}
        ]"#;
        let requests = parse_request(body).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method(), "add");
        assert!(!requests[1].has_id());
        assert_eq!(requests[2].method(), "multiply");
    }

    #[test]
    fn test_parse_empty_batch_is_invalid() {
        let err = parse_request("[]").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_parse_truncated_body_is_parse_error() {
        let err = parse_request(r#"{"jsonrpc":"2.0","method":"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseError);
    }

    #[test]
    fn test_parse_wrong_version_is_invalid_request() {
        let err = parse_request(r#"{"jsonrpc":"1.0","method":"t","id":1}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_parse_missing_method_is_invalid_request() {
        let err = parse_request(r#"{"jsonrpc":"2.0","params":[],"id":1}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_bad_batch_element_aborts_batch() {
        let body = r#"[
            {"jsonrpc":"2.0","method":"ok","id":1},
            {"jsonrpc":"2.0","id":2}
        ]"#;
        let err = parse_request(body).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_serialize_response() {
        let body = serialize_response(&Response::success(json!(42), json!(1)));
        assert!(body.contains(r#""result":42"#));
        assert!(body.contains(r#""id":1"#));
        assert!(body.contains(r#""jsonrpc":"2.0""#));
    }

    #[test]
    fn test_serialize_error_response() {
        let body = serialize_response(&Response::failure(
            RpcError::invalid_params("bad params"),
            json!(1),
        ));
        assert!(body.contains(r#""error""#));
        assert!(body.contains(r#""code":-32602"#));
        assert!(body.contains(r#""message":"bad params""#));
    }

    #[test]
    fn test_serialize_batch_response() {
        let body = serialize_batch_response(&[
            Response::success(json!(3), json!(1)),
            Response::success(json!(2), json!(2)),
        ]);
        assert!(body.starts_with('['));
        assert!(body.ends_with(']'));
        assert!(body.contains(r#""id":1"#));
        assert!(body.contains(r#""id":2"#));
    }

    #[test]
    fn test_serialize_empty_batch_response() {
        assert_eq!(serialize_batch_response(&[]), "[]");
    }

    #[test]
    fn test_serialize_request_and_notification() {
        let call = serialize_request(&Request::new("add", json!([10, 20]), 1));
        assert!(call.contains(r#""method":"add""#));
        assert!(call.contains(r#""id":1"#));

        let note = serialize_request(&Request::notification("update", json!(["hello"])));
        assert!(!note.contains(r#""id""#));
    }

    #[test]
    fn test_serialize_batch_request() {
        let body = serialize_batch_request(&[
            Request::new("add", json!([1, 2]), 1),
            Request::new("subtract", json!([5, 3]), 2),
        ]);
        assert!(body.starts_with('['));
        assert!(body.contains(r#""method":"add""#));
        assert!(body.contains(r#""method":"subtract""#));
    }

    #[test]
    fn test_parse_response_with_result() {
        let resp = parse_response(r#"{"jsonrpc":"2.0","result":42,"id":1}"#).unwrap();
        assert!(!resp.is_error());
        assert_eq!(resp.result(), Some(&json!(42)));
    }

    #[test]
    fn test_parse_response_with_error() {
        let resp = parse_response(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#,
        )
        .unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error().unwrap().code(), ErrorCode::MethodNotFound);
    }

    #[test]
    fn test_parse_batch_response() {
        let body = r#"[
            {"jsonrpc":"2.0","result":3,"id":1},
            {"jsonrpc":"2.0","error":{"code":-32601,"message":"nope"},"id":2}
        ]"#;
        let responses = parse_batch_response(body).unwrap();
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].is_error());
        assert!(responses[1].is_error());
    }

    #[test]
    fn test_parse_batch_response_rejects_object() {
        assert!(parse_batch_response(r#"{"jsonrpc":"2.0","result":1,"id":1}"#).is_err());
    }

    #[test]
    fn test_single_request_round_trip() {
        let body = r#"{"jsonrpc":"2.0","method":"add","params":[10,20],"id":1}"#;
        let requests = parse_request(body).unwrap();
        let round: Value = serde_json::from_str(&serialize_request(&requests[0])).unwrap();
        let original: Value = serde_json::from_str(body).unwrap();
        assert_eq!(round, original);
    }

    #[test]
    fn test_is_batch() {
        assert!(is_batch(&json!([{"jsonrpc": "2.0", "method": "t", "id": 1}])));
        assert!(!is_batch(&json!({"jsonrpc": "2.0", "method": "t", "id": 1})));
    }
}
