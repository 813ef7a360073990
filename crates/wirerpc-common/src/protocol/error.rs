use std::fmt;

use serde_json::{Map, Value};

/// Standard JSON-RPC 2.0 error codes.
///
/// The five codes defined by JSON-RPC 2.0 plus the implementation defined
/// server error range (`-32000` to `-32099`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received (-32700)
    ParseError,
    /// The JSON is valid but is not a conforming Request object (-32600)
    InvalidRequest,
    /// The method does not exist / is not registered (-32601)
    MethodNotFound,
    /// Invalid method parameter(s) (-32602)
    InvalidParams,
    /// Internal JSON-RPC error (-32603)
    InternalError,
    /// Application defined error in the -32000..=-32099 range
    ServerError(i64),
}

impl ErrorCode {
    /// Numeric wire value of this code.
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerError(code) => *code,
        }
    }

    /// Default human readable message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError(_) => "Server error",
        }
    }

    /// Map a wire value back to an `ErrorCode`.
    ///
    /// Codes outside the standard set are carried through as
    /// `ServerError`, which is what peers in the wild actually send.
    pub fn from_code(code: i64) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            other => ErrorCode::ServerError(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A JSON-RPC 2.0 error object: code, message and optional data payload.
///
/// This single type carries protocol errors, dispatch errors and handler
/// raised errors; the code tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    code: ErrorCode,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700): the body was not valid JSON.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    /// Invalid request (-32600): valid JSON that is not a Request object.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("method not found: {}", method),
        )
    }

    /// Invalid params (-32602): arity or element type mismatch.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// Internal error (-32603): unexpected handler or transport failure.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Application defined error.
    ///
    /// # Panics
    ///
    /// Panics when `code` is outside the reserved -32000..=-32099 range.
    pub fn server_error(code: i64, message: impl Into<String>) -> Self {
        assert!(
            (-32099..=-32000).contains(&code),
            "server error code must be in range -32099..=-32000"
        );
        Self::new(ErrorCode::ServerError(code), message)
    }

    /// Attach an additional data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Wire form: `{"code": .., "message": .., "data": ..}` with `data`
    /// omitted when absent.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("code".into(), Value::from(self.code.code()));
        obj.insert("message".into(), Value::from(self.message.clone()));
        if let Some(data) = &self.data {
            obj.insert("data".into(), data.clone());
        }
        Value::Object(obj)
    }

    /// Parse an error object received from a peer.
    ///
    /// Requires an integer `code` and a string `message`; `data` is kept
    /// verbatim when present.
    pub fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_request("error member must be an object"))?;
        let code = obj
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| RpcError::invalid_request("error object requires an integer code"))?;
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_request("error object requires a string message"))?;
        Ok(Self {
            code: ErrorCode::from_code(code),
            message: message.to_owned(),
            data: obj.get("data").cloned(),
        })
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
