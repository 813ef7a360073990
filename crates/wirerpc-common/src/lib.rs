//! wirerpc common types and conversion fabric.
//!
//! This crate provides the protocol layer shared by the wirerpc server and
//! client:
//!
//! - **Protocol**: JSON-RPC 2.0 request/response/error types and a strict
//!   codec for single and batch bodies ([`protocol`]).
//! - **Conversion fabric**: the [`ToJson`]/[`FromJson`] traits bridging
//!   JSON values and native parameter/return types, tuple extraction with
//!   arity checking, and argument packing for clients ([`convert`]).
//!
//! The value model is `serde_json::Value`; no bespoke JSON tree.
//!
//! # Example
//!
//! ```
//! use wirerpc_common::protocol::{codec, Request, Response};
//! use serde_json::json;
//!
//! let requests = codec::parse_request(
//!     r#"{"jsonrpc":"2.0","method":"add","params":[10,20],"id":1}"#,
//! ).unwrap();
//! assert_eq!(requests[0].method(), "add");
//!
//! let body = codec::serialize_response(&Response::success(json!(30), json!(1)));
//! assert!(body.contains("\"result\":30"));
//! ```

pub mod convert;
pub mod protocol;

pub use convert::{FromJson, FromParams, IntoParams, IntoRpcResult, ToJson};
pub use protocol::{ErrorCode, Request, Response, RpcError};
