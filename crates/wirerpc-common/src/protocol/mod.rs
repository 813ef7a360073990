//! JSON-RPC 2.0 protocol layer.
//!
//! Core wire types and the strict codec:
//!
//! - [`Request`] / [`Response`]: call, notification and response objects
//!   with value-level validation (`from_json` / `to_json`)
//! - [`RpcError`] / [`ErrorCode`]: the prescribed error taxonomy
//! - [`codec`]: whole-body parse/serialize for single and batch traffic

pub mod codec;
pub mod error;
pub mod requests;
pub mod responses;

pub use error::{ErrorCode, RpcError};
pub use requests::Request;
pub use responses::Response;
