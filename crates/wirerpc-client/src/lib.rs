//! wirerpc client: synchronous, asynchronous and batch JSON-RPC calls
//! over HTTP/1.1.
//!
//! See [`Client`] for the full surface: `call`/`call_value` (sync),
//! `async_call` (callback-based, driven by the caller through the event
//! loop), `notify` (fire and forget) and `call_batch`.

use std::sync::Arc;

pub mod client;

mod session;

pub use client::Client;
pub use wirerpc_common::protocol::{ErrorCode, Request, Response, RpcError};

/// Diagnostics callback invoked on the thread driving the I/O.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;
