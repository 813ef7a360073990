//! wirerpc server: typed dispatch and an HTTP/1.1 acceptor.
//!
//! The server side of wirerpc has two layers:
//!
//! - [`MethodRegistry`]: maps method names to typed handlers, converts
//!   JSON parameters to native types (with arity checking), and evaluates
//!   batches in parallel with input-order responses.
//! - [`Server`]: binds a listener, accepts connections and serves each one
//!   with keep-alive until stopped.
//!
//! # Example
//!
//! ```no_run
//! use wirerpc_server::Server;
//!
//! let server = Server::new(8080);
//! server.register("add", |a: i32, b: i32| a + b);
//! server.register("concat", |a: String, b: String| format!("{}{}", a, b));
//! server.start().unwrap();
//! // ... later
//! server.stop();
//! ```

use std::sync::Arc;

pub mod registry;
pub mod server;

mod session;

pub use registry::{MethodRegistry, RpcHandler};
pub use server::{Server, ServerError};
pub use wirerpc_common::protocol::{ErrorCode, Request, Response, RpcError};

/// Diagnostics callback invoked from I/O threads.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;
