//! Method registry and batch execution engine.
//!
//! The registry maps method names to erased handlers. Registration is typed:
//! any closure whose parameters implement `FromJson` and whose return value
//! implements `IntoRpcResult` can be registered, and the generated wrapper
//! performs the arity check, per-parameter conversion and result lifting
//! before/after the user code runs.
//!
//! Batch invocation fans entries out to blocking worker tasks bounded by a
//! configurable parallelism width, then reassembles responses in input
//! order with notification results dropped.
//!
//! # Example
//!
//! ```
//! use wirerpc_server::MethodRegistry;
//! use wirerpc_common::protocol::Request;
//! use serde_json::json;
//!
//! let registry = MethodRegistry::new();
//! registry.register("add", |a: i32, b: i32| a + b);
//!
//! let response = registry
//!     .invoke(&Request::new("add", json!([10, 20]), 1))
//!     .expect("calls produce a response");
//! assert_eq!(response.result(), Some(&json!(30)));
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use wirerpc_common::convert::{FromParams, IntoRpcResult};
use wirerpc_common::protocol::{Request, Response, RpcError};

/// A registered handler with its JSON boundary already erased.
type ErasedHandler = Arc<dyn Fn(&Value) -> Result<Value, RpcError> + Send + Sync>;

/// Typed handler registration.
///
/// Implemented for closures of arity 0 to 8. `Args` is the parameter tuple
/// and `Marker` disambiguates plain returns from `Result` returns; both are
/// inferred at the `register` call site.
pub trait RpcHandler<Args, Marker>: Send + Sync + 'static {
    fn invoke(&self, params: &Value) -> Result<Value, RpcError>;
}

macro_rules! impl_rpc_handler {
    ($($ty:ident),*) => {
        impl<Func, Ret, Marker, $($ty,)*> RpcHandler<($($ty,)*), Marker> for Func
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
            Ret: IntoRpcResult<Marker>,
            ($($ty,)*): FromParams,
        {
            #[allow(non_snake_case)]
            fn invoke(&self, params: &Value) -> Result<Value, RpcError> {
                let ($($ty,)*) = <($($ty,)*) as FromParams>::from_params(params)?;
                (self)($($ty),*).into_rpc_result()
            }
        }
    };
}

impl_rpc_handler!();
impl_rpc_handler!(A0);
impl_rpc_handler!(A0, A1);
impl_rpc_handler!(A0, A1, A2);
impl_rpc_handler!(A0, A1, A2, A3);
impl_rpc_handler!(A0, A1, A2, A3, A4);
impl_rpc_handler!(A0, A1, A2, A3, A4, A5);
impl_rpc_handler!(A0, A1, A2, A3, A4, A5, A6);
impl_rpc_handler!(A0, A1, A2, A3, A4, A5, A6, A7);

/// Batch worker pool: a permit source of the configured width. Replaced
/// wholesale when the width changes.
struct BatchPool {
    width: usize,
    permits: Arc<Semaphore>,
}

impl BatchPool {
    fn new(width: usize) -> Self {
        Self {
            width,
            permits: Arc::new(Semaphore::new(width)),
        }
    }
}

fn default_batch_width() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

/// Thread-safe mapping from method name to handler.
///
/// Shared by reference across all server sessions; registration is safe
/// concurrently with in-flight invocations, which resolve a handle under
/// the lock and then run lock-free.
pub struct MethodRegistry {
    methods: Mutex<HashMap<String, ErasedHandler>>,
    batch: Mutex<BatchPool>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: Mutex::new(HashMap::new()),
            batch: Mutex::new(BatchPool::new(default_batch_width())),
        }
    }

    /// Registers `handler` under `name`, replacing any previous entry.
    pub fn register<H, Args, Marker>(&self, name: impl Into<String>, handler: H)
    where
        H: RpcHandler<Args, Marker>,
    {
        let erased: ErasedHandler = Arc::new(move |params| handler.invoke(params));
        self.methods
            .lock()
            .expect("method map lock poisoned")
            .insert(name.into(), erased);
    }

    /// Sets the batch parallelism width (clamped to at least 1) and rebuilds
    /// the worker pool.
    pub fn set_batch_concurrency(&self, width: usize) {
        let width = width.max(1);
        *self.batch.lock().expect("batch pool lock poisoned") = BatchPool::new(width);
    }

    /// Current batch parallelism width.
    pub fn batch_concurrency(&self) -> usize {
        self.batch.lock().expect("batch pool lock poisoned").width
    }

    fn lookup(&self, method: &str) -> Option<ErasedHandler> {
        self.methods
            .lock()
            .expect("method map lock poisoned")
            .get(method)
            .cloned()
    }

    fn batch_permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.batch.lock().expect("batch pool lock poisoned").permits)
    }

    /// Runs a resolved handler, catching panics. `handler` is `None` when
    /// the method was not registered.
    fn execute(
        handler: Option<ErasedHandler>,
        request: &Request,
    ) -> Result<Value, RpcError> {
        let handler = handler.ok_or_else(|| RpcError::method_not_found(request.method()))?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(request.params())));
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(method = request.method(), %message, "handler panicked");
                Err(RpcError::internal_error(format!(
                    "handler failed: {}",
                    message
                )))
            }
        }
    }

    fn respond(outcome: Result<Value, RpcError>, request: &Request) -> Option<Response> {
        let id = request.id()?.clone();
        Some(match outcome {
            Ok(result) => Response::success(result, id),
            Err(error) => Response::failure(error, id),
        })
    }

    /// Invokes a single request.
    ///
    /// Calls yield exactly one response carrying the request id;
    /// notifications run for their side effects and yield `None`, whatever
    /// the outcome.
    pub fn invoke(&self, request: &Request) -> Option<Response> {
        let outcome = Self::execute(self.lookup(request.method()), request);
        Self::respond(outcome, request)
    }

    /// Invokes a batch of requests with bounded parallelism.
    ///
    /// Responses come back in the order of the call-carrying requests in the
    /// input; notifications contribute nothing. The future resolves only
    /// after every entry has completed, and a failure inside one entry never
    /// affects the others.
    pub async fn invoke_batch(&self, requests: Vec<Request>) -> Vec<Response> {
        let permits = self.batch_permits();
        let mut workers = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            // Resolve the handler handle up front; execution is lock-free.
            let handler = self.lookup(request.method());
            let permits = Arc::clone(&permits);
            workers.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .expect("batch pool semaphore closed");
                let id = request.id().cloned();
                let worker = tokio::task::spawn_blocking(move || {
                    let outcome = Self::execute(handler, &request);
                    Self::respond(outcome, &request)
                });
                let response = match worker.await {
                    Ok(response) => response,
                    // The wrapper already catches handler panics; this only
                    // fires if the worker task itself is torn down.
                    Err(join_error) => id.map(|id| {
                        Response::failure(
                            RpcError::internal_error(format!(
                                "batch worker failed: {}",
                                join_error
                            )),
                            id,
                        )
                    }),
                };
                (index, response)
            });
        }

        let mut indexed: Vec<(usize, Response)> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            if let Ok((index, Some(response))) = joined {
                indexed.push((index, response));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, response)| response).collect()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}
