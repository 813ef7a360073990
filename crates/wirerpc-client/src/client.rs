//! Client facade.
//!
//! [`Client`] owns two small current-thread runtimes: one dedicated to
//! synchronous round trips, and one event driver for asynchronous calls.
//! The driver advances only when the caller steps it through [`Client::run`],
//! [`Client::poll`], [`Client::run_for`] or [`Client::run_until_idle`];
//! callbacks fire exclusively from those drivers, on the calling thread.
//!
//! # Example
//!
//! ```no_run
//! use wirerpc_client::Client;
//!
//! let mut client = Client::new("127.0.0.1", 8080).unwrap();
//!
//! // Synchronous call.
//! let sum: i32 = client.call("add", (10, 20)).unwrap();
//! assert_eq!(sum, 30);
//!
//! // Asynchronous call; the callback fires while driving the loop.
//! client.async_call("add", |response| {
//!     println!("result: {:?}", response.result());
//! }, (1, 2));
//! client.run_until_idle();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

use wirerpc_common::convert::{FromJson, IntoParams};
use wirerpc_common::protocol::{Request, Response, RpcError};

use crate::session::ClientSession;
use crate::Logger;

/// Default per-operation timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A JSON-RPC 2.0 client over HTTP/1.1.
pub struct Client {
    host: String,
    port: u16,
    timeout: Duration,
    logger: Option<Logger>,
    next_id: AtomicU64,
    /// Runtime for synchronous round trips; never runs callbacks.
    blocking: Runtime,
    /// Event driver for asynchronous sessions, stepped only by the caller.
    driver: Runtime,
    pending: Mutex<JoinSet<()>>,
}

impl Client {
    /// Creates a client for the given server.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, RpcError> {
        Ok(Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            logger: None,
            next_id: AtomicU64::new(1),
            blocking: build_runtime()?,
            driver: build_runtime()?,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Sets the per-operation timeout for subsequent calls.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Sets the diagnostics callback. It fires on the thread driving the
    /// I/O, which for this client is the calling thread.
    pub fn set_logger<F>(&mut self, logger: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
    }

    /// Removes the diagnostics callback.
    pub fn clear_logger(&mut self) {
        self.logger = None;
    }

    /// Calls a method synchronously and converts the result to `R`.
    ///
    /// An error response and any transport failure both surface as `Err`.
    pub fn call<R: FromJson, P: IntoParams>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        let result = self.call_value(method, params)?;
        R::from_json(&result)
    }

    /// Calls a method synchronously, yielding the raw JSON result.
    pub fn call_value<P: IntoParams>(&self, method: &str, params: P) -> Result<Value, RpcError> {
        let request = Request::new(method, params.into_params(), self.next_id());
        let session = self.session();
        let response = self.blocking.block_on(session.call(&request))?;
        response.into_result()
    }

    /// Schedules an asynchronous call. The callback is invoked exactly once
    /// with the response (real, or synthesized on failure) when the event
    /// loop is driven.
    pub fn async_call<F>(&self, method: &str, callback: F, params: impl IntoParams)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let request = Request::new(method, params.into_params(), self.next_id());
        let session = self.session();
        self.pending
            .lock()
            .expect("pending set lock poisoned")
            .spawn_on(
                async move {
                    let response = session.call_async(request).await;
                    callback(response);
                },
                self.driver.handle(),
            );
    }

    /// Sends a notification. Best effort: transport failures are logged
    /// and swallowed, and any response bytes are discarded.
    pub fn notify(&self, method: &str, params: impl IntoParams) {
        let request = Request::notification(method, params.into_params());
        let session = self.session();
        if let Err(error) = self.blocking.block_on(session.notify(&request)) {
            tracing::debug!(%error, method, "notification failed");
            if let Some(logger) = &self.logger {
                logger(&format!("notification failed: {}", error));
            }
        }
    }

    /// Sends a batch of caller-built requests in one HTTP exchange and
    /// returns the responses in the order the server produced them.
    pub fn call_batch(&self, requests: &[Request]) -> Result<Vec<Response>, RpcError> {
        let session = self.session();
        self.blocking.block_on(session.call_batch(requests))
    }

    /// Allocates the next request id. Monotonic per client, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Drives the event loop until no asynchronous work remains.
    pub fn run(&mut self) {
        self.run_until_idle();
    }

    /// Drives the event loop until every in-flight asynchronous session has
    /// completed. Returns the number of sessions completed.
    pub fn run_until_idle(&mut self) -> usize {
        let pending = self.pending.get_mut().expect("pending set lock poisoned");
        self.driver.block_on(async {
            let mut completed = 0;
            while pending.join_next().await.is_some() {
                completed += 1;
            }
            completed
        })
    }

    /// Processes work that is already ready without waiting for more.
    /// Returns the number of sessions completed during the pass.
    pub fn poll(&mut self) -> usize {
        let pending = self.pending.get_mut().expect("pending set lock poisoned");
        if pending.is_empty() {
            return 0;
        }
        self.driver.block_on(async {
            // One yield lets the scheduler run everything that is ready.
            tokio::task::yield_now().await;
            std::future::poll_fn(|cx| {
                let mut completed = 0;
                while let Poll::Ready(Some(_)) = pending.poll_join_next(cx) {
                    completed += 1;
                }
                Poll::Ready(completed)
            })
            .await
        })
    }

    /// Drives the event loop for at most `duration`. Returns the number of
    /// sessions completed before the deadline.
    pub fn run_for(&mut self, duration: Duration) -> usize {
        let pending = self.pending.get_mut().expect("pending set lock poisoned");
        self.driver.block_on(async {
            let deadline = tokio::time::Instant::now() + duration;
            let mut completed = 0;
            while !pending.is_empty() {
                match tokio::time::timeout_at(deadline, pending.join_next()).await {
                    Ok(Some(_)) => completed += 1,
                    Ok(None) | Err(_) => break,
                }
            }
            completed
        })
    }

    /// Number of asynchronous sessions not yet completed.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().expect("pending set lock poisoned").len()
    }

    fn session(&self) -> ClientSession {
        ClientSession::new(
            self.host.clone(),
            self.port,
            self.timeout,
            self.logger.clone(),
        )
    }
}

fn build_runtime() -> Result<Runtime, RpcError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| {
            RpcError::internal_error(format!("failed to build client runtime: {}", error))
        })
}
