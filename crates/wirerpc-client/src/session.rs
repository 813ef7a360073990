//! Per-call HTTP session.
//!
//! A session performs exactly one HTTP round trip: connect, handshake,
//! write the request, read the response. Every step is bounded by the
//! configured timeout and any failure is surfaced as an `InternalError`
//! embedding the failing step.

use std::future::Future;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpStream;

use wirerpc_common::protocol::{codec, Request, Response, RpcError};

use crate::Logger;

pub(crate) struct ClientSession {
    host: String,
    port: u16,
    timeout: Duration,
    logger: Option<Logger>,
}

impl ClientSession {
    pub(crate) fn new(
        host: String,
        port: u16,
        timeout: Duration,
        logger: Option<Logger>,
    ) -> Self {
        Self {
            host,
            port,
            timeout,
            logger,
        }
    }

    fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger(message);
        }
    }

    /// Synchronous call: one round trip, parsed into a response.
    pub(crate) async fn call(&self, request: &Request) -> Result<Response, RpcError> {
        let raw = self.exchange(codec::serialize_request(request)).await?;
        codec::parse_response(&raw)
    }

    /// Batch call: one round trip carrying several requests. An empty body
    /// (a batch of notifications only) yields an empty response list.
    pub(crate) async fn call_batch(&self, requests: &[Request]) -> Result<Vec<Response>, RpcError> {
        let raw = self.exchange(codec::serialize_batch_request(requests)).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        codec::parse_batch_response(&raw)
    }

    /// Asynchronous call: never fails, a failure is synthesized into an
    /// error response with a null id so the callback always fires with a
    /// `Response`.
    pub(crate) async fn call_async(&self, request: Request) -> Response {
        match self.call(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(%error, method = request.method(), "async call failed");
                self.log(&format!("async call failed: {}", error));
                Response::failure(error, Value::Null)
            }
        }
    }

    /// Notification: send and discard whatever comes back.
    pub(crate) async fn notify(&self, request: &Request) -> Result<(), RpcError> {
        let _ = self.exchange(codec::serialize_request(request)).await?;
        Ok(())
    }

    /// One HTTP POST exchange, every await bounded by the timeout.
    async fn exchange(&self, body: String) -> Result<String, RpcError> {
        let authority = format!("{}:{}", self.host, self.port);

        let stream = step(self.timeout, "connect", TcpStream::connect(authority.as_str())).await?;
        let (mut sender, connection) =
            step(self.timeout, "handshake", http1::handshake(TokioIo::new(stream))).await?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::debug!(%error, "client connection ended");
            }
        });

        let request = hyper::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(HOST, authority.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "jsonrpc-client")
            .body(Full::new(Bytes::from(body)))
            .map_err(|error| {
                RpcError::internal_error(format!("failed to build request: {}", error))
            })?;

        let response = step(self.timeout, "send request", sender.send_request(request)).await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            return Err(RpcError::internal_error(format!(
                "server returned HTTP {}",
                status
            )));
        }

        let collected =
            step(self.timeout, "read response", response.into_body().collect()).await?;
        Ok(String::from_utf8_lossy(&collected.to_bytes()).into_owned())
    }
}

/// Runs one transport step under the session deadline, wrapping failures
/// into `InternalError` with the step name embedded.
async fn step<T, E, F>(limit: Duration, what: &str, operation: F) -> Result<T, RpcError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(RpcError::internal_error(format!(
            "{} failed: {}",
            what, error
        ))),
        Err(_) => Err(RpcError::internal_error(format!(
            "{} timed out after {}ms",
            what,
            limit.as_millis()
        ))),
    }
}
