//! Per-connection HTTP session.
//!
//! Each accepted connection is served by one session task: read an HTTP
//! request, dispatch it through the shared registry, write the response,
//! repeat while the client keeps the connection alive. Protocol and
//! dispatch failures always become JSON-RPC error responses; transport
//! failures terminate the session.

use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use serde_json::Value;
use tokio::net::TcpStream;

use wirerpc_common::protocol::{codec, Response, RpcError};

use crate::registry::MethodRegistry;
use crate::Logger;

/// Per-operation deadline for reads and writes.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type HttpRequest = hyper::Request<Incoming>;
type HttpResponse = hyper::Response<Full<Bytes>>;
type SessionError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) fn log(logger: &Option<Logger>, message: &str) {
    if let Some(logger) = logger {
        logger(message);
    }
}

/// Drives one connection until the peer closes, a transport step fails or
/// an operation deadline expires.
pub(crate) async fn serve(stream: TcpStream, registry: Arc<MethodRegistry>, logger: Option<Logger>) {
    let io = TokioIo::new(stream);
    let service_registry = Arc::clone(&registry);
    let service_logger = logger.clone();
    let service = service_fn(move |request| {
        handle_request(Arc::clone(&service_registry), service_logger.clone(), request)
    });

    let served = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(REQUEST_TIMEOUT)
        .serve_connection(io, service)
        .await;

    if let Err(error) = served {
        tracing::debug!(%error, "session ended with transport error");
        log(&logger, &format!("session ended: {}", error));
    }
}

/// One HTTP exchange: gate, parse, dispatch, serialize.
async fn handle_request(
    registry: Arc<MethodRegistry>,
    logger: Option<Logger>,
    request: HttpRequest,
) -> Result<HttpResponse, SessionError> {
    if request.method() != Method::POST {
        log(
            &logger,
            &format!("rejected {} request: only POST is accepted", request.method()),
        );
        return Ok(plain_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
        ));
    }

    let json_content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if !json_content_type {
        log(&logger, "rejected request: content type is not application/json");
        return Ok(plain_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type",
        ));
    }

    let body = tokio::time::timeout(REQUEST_TIMEOUT, request.into_body().collect())
        .await
        .map_err(|_| "timed out reading request body")??
        .to_bytes();
    let body = String::from_utf8_lossy(&body);

    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(%error, "request body is not valid JSON");
            log(&logger, &format!("parse error: {}", error));
            return Ok(rpc_failure(RpcError::parse_error(format!(
                "invalid JSON: {}",
                error
            ))));
        }
    };

    let is_batch = codec::is_batch(&value);
    let requests = match codec::parse_request_value(&value) {
        Ok(requests) => requests,
        Err(error) => {
            log(&logger, &format!("invalid request: {}", error));
            return Ok(rpc_failure(error));
        }
    };

    if is_batch {
        let responses = registry.invoke_batch(requests).await;
        if responses.is_empty() {
            Ok(no_content())
        } else {
            Ok(json_response(codec::serialize_batch_response(&responses)))
        }
    } else {
        match registry.invoke(&requests[0]) {
            Some(response) => Ok(json_response(codec::serialize_response(&response))),
            None => Ok(no_content()),
        }
    }
}

fn json_response(body: String) -> HttpResponse {
    hyper::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response construction")
}

fn rpc_failure(error: RpcError) -> HttpResponse {
    json_response(codec::serialize_response(&Response::failure(
        error,
        Value::Null,
    )))
}

fn no_content() -> HttpResponse {
    hyper::Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static response construction")
}

fn plain_response(status: StatusCode, body: &'static str) -> HttpResponse {
    hyper::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("static response construction")
}
