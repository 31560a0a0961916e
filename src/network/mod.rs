//! Transport helpers shared by the probes: the timeout boundary and the
//! mapping from transport errors to probe failure kinds.

use crate::error::{sanitize_error, ProbeError, ProbeErrorKind};
use reqwest::{Client, Response, StatusCode};
use std::future::Future;
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tracing::debug;

/// Run `fut`, failing with a timeout error if it has not finished in `limit`
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::timeout(format!(
            "Operation timed out after {}s",
            limit.as_secs()
        ))),
    };
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, ok = result.is_ok(), "probe finished");
    result
}

/// Classify a socket-level error
pub fn io_error_kind(kind: ErrorKind) -> ProbeErrorKind {
    match kind {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ProbeErrorKind::Timeout,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::AddrNotAvailable
        | ErrorKind::NotFound
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => ProbeErrorKind::Unreachable,
        ErrorKind::PermissionDenied => ProbeErrorKind::AuthFailed,
        ErrorKind::InvalidData => ProbeErrorKind::MalformedResponse,
        _ => ProbeErrorKind::Other,
    }
}

/// Classify a failed HTTP request (no response received or body unreadable)
pub fn from_http_error(err: &reqwest::Error) -> ProbeError {
    let kind = if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else if err.is_connect() {
        ProbeErrorKind::Unreachable
    } else if err.is_decode() {
        ProbeErrorKind::MalformedResponse
    } else {
        ProbeErrorKind::Other
    };
    ProbeError::new(kind, err.to_string())
}

/// Classify a non-success HTTP status
pub fn status_error_kind(status: StatusCode) -> ProbeErrorKind {
    match status.as_u16() {
        401 | 403 => ProbeErrorKind::AuthFailed,
        404 | 502 | 503 => ProbeErrorKind::Unreachable,
        408 | 504 => ProbeErrorKind::Timeout,
        _ => ProbeErrorKind::Other,
    }
}

/// Turn a response into an error if its status is not 2xx
pub async fn check_status(response: Response) -> Result<Response, ProbeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProbeError::new(
        status_error_kind(status),
        format!("HTTP {}: {}", status, sanitize_error(&body, status.as_u16())),
    ))
}

/// HTTP client for the REST probes
pub fn http_client(timeout: Duration) -> Result<Client, ProbeError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("service-tester/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProbeError::other(e.to_string()))
}
