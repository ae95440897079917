//! Gateway error types.
//!
//! Every failure a caller can observe is a [`GatewayError`]. Transport
//! adapters report [`TransportError`], middleware hooks report
//! [`MiddlewareError`], and the orchestrator turns both into the canonical
//! shape before handing them on.

use crate::request::RequestConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Shared, type-erased error kept for diagnostics.
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Stable error codes carried in [`GatewayError::code`].
pub mod codes {
    /// The attempt exceeded its timeout.
    pub const TIMEOUT: &str = "ECONNABORTED";
    /// The connection could not be established or was dropped.
    pub const NETWORK: &str = "ERR_NETWORK";
    /// The server answered with a 5xx status.
    pub const BAD_RESPONSE: &str = "ERR_BAD_RESPONSE";
    /// The server answered with a non-5xx error status.
    pub const BAD_REQUEST: &str = "ERR_BAD_REQUEST";
    /// The caller cancelled the request.
    pub const CANCELED: &str = "ERR_CANCELED";
    /// The request URL could not be built.
    pub const INVALID_URL: &str = "ERR_INVALID_URL";
    /// The request method is not one the gateway sends.
    pub const INVALID_METHOD: &str = "ERR_INVALID_METHOD";
    /// The request body could not be serialized.
    pub const INVALID_BODY: &str = "ERR_INVALID_BODY";
    /// The response body did not decode into the requested type.
    pub const DECODE: &str = "ERR_DECODE";
    /// A middleware hook failed.
    pub const MIDDLEWARE: &str = "ERR_MIDDLEWARE";
}

/// Classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, DNS failure or timeout; no HTTP status.
    Transport,
    /// HTTP status >= 500.
    Server,
    /// Any other non-2xx HTTP status (normally 4xx).
    Client,
    /// A middleware hook failed. Never enters the error phase.
    Middleware,
    /// The caller cancelled the request.
    Cancelled,
    /// The response body could not be decoded into the requested type.
    Decode,
    /// The request itself was malformed (method, URL, body).
    Request,
}

impl ErrorKind {
    /// Kind for a failed HTTP status.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 {
            Self::Server
        } else {
            Self::Client
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Server => "server",
            Self::Client => "client",
            Self::Middleware => "middleware",
            Self::Cancelled => "cancelled",
            Self::Decode => "decode",
            Self::Request => "request",
        };
        f.write_str(name)
    }
}

/// Canonical gateway failure.
///
/// `config` is always the fully processed request configuration of the
/// attempt that failed, so callers can see how many retries were made.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    /// Human readable message.
    pub message: String,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    /// Stable error code, see [`codes`].
    pub code: Option<String>,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Request configuration the failure belongs to.
    pub config: RequestConfig,
    /// Underlying error.
    #[source]
    pub cause: Option<Cause>,
}

impl GatewayError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>, config: RequestConfig) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
            kind,
            config,
            cause: None,
        }
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Error for a request cancelled by the caller.
    pub fn cancelled(config: RequestConfig) -> Self {
        Self::new(ErrorKind::Cancelled, "Request canceled", config).with_code(codes::CANCELED)
    }

    /// Error for a failed middleware hook.
    pub fn middleware(name: &str, error: MiddlewareError, config: RequestConfig) -> Self {
        Self::new(
            ErrorKind::Middleware,
            format!("Middleware '{}' failed: {}", name, error),
            config,
        )
        .with_code(codes::MIDDLEWARE)
        .with_cause(error)
    }

    /// Error for a response body that does not decode into the requested type.
    pub fn decode(error: serde_json::Error, config: RequestConfig) -> Self {
        Self::new(
            ErrorKind::Decode,
            format!("Failed to decode response body: {}", error),
            config,
        )
        .with_code(codes::DECODE)
        .with_cause(error)
    }

    /// Check the error code.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.has_code(codes::TIMEOUT)
    }

    /// Check if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Decoded body of the failed response, when the server answered.
    pub fn response_data(&self) -> Option<&Value> {
        self.cause
            .as_deref()
            .and_then(|cause| cause.downcast_ref::<StatusFailure>())
            .map(|failure| &failure.data)
    }
}

/// Error returned by a middleware hook.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MiddlewareError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl MiddlewareError {
    /// Create a middleware error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error.
    pub fn from_source<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by a transport adapter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The attempt exceeded its timeout.
    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => codes::TIMEOUT,
            Self::Connection(_) | Self::Other(_) => codes::NETWORK,
            Self::InvalidUrl(_) => codes::INVALID_URL,
        }
    }
}

/// Error response received from the server, kept as the cause of a
/// status-carrying [`GatewayError`].
#[derive(Debug, Clone, Error)]
#[error("Server responded with status {status}")]
pub struct StatusFailure {
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Decoded response body.
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_status() {
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::Client);
    }

    #[test]
    fn test_builder_methods() {
        let err = GatewayError::new(ErrorKind::Server, "boom", RequestConfig::get("/x"))
            .with_status(502)
            .with_code(codes::BAD_RESPONSE);

        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.status, Some(502));
        assert!(err.has_code(codes::BAD_RESPONSE));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_response_data_from_cause() {
        let failure = StatusFailure {
            status: 422,
            headers: HashMap::new(),
            data: json!({"field": "name"}),
        };
        let err = GatewayError::new(ErrorKind::Client, "invalid", RequestConfig::post("/x"))
            .with_status(422)
            .with_cause(failure);

        assert_eq!(err.response_data(), Some(&json!({"field": "name"})));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_middleware_error_wraps_source() {
        let io = std::io::Error::other("disk full");
        let err = MiddlewareError::from_source(io);
        assert_eq!(err.message(), "disk full");

        let gateway_err = GatewayError::middleware("audit", err, RequestConfig::get("/x"));
        assert_eq!(gateway_err.kind, ErrorKind::Middleware);
        assert!(gateway_err.message.contains("audit"));
        assert!(gateway_err.has_code(codes::MIDDLEWARE));
    }

    #[test]
    fn test_transport_error_codes() {
        assert_eq!(
            TransportError::Timeout(Duration::from_millis(10)).code(),
            codes::TIMEOUT
        );
        assert_eq!(
            TransportError::Connection("refused".into()).code(),
            codes::NETWORK
        );
        assert_eq!(
            TransportError::Timeout(Duration::from_millis(1500)).to_string(),
            "timeout of 1500ms exceeded"
        );
    }
}
