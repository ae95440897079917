//! Error normalization.
//!
//! Turns whatever went wrong during one transport attempt into a
//! [`GatewayError`], so error middlewares only ever see the canonical shape.

use crate::error::{ErrorKind, GatewayError, StatusFailure, TransportError, codes};
use crate::request::RequestConfig;
use crate::response::decode_body;
use crate::transport::TransportResponse;
use serde_json::Value;

/// Raw outcome of a failed transport attempt.
#[derive(Debug)]
pub enum Failure {
    /// The server answered with a status outside 2xx.
    Status(TransportResponse),
    /// The transport could not complete the exchange.
    Transport(TransportError),
    /// The caller cancelled the request.
    Cancelled,
}

/// Normalize a failed attempt into a [`GatewayError`] carrying `config`.
pub fn normalize(failure: Failure, config: &RequestConfig) -> GatewayError {
    let error = match failure {
        Failure::Status(response) => from_status(response, config),
        Failure::Transport(error) => from_transport(error, config),
        Failure::Cancelled => GatewayError::cancelled(config.clone()),
    };

    tracing::debug!(
        method = %config.method,
        path = %config.path,
        kind = %error.kind,
        status = ?error.status,
        code = ?error.code,
        "Normalized request failure"
    );

    error
}

fn from_status(response: TransportResponse, config: &RequestConfig) -> GatewayError {
    let status = response.status;
    let data = decode_body(&response.body);
    let message = server_message(&data)
        .unwrap_or_else(|| format!("Request failed with status code {}", status));
    let code = if status >= 500 {
        codes::BAD_RESPONSE
    } else {
        codes::BAD_REQUEST
    };

    GatewayError::new(ErrorKind::from_status(status), message, config.clone())
        .with_status(status)
        .with_code(code)
        .with_cause(StatusFailure {
            status,
            headers: response.headers,
            data,
        })
}

fn from_transport(error: TransportError, config: &RequestConfig) -> GatewayError {
    let kind = match error {
        TransportError::InvalidUrl(_) => ErrorKind::Request,
        _ => ErrorKind::Transport,
    };
    let message = error.to_string();
    let message = if message.is_empty() {
        "Unknown error".to_string()
    } else {
        message
    };

    GatewayError::new(kind, message, config.clone())
        .with_code(error.code())
        .with_cause(error)
}

/// Message supplied by the server in a JSON error body.
fn server_message(data: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|field| data.get(field).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn status_response(status: u16, body: &'static str) -> TransportResponse {
        TransportResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_server_status() {
        let config = RequestConfig::get("/insights");
        let err = normalize(Failure::Status(status_response(503, "")), &config);

        assert_eq!(err.status, Some(503));
        assert_eq!(err.kind, ErrorKind::Server);
        assert!(err.has_code(codes::BAD_RESPONSE));
        assert_eq!(err.message, "Request failed with status code 503");
        assert_eq!(err.config, config);
        assert_eq!(err.response_data(), Some(&Value::Null));
    }

    #[test]
    fn test_client_status_uses_server_message() {
        let config = RequestConfig::post("/orders");
        let err = normalize(
            Failure::Status(status_response(404, r#"{"message":"order not found"}"#)),
            &config,
        );

        assert_eq!(err.status, Some(404));
        assert_eq!(err.kind, ErrorKind::Client);
        assert!(err.has_code(codes::BAD_REQUEST));
        assert_eq!(err.message, "order not found");
        assert_eq!(
            err.response_data(),
            Some(&json!({"message": "order not found"}))
        );
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let config = RequestConfig::get("/health");
        let err = normalize(
            Failure::Transport(TransportError::Timeout(Duration::from_millis(250))),
            &config,
        );

        assert_eq!(err.status, None);
        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(err.is_timeout());
        assert_eq!(err.message, "timeout of 250ms exceeded");
        assert!(err.cause.is_some());
    }

    #[test]
    fn test_invalid_url_is_request_error() {
        let err = normalize(
            Failure::Transport(TransportError::InvalidUrl("relative URL".into())),
            &RequestConfig::get("nope"),
        );

        assert_eq!(err.kind, ErrorKind::Request);
        assert!(err.has_code(codes::INVALID_URL));
    }

    #[test]
    fn test_cancelled() {
        let err = normalize(Failure::Cancelled, &RequestConfig::get("/x"));

        assert!(err.is_cancelled());
        assert_eq!(err.status, None);
        assert!(err.has_code(codes::CANCELED));
    }
}
