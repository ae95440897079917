//! Gateway response.

use crate::error::{GatewayError, Result};
use crate::request::RequestConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Response produced by the gateway pipeline.
///
/// Responses are values: a middleware that wants to change one builds a new
/// response from the one it received.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T = Value> {
    data: T,
    status: u16,
    headers: HashMap<String, String>,
    config: RequestConfig,
}

impl<T> Response<T> {
    /// Create a response.
    pub fn new(
        data: T,
        status: u16,
        headers: HashMap<String, String>,
        config: RequestConfig,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            config,
        }
    }

    /// Response payload.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// HTTP status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Fully processed request configuration this response answers.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Whether the response was served from cache.
    pub fn is_from_cache(&self) -> bool {
        self.config.meta.from_cache
    }

    /// Consume the response and return the payload.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Replace the payload.
    pub fn with_data<U>(self, data: U) -> Response<U> {
        Response {
            data,
            status: self.status,
            headers: self.headers,
            config: self.config,
        }
    }

    /// Replace the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Transform the payload.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Response<U> {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            config: self.config,
        }
    }
}

impl Response<Value> {
    /// Decode the JSON payload into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Response<T>> {
        match serde_json::from_value(self.data) {
            Ok(data) => Ok(Response {
                data,
                status: self.status,
                headers: self.headers,
                config: self.config,
            }),
            Err(e) => Err(GatewayError::decode(e, self.config)),
        }
    }
}

/// Decode a raw body: empty becomes `null`, JSON is parsed, anything else
/// is kept as text.
pub fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(body).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, codes};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Signal {
        symbol: String,
        score: f64,
    }

    fn response(data: Value) -> Response {
        Response::new(data, 200, HashMap::new(), RequestConfig::get("/signals"))
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
    }

    #[test]
    fn test_into_typed() {
        let typed = response(json!({"symbol": "ETH", "score": 0.5}))
            .into_typed::<Signal>()
            .unwrap();

        assert_eq!(
            typed.data(),
            &Signal {
                symbol: "ETH".to_string(),
                score: 0.5
            }
        );
        assert_eq!(typed.status(), 200);
    }

    #[test]
    fn test_into_typed_failure_is_decode_error() {
        let err = response(json!({"unexpected": true}))
            .into_typed::<Signal>()
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Decode);
        assert!(err.has_code(codes::DECODE));
        assert_eq!(err.status, None);
        assert_eq!(err.config.path, "/signals");
    }

    #[test]
    fn test_rewriting_builds_new_response() {
        let rewritten = response(json!([1, 2, 3]))
            .with_header("X-Source", "test")
            .map(|data| data.as_array().map(Vec::len).unwrap_or_default());

        assert_eq!(*rewritten.data(), 3);
        assert_eq!(rewritten.header("x-source"), Some("test"));
        assert!(rewritten.is_success());
        assert!(!rewritten.is_from_cache());
    }
}
