//! Request configuration.

use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Query parameters of a request.
pub type Params = HashMap<String, Value>;

/// Methods the gateway is willing to send.
pub const SUPPORTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// Pipeline bookkeeping carried by a request.
///
/// Middlewares read and update these fields on the copy of the configuration
/// they return; the orchestrator only inspects them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    /// Number of retries already issued for this logical request.
    pub retry_count: u32,
    /// Set by a request middleware to answer from cache and skip transport.
    pub from_cache: bool,
    /// Payload used for the synthesized response when `from_cache` is set.
    pub cached_data: Option<Value>,
}

/// Configuration of a single gateway request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    /// Path relative to the gateway base URL, or an absolute URL.
    pub path: String,
    /// HTTP method.
    pub method: Method,
    /// Query parameters.
    pub params: Params,
    /// JSON request body.
    pub body: Option<Value>,
    /// Request headers; these override the gateway defaults.
    pub headers: HashMap<String, String>,
    /// Per-attempt timeout; falls back to the gateway default.
    pub timeout: Option<Duration>,
    /// Retry and cache bookkeeping.
    pub meta: RequestMeta,
}

impl RequestConfig {
    /// Create a request configuration.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            params: Params::new(),
            body: None,
            headers: HashMap::new(),
            timeout: None,
            meta: RequestMeta::default(),
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add multiple query parameters.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in params {
            self.params.insert(k.into(), v.into());
        }
        self
    }

    /// Set the request body from an already built JSON value.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` into the request body.
    pub fn json<T: Serialize>(mut self, body: &T) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the method is one the gateway sends.
    pub fn has_supported_method(&self) -> bool {
        SUPPORTED_METHODS.contains(&self.method)
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let config = RequestConfig::get("/signals")
            .param("symbol", "BTC")
            .param("limit", 20)
            .header("X-Trace", "abc")
            .timeout(Duration::from_secs(5));

        assert_eq!(config.method, Method::GET);
        assert_eq!(config.params.get("symbol"), Some(&json!("BTC")));
        assert_eq!(config.params.get("limit"), Some(&json!(20)));
        assert_eq!(config.header_value("x-trace"), Some("abc"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.meta, RequestMeta::default());
    }

    #[test]
    fn test_json_body() {
        #[derive(Serialize)]
        struct Order {
            item: &'static str,
            quantity: u32,
        }

        let config = RequestConfig::post("/orders")
            .json(&Order {
                item: "widget",
                quantity: 5,
            })
            .unwrap();

        assert_eq!(config.body, Some(json!({"item": "widget", "quantity": 5})));
    }

    #[test]
    fn test_supported_methods() {
        assert!(RequestConfig::patch("/x").has_supported_method());
        assert!(!RequestConfig::new(Method::HEAD, "/x").has_supported_method());
        assert!(!RequestConfig::new(Method::OPTIONS, "/x").has_supported_method());
    }
}
