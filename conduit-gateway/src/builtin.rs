//! Built-in middlewares.

use crate::error::GatewayError;
use crate::middleware::{ErrorOutcome, HookResult, Middleware, PipelineContext};
use crate::request::RequestConfig;
use crate::response::Response;
use async_trait::async_trait;

/// Logging middleware that traces every phase of a request.
///
/// Register it last so it wraps everything else: it then logs the final
/// request configuration and the fully processed response or error.
pub struct LoggingMiddleware {
    log_headers: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_request(&self, config: RequestConfig) -> HookResult<RequestConfig> {
        tracing::debug!(
            method = %config.method,
            path = %config.path,
            retry = config.meta.retry_count,
            "Sending gateway request"
        );

        if self.log_headers {
            for (name, value) in &config.headers {
                tracing::trace!(header = %name, value = %value, "Request header");
            }
        }

        Ok(config)
    }

    async fn on_response(&self, response: Response) -> HookResult<Response> {
        tracing::debug!(
            method = %response.config().method,
            path = %response.config().path,
            status = response.status(),
            from_cache = response.is_from_cache(),
            retries = response.config().meta.retry_count,
            "Received gateway response"
        );

        if self.log_headers {
            for (name, value) in response.headers() {
                tracing::trace!(header = %name, value = %value, "Response header");
            }
        }

        Ok(response)
    }

    async fn on_error(&self, error: GatewayError, _ctx: &PipelineContext<'_>) -> ErrorOutcome {
        tracing::warn!(
            method = %error.config.method,
            path = %error.config.path,
            kind = %error.kind,
            status = ?error.status,
            code = ?error.code,
            retries = error.config.meta.retry_count,
            "Gateway request failed: {}",
            error.message
        );
        ErrorOutcome::Continue(error)
    }
}

/// Authentication middleware that adds an auth header to every request.
pub struct AuthMiddleware {
    auth_type: AuthType,
}

enum AuthType {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
}

impl AuthMiddleware {
    /// Create a bearer token middleware.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer(token.into()),
        }
    }

    /// Create a basic auth middleware.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Create an API key middleware.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::ApiKey {
                header: header.into(),
                key: key.into(),
            },
        }
    }

    fn header(&self) -> (String, String) {
        match &self.auth_type {
            AuthType::Bearer(token) => ("Authorization".to_string(), format!("Bearer {}", token)),
            AuthType::Basic { username, password } => {
                use base64::Engine;
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                ("Authorization".to_string(), format!("Basic {}", credentials))
            }
            AuthType::ApiKey { header, key } => (header.clone(), key.clone()),
        }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &str {
        "auth"
    }

    async fn on_request(&self, mut config: RequestConfig) -> HookResult<RequestConfig> {
        let (name, value) = self.header();
        config
            .headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        config.headers.insert(name, value);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bearer() {
        let config = AuthMiddleware::bearer("t0k3n")
            .on_request(RequestConfig::get("/x").header("authorization", "stale"))
            .await
            .unwrap();

        assert_eq!(config.header_value("Authorization"), Some("Bearer t0k3n"));
        assert_eq!(config.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_basic() {
        let config = AuthMiddleware::basic("user", "pass")
            .on_request(RequestConfig::get("/x"))
            .await
            .unwrap();

        assert_eq!(config.header_value("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn test_api_key() {
        let config = AuthMiddleware::api_key("apikey", "anon-key")
            .on_request(RequestConfig::get("/x"))
            .await
            .unwrap();

        assert_eq!(config.header_value("apikey"), Some("anon-key"));
    }

    #[tokio::test]
    async fn test_logging_passes_through() {
        let logging = LoggingMiddleware::new().with_headers();
        let config = RequestConfig::get("/x").header("X-Trace", "1");

        let out = logging.on_request(config.clone()).await.unwrap();
        assert_eq!(out, config);
        assert_eq!(logging.name(), "logging");
    }
}
