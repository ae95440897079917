//! Transport adapters.
//!
//! A [`Transport`] performs exactly one physical HTTP exchange. It does not
//! retry, cache or interpret status codes; the gateway pipeline does that.

use crate::config::TransportConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Fully resolved URL including the query string.
    pub url: Url,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Encoded request body.
    pub body: Option<Bytes>,
    /// Timeout for this exchange.
    pub timeout: Duration,
}

/// Raw HTTP response, whatever its status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Check if the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to perform an HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request. Any received response, including error statuses,
    /// is returned as `Ok`.
    async fn perform(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Transport backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport from configuration.
    pub fn new(config: &TransportConfig) -> std::result::Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let inner = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .inner
            .request(request.method, request.url)
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        tracing::trace!(status, bytes = body.len(), "Transport exchange complete");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidUrl(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
