//! Pipeline orchestrator.

use crate::config::GatewayConfig;
use crate::error::{ErrorKind, GatewayError, Result, TransportError, codes};
use crate::middleware::{ErrorOutcome, Middleware, PipelineContext};
use crate::normalize::{Failure, normalize};
use crate::request::{Params, RequestConfig};
use crate::response::{Response, decode_body};
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

/// Client-side gateway to one backend.
///
/// Cloning is cheap; clones share the transport and middleware chain. The
/// gateway keeps no per-request state, so one instance can serve any number
/// of concurrent requests.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Gateway {
    /// Create a new gateway builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Names of the registered middlewares, in registration order.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.inner.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run a request through the pipeline and return the full response.
    pub async fn request(&self, config: RequestConfig) -> Result<Response> {
        self.execute(config, CancellationToken::new()).await
    }

    /// Run a request that the caller can abort through `cancel`.
    ///
    /// Cancellation reaches every retry issued on behalf of this request.
    pub async fn request_with_cancel(
        &self,
        config: RequestConfig,
        cancel: CancellationToken,
    ) -> Result<Response> {
        self.execute(config, cancel).await
    }

    /// Run a request and decode its payload.
    pub async fn send<T: DeserializeOwned>(&self, config: RequestConfig) -> Result<T> {
        let response = self.request(config).await?;
        Ok(response.into_typed::<T>()?.into_data())
    }

    /// GET `path` with query parameters.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        self.send(RequestConfig::get(path).params(params)).await
    }

    /// POST `body` as JSON to `path`.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(with_body(RequestConfig::post(path), body)?).await
    }

    /// PUT `body` as JSON to `path`.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(with_body(RequestConfig::put(path), body)?).await
    }

    /// PATCH `body` as JSON to `path`.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(with_body(RequestConfig::patch(path), body)?).await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(RequestConfig::delete(path)).await
    }

    /// Execute the three-phase pipeline.
    ///
    /// Boxed so that error hooks can re-enter it through
    /// [`PipelineContext::reissue`].
    pub(crate) fn execute(
        &self,
        config: RequestConfig,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            if !config.has_supported_method() {
                return Err(GatewayError::new(
                    ErrorKind::Request,
                    format!("Unsupported method {}", config.method),
                    config,
                )
                .with_code(codes::INVALID_METHOD));
            }

            let config = self.request_phase(config).await?;

            let response = if config.meta.from_cache {
                trace!(method = %config.method, path = %config.path, "Serving from cache");
                let data = config.meta.cached_data.clone().unwrap_or(Value::Null);
                Response::new(data, 200, HashMap::new(), config)
            } else {
                match self.dispatch(&config, &cancel).await {
                    Ok(raw) => Response::new(decode_body(&raw.body), raw.status, raw.headers, config),
                    Err(failure) => {
                        let error = normalize(failure, &config);
                        return self.error_phase(error, &cancel).await;
                    }
                }
            };

            self.response_phase(response).await
        })
    }

    async fn request_phase(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        for middleware in &self.inner.middlewares {
            let snapshot = config.clone();
            config = middleware
                .on_request(config)
                .await
                .map_err(|e| GatewayError::middleware(middleware.name(), e, snapshot))?;
        }
        Ok(config)
    }

    async fn response_phase(&self, mut response: Response) -> Result<Response> {
        for middleware in self.inner.middlewares.iter().rev() {
            let config = response.config().clone();
            response = middleware
                .on_response(response)
                .await
                .map_err(|e| GatewayError::middleware(middleware.name(), e, config))?;
        }
        Ok(response)
    }

    async fn error_phase(&self, error: GatewayError, cancel: &CancellationToken) -> Result<Response> {
        let ctx = PipelineContext::new(self, cancel);
        let mut error = error;

        for middleware in self.inner.middlewares.iter().rev() {
            match middleware.on_error(error, &ctx).await {
                ErrorOutcome::Continue(next) => error = next,
                ErrorOutcome::Recover(response) => {
                    debug!(
                        middleware = middleware.name(),
                        status = response.status(),
                        "Error recovered by middleware"
                    );
                    return Ok(response);
                }
                ErrorOutcome::Propagate(final_error) => return Err(final_error),
            }
        }

        Err(error)
    }

    /// Send one attempt through the transport, racing timeout and cancellation.
    async fn dispatch(
        &self,
        config: &RequestConfig,
        cancel: &CancellationToken,
    ) -> std::result::Result<TransportResponse, Failure> {
        if cancel.is_cancelled() {
            return Err(Failure::Cancelled);
        }

        let request = self.build_transport_request(config).map_err(Failure::Transport)?;
        let timeout = request.timeout;

        debug!(
            method = %request.method,
            url = %request.url,
            attempt = config.meta.retry_count + 1,
            "Dispatching request"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Failure::Cancelled),
            result = tokio::time::timeout(timeout, self.inner.transport.perform(request)) => result,
        };

        match result {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(Failure::Status(response)),
            Ok(Err(error)) => Err(Failure::Transport(error)),
            Err(_) => Err(Failure::Transport(TransportError::Timeout(timeout))),
        }
    }

    fn build_transport_request(
        &self,
        config: &RequestConfig,
    ) -> std::result::Result<TransportRequest, TransportError> {
        let url = self.build_url(config)?;

        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in self
            .inner
            .config
            .default_headers
            .iter()
            .map(|(k, v)| (k, v))
            .chain(config.headers.iter())
        {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        let body = match &config.body {
            Some(body) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                let encoded = serde_json::to_vec(body)
                    .map_err(|e| TransportError::Other(format!("failed to encode body: {}", e)))?;
                Some(Bytes::from(encoded))
            }
            None => None,
        };

        Ok(TransportRequest {
            method: config.method.clone(),
            url,
            headers,
            body,
            timeout: config.timeout.unwrap_or(self.inner.config.timeout),
        })
    }

    /// Resolve `path` against the base URL and append the query string.
    fn build_url(&self, config: &RequestConfig) -> std::result::Result<Url, TransportError> {
        let mut url = match (Url::parse(&config.path), &self.inner.config.base_url) {
            (Ok(absolute), _) => absolute,
            (Err(_), Some(base)) => {
                let joined = format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    config.path.trim_start_matches('/')
                );
                Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", joined, e)))?
            }
            (Err(e), None) => {
                return Err(TransportError::InvalidUrl(format!("{}: {}", config.path, e)));
            }
        };

        let params: BTreeMap<&String, &Value> = config.params.iter().collect();
        if params.values().any(|v| !v.is_null()) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                match value {
                    Value::Null => {}
                    Value::String(s) => {
                        pairs.append_pair(key, s);
                    }
                    other => {
                        pairs.append_pair(key, &other.to_string());
                    }
                }
            }
        }

        Ok(url)
    }
}

fn with_body<B: Serialize + ?Sized>(config: RequestConfig, body: &B) -> Result<RequestConfig> {
    match serde_json::to_value(body) {
        Ok(value) => Ok(config.body(value)),
        Err(e) => Err(GatewayError::new(
            ErrorKind::Request,
            format!("Failed to serialize request body: {}", e),
            config,
        )
        .with_code(codes::INVALID_BODY)
        .with_cause(e)),
    }
}

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    transport: Option<Arc<dyn Transport>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl GatewayBuilder {
    /// Set the gateway configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Use a custom transport instead of the default reqwest one.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a shared transport.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a middleware. Registration order is significant.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Register a shared middleware.
    pub fn shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Build the gateway.
    ///
    /// Fails only when no transport was given and the default reqwest client
    /// cannot be constructed.
    pub fn build(self) -> std::result::Result<Gateway, TransportError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config.transport)?),
        };

        Ok(Gateway {
            inner: Arc::new(Inner {
                config: self.config,
                transport,
                middlewares: self.middlewares,
            }),
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.config.base_url)
            .field("middlewares", &self.middleware_names())
            .finish()
    }
}
