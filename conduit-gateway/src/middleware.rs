//! Middleware contracts.
//!
//! A middleware is a named set of three optional hooks. The orchestrator runs
//! `on_request` hooks in registration order and `on_response` / `on_error`
//! hooks in reverse registration order, so the last registered middleware
//! wraps all the others.

use crate::error::{ErrorKind, GatewayError, MiddlewareError, Result, codes};
use crate::gateway::Gateway;
use crate::request::RequestConfig;
use crate::response::Response;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

/// Result of a request or response hook.
pub type HookResult<T> = std::result::Result<T, MiddlewareError>;

/// Closure run on the request phase.
pub type RequestHookFn = Box<dyn Fn(RequestConfig) -> HookResult<RequestConfig> + Send + Sync>;

/// Closure run on the response phase.
pub type ResponseHookFn = Box<dyn Fn(Response) -> HookResult<Response> + Send + Sync>;

/// Closure run on the error phase.
pub type ErrorHookFn = Box<dyn Fn(GatewayError) -> ErrorOutcome + Send + Sync>;

/// What an error hook decided.
#[derive(Debug)]
pub enum ErrorOutcome {
    /// Hand the (possibly rewritten) error to the next error hook.
    Continue(GatewayError),
    /// Recover: end the error phase and return this response to the caller.
    Recover(Response),
    /// End the error phase and fail with this error without running the
    /// remaining error hooks.
    Propagate(GatewayError),
}

/// Handle given to error hooks for the request being processed.
pub struct PipelineContext<'a> {
    gateway: &'a Gateway,
    cancel: &'a CancellationToken,
}

impl<'a> PipelineContext<'a> {
    pub(crate) fn new(gateway: &'a Gateway, cancel: &'a CancellationToken) -> Self {
        Self { gateway, cancel }
    }

    /// Run `config` through the whole pipeline again, sharing this request's
    /// cancellation token.
    ///
    /// The reissued pipeline runs on its own task, so nesting depth is not
    /// bounded by the caller's stack. The task is aborted if this future is
    /// dropped.
    pub async fn reissue(&self, config: RequestConfig) -> Result<Response> {
        let gateway = self.gateway.clone();
        let cancel = self.cancel.clone();
        let snapshot = config.clone();

        let task = AbortOnDropHandle::new(tokio::spawn(async move {
            gateway.execute(config, cancel).await
        }));

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(GatewayError::cancelled(snapshot)),
            Err(e) => Err(GatewayError::new(
                ErrorKind::Middleware,
                format!("Reissued request failed to complete: {}", e),
                snapshot,
            )
            .with_code(codes::MIDDLEWARE)),
        }
    }

    /// Cancellation token of the caller's request.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    /// Whether the caller cancelled the request.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The gateway running the pipeline.
    pub fn gateway(&self) -> &Gateway {
        self.gateway
    }
}

/// Middleware hooking into the request, response and error phases.
///
/// Every hook defaults to passing its input through unchanged. A hook that
/// returns `Err` from `on_request` or `on_response` aborts the request with an
/// `ErrorKind::Middleware` error that skips the error phase.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and middleware errors.
    fn name(&self) -> &str;

    /// Inspect or replace the request configuration before it is sent.
    async fn on_request(&self, config: RequestConfig) -> HookResult<RequestConfig> {
        Ok(config)
    }

    /// Inspect or replace a successful response.
    async fn on_response(&self, response: Response) -> HookResult<Response> {
        Ok(response)
    }

    /// Inspect, replace or recover from an error.
    async fn on_error(&self, error: GatewayError, _ctx: &PipelineContext<'_>) -> ErrorOutcome {
        ErrorOutcome::Continue(error)
    }
}

/// Middleware assembled from closures.
///
/// ```
/// use conduit_gateway::{hooks, ErrorOutcome};
///
/// let trace = hooks("trace")
///     .on_request(|config| Ok(config.header("X-Trace", "on")))
///     .on_error(ErrorOutcome::Continue);
/// ```
pub struct FnMiddleware {
    name: String,
    request: Option<RequestHookFn>,
    response: Option<ResponseHookFn>,
    error: Option<ErrorHookFn>,
}

/// Start building a closure-based middleware.
pub fn hooks(name: impl Into<String>) -> FnMiddleware {
    FnMiddleware::new(name)
}

impl FnMiddleware {
    /// Create a middleware with no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: None,
            response: None,
            error: None,
        }
    }

    /// Set the request hook.
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(RequestConfig) -> HookResult<RequestConfig> + Send + Sync + 'static,
    {
        self.request = Some(Box::new(hook));
        self
    }

    /// Set the response hook.
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(Response) -> HookResult<Response> + Send + Sync + 'static,
    {
        self.response = Some(Box::new(hook));
        self
    }

    /// Set the error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(GatewayError) -> ErrorOutcome + Send + Sync + 'static,
    {
        self.error = Some(Box::new(hook));
        self
    }
}

#[async_trait]
impl Middleware for FnMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_request(&self, config: RequestConfig) -> HookResult<RequestConfig> {
        match &self.request {
            Some(hook) => hook(config),
            None => Ok(config),
        }
    }

    async fn on_response(&self, response: Response) -> HookResult<Response> {
        match &self.response {
            Some(hook) => hook(response),
            None => Ok(response),
        }
    }

    async fn on_error(&self, error: GatewayError, _ctx: &PipelineContext<'_>) -> ErrorOutcome {
        match &self.error {
            Some(hook) => hook(error),
            None => ErrorOutcome::Continue(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_fn_middleware_defaults_pass_through() {
        let middleware = hooks("noop");
        let config = RequestConfig::get("/x").param("a", 1);

        let out = Middleware::on_request(&middleware, config.clone()).await.unwrap();
        assert_eq!(out, config);

        let response = Response::new(serde_json::Value::Null, 200, HashMap::new(), config);
        let out = Middleware::on_response(&middleware, response.clone()).await.unwrap();
        assert_eq!(out, response);
        assert_eq!(middleware.name(), "noop");
    }

    #[tokio::test]
    async fn test_fn_middleware_runs_hooks() {
        let middleware = hooks("tag")
            .on_request(|config| Ok(config.header("X-Tag", "1")))
            .on_response(|response| Ok(response.with_header("X-Seen", "yes")));

        let config = Middleware::on_request(&middleware, RequestConfig::get("/x")).await.unwrap();
        assert_eq!(config.header_value("x-tag"), Some("1"));

        let response = Response::new(serde_json::Value::Null, 200, HashMap::new(), config);
        let response = Middleware::on_response(&middleware, response).await.unwrap();
        assert_eq!(response.header("x-seen"), Some("yes"));
    }

    #[tokio::test]
    async fn test_fn_middleware_request_failure() {
        let middleware = hooks("guard").on_request(|_| Err(MiddlewareError::new("denied")));

        let err = Middleware::on_request(&middleware, RequestConfig::get("/x"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "denied");
    }

    #[test]
    fn test_error_outcome_debug() {
        let err = GatewayError::new(ErrorKind::Server, "boom", RequestConfig::get("/x"));
        let outcome = ErrorOutcome::Continue(err);
        assert!(format!("{:?}", outcome).starts_with("Continue"));
    }
}
