//! # Conduit Gateway
//!
//! A client-side request pipeline for talking to an unreliable, cold-starting
//! backend. Every call runs through an ordered middleware chain with three
//! phases:
//!
//! - **request**: hooks run in registration order and may rewrite the
//!   configuration or answer from cache
//! - **response**: hooks run in reverse registration order
//! - **error**: hooks run in reverse registration order and may recover the
//!   failure into a response
//!
//! ## Features
//!
//! - **Retry with Backoff**: transient failures are reissued through the whole
//!   pipeline with exponential backoff
//! - **Response Cache**: TTL cache over any [`conduit_cache::CacheStore`]
//! - **Normalized Errors**: every failure reaches callers as a [`GatewayError`]
//! - **Cancellation**: a caller token aborts the transport call and any
//!   pending retry wait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit_gateway::{
//!     CacheMiddleware, Gateway, LoggingMiddleware, Params, RetryMiddleware,
//! };
//! use conduit_cache::InMemoryCache;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::builder()
//!         .base_url("https://insights.example.com/api")
//!         .middleware(CacheMiddleware::new(InMemoryCache::new()))
//!         .middleware(RetryMiddleware::new())
//!         .middleware(LoggingMiddleware::new())
//!         .build()?;
//!
//!     let signals: serde_json::Value = gateway.get("/signals", Params::new()).await?;
//!     println!("{}", signals);
//!     Ok(())
//! }
//! ```

mod builtin;
mod cache;
mod clock;
mod config;
mod error;
mod gateway;
mod middleware;
mod normalize;
mod request;
mod response;
mod retry;
mod transport;

pub use builtin::{AuthMiddleware, LoggingMiddleware};
pub use cache::{CacheConfig, CacheEntry, CacheMiddleware, cache_key, canonical_json};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GatewayConfig, GatewayConfigBuilder, TransportConfig, TransportConfigBuilder};
pub use error::{
    Cause, ErrorKind, GatewayError, MiddlewareError, Result, StatusFailure, TransportError, codes,
};
pub use gateway::{Gateway, GatewayBuilder};
pub use middleware::{
    ErrorHookFn, ErrorOutcome, FnMiddleware, HookResult, Middleware, PipelineContext,
    RequestHookFn, ResponseHookFn, hooks,
};
pub use normalize::{Failure, normalize};
pub use request::{Params, RequestConfig, RequestMeta, SUPPORTED_METHODS};
pub use response::{Response, decode_body};
pub use retry::{BackoffStrategy, DEFAULT_RETRY_STATUS_CODES, RetryConfig, RetryMiddleware, RetryStrategy};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

// Re-export common types
pub use http::Method;
pub use tokio_util::sync::CancellationToken;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use conduit_gateway::prelude::*;
/// ```
pub mod prelude {
    pub use crate::builtin::{AuthMiddleware, LoggingMiddleware};
    pub use crate::cache::{CacheConfig, CacheMiddleware};
    pub use crate::config::{GatewayConfig, TransportConfig};
    pub use crate::error::{ErrorKind, GatewayError, MiddlewareError, Result};
    pub use crate::gateway::Gateway;
    pub use crate::middleware::{ErrorOutcome, Middleware, PipelineContext, hooks};
    pub use crate::request::{Params, RequestConfig};
    pub use crate::response::Response;
    pub use crate::retry::{BackoffStrategy, RetryConfig, RetryMiddleware};
    pub use crate::transport::{Transport, TransportRequest, TransportResponse};
    pub use http::Method;
    pub use tokio_util::sync::CancellationToken;
}
