//! Retry configuration, backoff strategies and the retry middleware.

use crate::error::{ErrorKind, GatewayError};
use crate::middleware::{ErrorOutcome, Middleware, PipelineContext};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Status codes that should trigger a retry.
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential {
                initial: Duration::from_millis(300),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with exponential backoff.
    pub fn exponential(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Create a retry config with linear backoff.
    pub fn linear(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Linear {
                delay,
                max: Duration::from_secs(30),
            },
            ..Default::default()
        }
    }

    /// Create a retry config with constant delay.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Constant(delay),
            ..Default::default()
        }
    }

    /// Create a retry config with no delay.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// Replace the retryable status codes.
    pub fn with_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry_status_codes = codes;
        self
    }

    /// Calculate delay before the retry following `retry_count` earlier retries.
    pub fn delay_for_attempt(&self, retry_count: u32) -> Duration {
        self.backoff.delay_for_attempt(retry_count)
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }

    /// Whether `error` is the kind of failure worth retrying, ignoring budget.
    ///
    /// Failures without a status (network, timeout) and failures with a
    /// configured status are eligible. Cancellation, middleware, decode and
    /// request errors never are, and neither is anything served from cache.
    pub fn is_retryable(&self, error: &GatewayError) -> bool {
        if error.config.meta.from_cache {
            return false;
        }

        match error.kind {
            ErrorKind::Transport => error.status.is_none(),
            ErrorKind::Server | ErrorKind::Client => error
                .status
                .is_some_and(|status| self.should_retry_status(status)),
            ErrorKind::Middleware
            | ErrorKind::Cancelled
            | ErrorKind::Decode
            | ErrorKind::Request => false,
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: `initial * multiplier^retry_count`.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given retry count (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => {
                let total = delay.saturating_mul(attempt.saturating_add(1));
                total.min(*max)
            }
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let millis = initial.as_millis() as f64 * factor;
                if !millis.is_finite() || millis >= max.as_millis() as f64 {
                    *max
                } else {
                    Duration::from_millis(millis as u64)
                }
            }
        }
    }
}

/// Retry policy consulted by [`RetryMiddleware`].
pub trait RetryStrategy: Send + Sync {
    /// Check if the request should be retried after `retry_count` retries.
    fn should_retry(&self, retry_count: u32, error: &GatewayError) -> bool;

    /// Get the delay before the next retry.
    fn retry_delay(&self, retry_count: u32) -> Duration;
}

impl RetryStrategy for RetryConfig {
    fn should_retry(&self, retry_count: u32, error: &GatewayError) -> bool {
        retry_count < self.max_retries && self.is_retryable(error)
    }

    fn retry_delay(&self, retry_count: u32) -> Duration {
        self.delay_for_attempt(retry_count)
    }
}

/// Error middleware that reissues transient failures through the pipeline.
///
/// The retry counter travels on the request configuration, so a retried
/// request that fails again re-enters this middleware one step further into
/// its budget. Once the budget is spent the error continues down the chain
/// unchanged.
pub struct RetryMiddleware<S = RetryConfig> {
    strategy: S,
}

impl RetryMiddleware<RetryConfig> {
    /// Retry with the default policy: three retries, 300ms exponential backoff.
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    /// Retry with the given configuration.
    pub fn with_config(config: RetryConfig) -> Self {
        Self { strategy: config }
    }
}

impl Default for RetryMiddleware<RetryConfig> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RetryStrategy> RetryMiddleware<S> {
    /// Retry with a custom strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self { strategy }
    }

    /// The retry strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

#[async_trait]
impl<S: RetryStrategy + 'static> Middleware for RetryMiddleware<S> {
    fn name(&self) -> &str {
        "retry"
    }

    async fn on_error(&self, error: GatewayError, ctx: &PipelineContext<'_>) -> ErrorOutcome {
        let retry_count = error.config.meta.retry_count;

        if !self.strategy.should_retry(retry_count, &error) {
            if retry_count > 0 {
                debug!(
                    retries = retry_count,
                    status = ?error.status,
                    "Not retrying request"
                );
            }
            return ErrorOutcome::Continue(error);
        }

        let delay = self.strategy.retry_delay(retry_count);
        warn!(
            method = %error.config.method,
            path = %error.config.path,
            attempt = retry_count + 1,
            delay_ms = delay.as_millis() as u64,
            status = ?error.status,
            error = %error,
            "Retrying request"
        );

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => {
                return ErrorOutcome::Continue(GatewayError::cancelled(error.config));
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let mut config = error.config;
        config.meta.retry_count += 1;

        match ctx.reissue(config).await {
            Ok(response) => ErrorOutcome::Recover(response),
            // The nested pipeline already ran the full error phase.
            Err(error) => ErrorOutcome::Propagate(error),
        }
    }
}
