//! Storage error types.

use thiserror::Error;

/// Result type for cache storage operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Failure reported by a [`CacheStore`](crate::CacheStore).
///
/// The response cache treats every variant as a miss, so stores may fail
/// freely without failing requests.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Command rejected by Redis.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The backend could not be reached.
    #[error("Cache backend unreachable: {0}")]
    Connection(String),

    /// Failure raised by a custom store.
    #[error("Cache backend error: {0}")]
    Backend(String),
}
