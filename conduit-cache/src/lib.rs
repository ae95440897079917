//! Storage backends for the Conduit response cache.
//!
//! The gateway's cache middleware persists entries through the [`CacheStore`]
//! trait, so the medium is pluggable: an in-process map for a single client,
//! or Redis when several processes should share cached responses.
//!
//! # Features
//!
//! - `redis` - Enable the Redis store
//!
//! # Examples
//!
//! ```
//! use conduit_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let cache = InMemoryCache::with_capacity(256);
//!
//! cache.set_json("GET:/users:{}", r#"{"data":[],"expiresAt":0}"#.to_string(), None).await?;
//! assert!(cache.exists("GET:/users:{}").await?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use error::{CacheError, CacheResult};
pub use memory::{DEFAULT_MAX_ENTRIES, InMemoryCache};
pub use traits::CacheStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::memory::InMemoryCache;
    pub use crate::traits::CacheStore;

    #[cfg(feature = "redis")]
    pub use crate::redis_cache::RedisCache;
}
