// Conduit - a client-side API gateway for unreliable backends
//
// This library wraps outbound HTTP calls in an ordered middleware pipeline
// with response caching and retry with exponential backoff.

// Re-export the gateway
pub use conduit_gateway::*;

// Re-export the cache storage crate
pub use conduit_cache;

pub use conduit_cache::{CacheError, CacheResult, CacheStore, InMemoryCache};

#[cfg(feature = "redis")]
pub use conduit_cache::RedisCache;

// Prelude for common imports
pub mod prelude {
    pub use conduit_cache::{CacheStore, InMemoryCache};
    pub use conduit_gateway::prelude::*;
}
