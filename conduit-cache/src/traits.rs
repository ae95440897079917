//! Cache store trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value storage used by the response cache.
///
/// Values are opaque JSON strings. Implementations only need to be
/// best-effort: nothing above this trait assumes durability across process
/// restarts, and entry expiry is decided by the caller from the stored payload.
/// The optional `ttl` lets a backend reclaim space on its own schedule.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a JSON value from the cache.
    ///
    /// Returns `Ok(Some(value))` if the key exists, `Ok(None)` if not found,
    /// or an error if the operation fails.
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a JSON value in the cache, replacing any previous value.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The JSON string value
    /// * `ttl` - Optional time-to-live hint for the backend
    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a key from the cache. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete `key` only while it still holds `expected`.
    ///
    /// Returns whether the key was removed. The default implementation reads
    /// and deletes in two steps; stores with an atomic primitive override it.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> CacheResult<bool> {
        match self.get_json(key).await? {
            Some(current) if current == expected => {
                self.delete(key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Check if a key exists in the cache.
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get_json(key).await?.is_some())
    }

    /// Clear all keys owned by this store.
    async fn clear(&self) -> CacheResult<()>;
}
