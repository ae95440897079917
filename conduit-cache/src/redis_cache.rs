//! Redis cache store.

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::debug;

/// Redis-backed cache store.
///
/// All keys are namespaced under `key_prefix` so that [`CacheStore::clear`]
/// only removes entries written by this store.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to Redis, namespacing every key under `key_prefix`.
    ///
    /// The prefix must be non-empty, since [`CacheStore::clear`] removes every
    /// key under it.
    ///
    /// ```no_run
    /// use conduit_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let cache = RedisCache::new("redis://localhost:6379", "conduit").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(url: &str, key_prefix: impl Into<String>) -> CacheResult<Self> {
        let key_prefix = key_prefix.into();
        if key_prefix.is_empty() {
            return Err(CacheError::Backend(
                "Redis key prefix must not be empty".to_string(),
            ));
        }

        let client = Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            connection,
            key_prefix,
        })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn build_key(&self, key: &str) -> String {
        build_key(&self.key_prefix, key)
    }
}

fn build_key(prefix: &str, key: &str) -> String {
    format!("{}:{}", prefix, key)
}

/// Whole seconds for `SETEX`, rounded up so Redis never drops an entry before
/// its own expiry.
fn ttl_seconds(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis().div_ceil(1000))
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Deletes `KEYS[1]` only while it holds `ARGV[1]`.
const DELETE_IF_EQ: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Keys fetched per `SCAN` round trip in [`CacheStore::clear`].
const SCAN_BATCH: usize = 500;

#[async_trait]
impl CacheStore for RedisCache {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(&key, value, ttl_seconds(ttl)).await?;
            }
            None => {
                let _: () = conn.set(&key, value).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let removed: i64 = redis::Script::new(DELETE_IF_EQ)
            .key(&key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let pattern = self.build_key("*");
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let _: () = conn.del(keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix = %self.key_prefix, "Cleared Redis cache namespace");
        Ok(())
    }
}
