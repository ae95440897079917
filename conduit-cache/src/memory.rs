//! Bounded in-memory cache store.

use crate::error::CacheResult;
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default maximum number of entries held by [`InMemoryCache`].
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// In-memory cache backed by a lock-protected map.
///
/// Every operation takes the lock for its whole duration, so concurrent
/// writers to the same key never interleave. When the store is full, expired
/// entries are purged first and then the oldest insertion is evicted.
#[derive(Clone)]
pub struct InMemoryCache {
    inner: Arc<RwLock<Inner>>,
    max_entries: usize,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

impl InMemoryCache {
    /// Create a new in-memory cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a new in-memory cache holding at most `max_entries` keys.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

impl Inner {
    fn make_room(&mut self, max_entries: usize) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        while self.entries.len() >= max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    tracing::trace!(key = %key, "Evicting oldest cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let inner = self.inner.read().await;
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let mut inner = self.inner.write().await;

        if !inner.entries.contains_key(key) {
            inner.make_room(self.max_entries);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let expires_at = ttl.map(|d| Instant::now() + d);
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.write().await.entries.remove(key);
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.entries.get(key) {
            Some(entry) if entry.value == expected => {
                inner.entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        self.inner.write().await.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();

        cache.set_json("key", "value".to_string(), None).await.unwrap();
        assert_eq!(cache.get_json("key").await.unwrap(), Some("value".to_string()));
        assert!(cache.exists("key").await.unwrap());

        cache.delete("key").await.unwrap();
        assert_eq!(cache.get_json("key").await.unwrap(), None);
        assert!(!cache.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let cache = InMemoryCache::new();

        cache.set_json("key", "first".to_string(), None).await.unwrap();
        cache.set_json("key", "second".to_string(), None).await.unwrap();

        assert_eq!(cache.get_json("key").await.unwrap(), Some("second".to_string()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = InMemoryCache::new();
        cache
            .set_json("key", "value".to_string(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get_json("key").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get_json("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = InMemoryCache::with_capacity(2);

        cache.set_json("a", "1".to_string(), None).await.unwrap();
        cache.set_json("b", "2".to_string(), None).await.unwrap();
        cache.set_json("c", "3".to_string(), None).await.unwrap();

        assert_eq!(cache.get_json("a").await.unwrap(), None);
        assert_eq!(cache.get_json("b").await.unwrap(), Some("2".to_string()));
        assert_eq!(cache.get_json("c").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_prefers_expired_entries() {
        let cache = InMemoryCache::with_capacity(2);

        cache.set_json("old", "1".to_string(), None).await.unwrap();
        cache
            .set_json("short", "2".to_string(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.set_json("new", "3".to_string(), None).await.unwrap();

        assert_eq!(cache.get_json("old").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get_json("new").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_delete_if_eq_only_removes_matching_value() {
        let cache = InMemoryCache::new();
        cache.set_json("key", "fresh".to_string(), None).await.unwrap();

        assert!(!cache.delete_if_eq("key", "stale").await.unwrap());
        assert_eq!(cache.get_json("key").await.unwrap(), Some("fresh".to_string()));

        assert!(cache.delete_if_eq("key", "fresh").await.unwrap());
        assert!(!cache.exists("key").await.unwrap());
        assert!(!cache.delete_if_eq("missing", "fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();
        cache.set_json("a", "1".to_string(), None).await.unwrap();
        cache.set_json("b", "2".to_string(), None).await.unwrap();

        cache.clear().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_key() {
        let cache = InMemoryCache::new();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .set_json("shared", format!("{{\"writer\":{}}}", i), None)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let value = cache.get_json("shared").await.unwrap().unwrap();
        assert!(value.starts_with("{\"writer\":"));
        assert_eq!(cache.len().await, 1);
    }
}
