//! Response cache middleware.
//!
//! Successful responses to side-effect-free requests are stored under a key
//! derived from method, path and canonicalized params. A later matching
//! request is answered from the store until the entry expires.

use crate::clock::{Clock, SystemClock};
use crate::middleware::{HookResult, Middleware};
use crate::request::{Params, RequestConfig};
use crate::response::Response;
use async_trait::async_trait;
use conduit_cache::{CacheResult, CacheStore};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Cache middleware configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a stored response stays valid.
    pub ttl: Duration,
    /// Methods whose responses may be cached.
    pub cacheable_methods: Vec<Method>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            cacheable_methods: vec![Method::GET],
        }
    }
}

impl CacheConfig {
    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the cacheable methods.
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.cacheable_methods = methods;
        self
    }
}

/// Persisted form of a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached response payload.
    pub data: Value,
    /// Expiry as Unix epoch milliseconds.
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

impl CacheEntry {
    /// An entry is valid up to and including `expires_at`.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis > self.expires_at
    }
}

/// Derive the cache key `"{METHOD}:{path}:{canonical-json(params)}"`.
pub fn cache_key(method: &Method, path: &str, params: &Params) -> String {
    let mut out = String::with_capacity(path.len() + 16);
    out.push_str(method.as_str());
    out.push(':');
    out.push_str(path);
    out.push(':');

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, &mut out);
        out.push(':');
        write_canonical(&params[key], &mut out);
    }
    out.push('}');
    out
}

/// Serialize `value` as JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// Middleware answering repeated requests from a [`CacheStore`].
///
/// Storage failures never fail a request: a store that cannot be read is
/// treated as a miss, and a write that fails is only logged.
#[derive(Clone)]
pub struct CacheMiddleware {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl CacheMiddleware {
    /// Cache responses in `store` with the default configuration.
    pub fn new<S: CacheStore + 'static>(store: S) -> Self {
        Self::with_store(Arc::new(store))
    }

    /// Cache responses in a shared store.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            config: CacheConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock used for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether responses to `method` may be cached.
    pub fn is_cacheable(&self, method: &Method) -> bool {
        self.config.cacheable_methods.contains(method)
    }

    /// Cache key for a request.
    pub fn key_for(&self, config: &RequestConfig) -> String {
        cache_key(&config.method, &config.path, &config.params)
    }

    /// Drop the cached response for a request.
    pub async fn invalidate(&self, config: &RequestConfig) -> CacheResult<()> {
        self.store.delete(&self.key_for(config)).await
    }

    /// Drop every cached response.
    pub async fn clear(&self) -> CacheResult<()> {
        self.store.clear().await
    }

    /// Valid entry for `key`, evicting it if expired or unreadable.
    ///
    /// Eviction only removes the exact value that was read, so a fresh entry
    /// written concurrently survives.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get_json(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if !entry.is_expired(self.clock.now_millis()) => Some(entry),
            Ok(_) => {
                trace!(key, "Cache entry expired");
                self.evict(key, &raw).await;
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache entry");
                self.evict(key, &raw).await;
                None
            }
        }
    }

    async fn evict(&self, key: &str, stale: &str) {
        match self.store.delete_if_eq(key, stale).await {
            Ok(true) => {}
            Ok(false) => trace!(key, "Cache entry replaced before eviction"),
            Err(e) => warn!(key, error = %e, "Cache eviction failed"),
        }
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    fn name(&self) -> &str {
        "cache"
    }

    async fn on_request(&self, mut config: RequestConfig) -> HookResult<RequestConfig> {
        if !self.is_cacheable(&config.method) || config.meta.from_cache {
            return Ok(config);
        }

        let key = self.key_for(&config);
        if let Some(entry) = self.lookup(&key).await {
            debug!(key = %key, "Cache hit");
            config.meta.from_cache = true;
            config.meta.cached_data = Some(entry.data);
        }

        Ok(config)
    }

    async fn on_response(&self, response: Response) -> HookResult<Response> {
        let config = response.config();
        if !self.is_cacheable(&config.method) || response.status() != 200 || config.meta.from_cache
        {
            return Ok(response);
        }

        let key = self.key_for(config);
        let ttl_millis = u64::try_from(self.config.ttl.as_millis()).unwrap_or(u64::MAX);
        let entry = CacheEntry {
            data: response.data().clone(),
            expires_at: self.clock.now_millis().saturating_add(ttl_millis),
        };

        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.store.set_json(&key, raw, Some(self.config.ttl)).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                } else {
                    trace!(key = %key, expires_at = entry.expires_at, "Cached response");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize cache entry"),
        }

        Ok(response)
    }
}
