//! In-memory response cache.
//!
//! Serialized HTTP responses are stored under a key derived from the request
//! method, path and query string, and expire after a fixed TTL. The store is a
//! process-wide collaborator shared by all requests; it serializes its own
//! read-modify-write behind a mutex.
//!
//! [`MemoryStore`] is bounded twice: by entry count and by the total size of
//! the stored bodies. A body larger than the whole byte budget is not stored.
//!
//! # Cache Key
//!
//! ```text
//! md5("GET-/api/paper/text-doi=10.1145/3025453.3025501")
//! ```

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

/// A stored response: status, the headers worth replaying, and the body
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Result of a cache lookup
#[derive(Debug, PartialEq)]
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired (and has been evicted)
    Expired,
}

/// Storage backend for cached responses
pub trait ResponseStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> CacheResult<CachedResponse>;

    fn put(&self, key: &str, response: CachedResponse);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate a cache key for a request signature
pub fn cache_key(method: &str, path: &str, query: Option<&str>) -> String {
    let input = format!("{}-{}-{}", method, path, query.unwrap_or_default());
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[derive(Debug)]
struct Entry {
    expires_at: Instant,
    response: CachedResponse,
}

#[derive(Debug)]
struct Entries {
    lru: LruCache<String, Entry>,
    /// Sum of the stored body lengths
    bytes: usize,
}

impl Entries {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.lru.pop(key)?;
        self.bytes -= entry.response.body.len();
        Some(entry)
    }

    fn evict_oldest(&mut self) -> bool {
        match self.lru.pop_lru() {
            Some((_, entry)) => {
                self.bytes -= entry.response.body.len();
                true
            }
            None => false,
        }
    }
}

/// Bounded LRU store with per-entry expiry
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
    ttl: Duration,
    max_bytes: usize,
}

impl MemoryStore {
    /// A store limited by entry count only
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::new(capacity),
                bytes: 0,
            }),
            ttl,
            max_bytes: usize::MAX,
        }
    }

    /// Cap the total size of stored bodies
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Create a store from the `[cache]` configuration section
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_seconds))
            .with_max_bytes(config.max_total_mb.saturating_mul(1024 * 1024))
    }

    /// Total size of the bodies currently stored
    pub fn size_bytes(&self) -> usize {
        self.entries.lock().bytes
    }
}

impl ResponseStore for MemoryStore {
    fn get(&self, key: &str) -> CacheResult<CachedResponse> {
        let mut entries = self.entries.lock();

        let expired = match entries.lru.get(key) {
            None => {
                tracing::debug!("Cache MISS: {}", key);
                return CacheResult::Miss;
            }
            Some(entry) => Instant::now() >= entry.expires_at,
        };

        if expired {
            entries.remove(key);
            tracing::debug!("Cache expired: {}", key);
            return CacheResult::Expired;
        }

        tracing::debug!("Cache HIT: {}", key);
        match entries.lru.get(key) {
            Some(entry) => CacheResult::Hit(entry.response.clone()),
            None => CacheResult::Miss,
        }
    }

    fn put(&self, key: &str, response: CachedResponse) {
        let size = response.body.len();
        if size > self.max_bytes {
            tracing::debug!(
                "Not caching {}: body of {} bytes exceeds the {} byte budget",
                key,
                size,
                self.max_bytes
            );
            return;
        }

        let mut entries = self.entries.lock();
        entries.remove(key);
        while entries.bytes + size > self.max_bytes && entries.evict_oldest() {}

        let entry = Entry {
            expires_at: Instant::now() + self.ttl,
            response,
        };
        if let Some((_, evicted)) = entries.lru.push(key.to_string(), entry) {
            entries.bytes -= evicted.response.body.len();
        }
        entries.bytes += size;
        tracing::debug!("Cached response: {}", key);
    }

    fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.lru.clear();
        entries.bytes = 0;
        tracing::info!("Cache cleared");
    }

    fn len(&self) -> usize {
        self.entries.lock().lru.len()
    }
}
