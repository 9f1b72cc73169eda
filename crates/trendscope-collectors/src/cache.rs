//! Per-adapter response cache with a fixed time-to-live.
//!
//! Entries older than the TTL are treated as misses and removed on the lookup
//! that finds them. There is no size-based eviction. The collector manager
//! clears each adapter's cache when a collection cycle starts, so the TTL only
//! shields repeated calls within one cycle or one ad hoc session.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Time source for cache expiry, injectable so tests can move time forward.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value);

    /// Drop every entry.
    fn clear(&self);
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    fn set(&self, _key: &str, _value: serde_json::Value) {}

    fn clear(&self) {}
}

struct Entry {
    value: serde_json::Value,
    stored_at: Instant,
}

pub struct MemoryCache<C: Clock = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache<SystemClock> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> MemoryCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet looked up.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clock> ResponseCache for MemoryCache<C> {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.stored_at) >= self.ttl,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        let stored_at = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), Entry { value, stored_at });
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Stable cache key for a request: SHA-256 over the URL and its query
/// parameters sorted by name, so parameter order does not matter.
#[must_use]
pub fn request_key(url: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    for (k, v) in sorted {
        hasher.update(b"\x00");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let cache = MemoryCache::new(DEFAULT_TTL);
        cache.set("k", json!({"a": 1}));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn entry_expires_after_ttl_and_is_purged() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCache::with_clock(Duration::from_secs(3600), Arc::clone(&clock));
        cache.set("k", json!("v"));

        clock.advance(Duration::from_secs(3599));
        assert_eq!(cache.get("k"), Some(json!("v")));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry should be removed on access");
    }

    #[test]
    fn expired_entries_linger_until_looked_up() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCache::with_clock(Duration::from_secs(10), Arc::clone(&clock));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_refreshes_timestamp() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCache::with_clock(Duration::from_secs(10), Arc::clone(&clock));
        cache.set("k", json!(1));
        clock.advance(Duration::from_secs(8));
        cache.set("k", json!(2));
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn clear_drops_fresh_entries() {
        let cache = MemoryCache::new(DEFAULT_TTL);
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn no_cache_never_returns() {
        let cache = NoCache;
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn request_key_ignores_param_order() {
        let a = request_key(
            "https://x/videos",
            &[("part", "snippet".to_string()), ("id", "1".to_string())],
        );
        let b = request_key(
            "https://x/videos",
            &[("id", "1".to_string()), ("part", "snippet".to_string())],
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn request_key_differs_by_value() {
        let a = request_key("https://x/videos", &[("id", "1".to_string())]);
        let b = request_key("https://x/videos", &[("id", "2".to_string())]);
        assert_ne!(a, b);
    }
}
