// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time and revision bounded cache of parsed documents.
//!
//! Entries are keyed by target identity. A lookup hits only when the stored entry
//! carries the same revision as the requested key and is not older than the TTL.
//! There is no single-flight coordination: concurrent misses fetch independently
//! and the last `put` wins.

use crate::domain::CacheKey;
use crate::ports::{Clock, SystemClock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Default time-to-live for cached documents.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry<V> {
    revision: String,
    value: V,
    inserted_at: Instant,
}

/// A concurrent cache with TTL and revision validation.
///
/// A TTL of zero disables caching: `put` is a no-op and `get` always misses.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::CacheKey;
/// use layercfg::ports::ManualClock;
/// use layercfg::service::ValueCache;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let cache = ValueCache::with_clock(Duration::from_secs(10), clock.clone());
///
/// let key = CacheKey::new("app/application.yaml", "rev-1").unwrap();
/// cache.put(&key, "parsed".to_string());
/// assert_eq!(cache.get(&key).as_deref(), Some("parsed"));
///
/// // A new revision of the same target misses
/// let newer = CacheKey::new("app/application.yaml", "rev-2").unwrap();
/// assert!(cache.get(&newer).is_none());
///
/// clock.advance(Duration::from_secs(11));
/// assert!(cache.get(&key).is_none());
/// ```
pub struct ValueCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ValueCache<V> {
    /// Creates a cache driven by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache driven by the given clock.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true unless the TTL is zero.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Looks up `key`. Expired or revision-stale entries are evicted and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }

        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key.identity()) {
                None => {
                    tracing::trace!(key = %key, "cache miss");
                    return None;
                }
                Some(entry) if self.is_fresh(entry, key, now) => {
                    tracing::trace!(key = %key, "cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: another thread may have stored a fresh entry.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key.identity()) {
            Some(entry) if self.is_fresh(entry, key, now) => Some(entry.value.clone()),
            Some(entry) => {
                let expired = !self.within_ttl(entry, now);
                if expired {
                    entries.remove(key.identity());
                    tracing::debug!(key = %key, "evicted expired cache entry");
                } else {
                    tracing::debug!(key = %key, "cache entry superseded by new revision");
                }
                None
            }
            None => None,
        }
    }

    /// Stores `value` under `key`, replacing any entry for the same identity.
    pub fn put(&self, key: &CacheKey, value: V) {
        if !self.is_enabled() {
            return;
        }
        let entry = CacheEntry {
            revision: key.revision().to_string(),
            value,
            inserted_at: self.clock.now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.identity().to_string(), entry);
    }

    /// Removes the entry for the identity of `key`.
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key.identity());
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, including ones that expired but were not looked up since.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn within_ttl(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) <= self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, key: &CacheKey, now: Instant) -> bool {
        entry.revision == key.revision() && self.within_ttl(entry, now)
    }
}

impl<V> fmt::Debug for ValueCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .entries
            .read()
            .map(|e| e.len())
            .unwrap_or_default();
        f.debug_struct("ValueCache")
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .field("entries", &len)
            .finish()
    }
}
