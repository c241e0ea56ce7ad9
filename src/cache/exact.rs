//! Tier 1: exact-match cache.
//!
//! O(1) lookup by normalized key. Expiry is lazy: a lookup that finds an entry older
//! than the TTL removes it and reports a miss. Every insert runs
//! [`make_room`](super::maintenance::make_room) first so the store never grows past
//! its capacity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::maintenance::{self, MaintenanceReport};
use super::store::{KvStore, ShardedStore, StoreLookup};
use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, EVICTION_FRACTION};
use crate::evaluation::{EvaluationResult, Tier};
use crate::metrics::Metrics;
use crate::normalize::CacheKey;

/// Capacity and lifetime settings for the cache store.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Max entries. Default: `10_000`.
    pub capacity: usize,
    /// Max entry age. Default: 24 hours.
    pub ttl: Duration,
    /// Share of entries dropped per eviction pass. Default: `0.10`.
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
            eviction_fraction: EVICTION_FRACTION,
        }
    }
}

impl CacheConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn eviction_fraction(mut self, fraction: f64) -> Self {
        self.eviction_fraction = fraction;
        self
    }
}

/// Exact-match tier over a shared [`KvStore`].
pub struct ExactCache {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    metrics: Arc<Metrics>,
    /// Serializes make-room + insert so concurrent puts cannot overshoot capacity.
    write_lock: Mutex<()>,
}

impl ExactCache {
    pub fn new(config: CacheConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_store(Arc::new(ShardedStore::new()), config, metrics)
    }

    pub fn with_store(store: Arc<dyn KvStore>, config: CacheConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            config,
            metrics,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Shared store, for tiers that scan it.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    #[inline]
    pub fn get(&self, key: &CacheKey) -> Option<EvaluationResult> {
        self.get_at(key, Instant::now())
    }

    /// Looks up `key` as of `now`. Hits come back with `cached = true`.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<EvaluationResult> {
        match self.store.lookup(key, now, self.config.ttl) {
            StoreLookup::Hit(snapshot) => {
                trace!(key = %key, hits = snapshot.hits, "Exact cache hit");
                Some(snapshot.result.as_cached(Tier::ExactHit))
            }
            StoreLookup::Expired => {
                if self.store.remove_if_expired(key, now, self.config.ttl) {
                    self.metrics.record_expired(1);
                }
                debug!(key = %key, "Exact cache entry expired");
                None
            }
            StoreLookup::Miss => None,
        }
    }

    #[inline]
    pub fn put(&self, key: CacheKey, result: EvaluationResult) -> MaintenanceReport {
        self.put_at(key, result, Instant::now())
    }

    /// Inserts (or overwrites) `key`, making room first if the store is full.
    pub fn put_at(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> MaintenanceReport {
        let _guard = self.write_lock.lock();
        let report = self.make_room(&key, now);
        self.store.insert(key, stored_form(result), now);
        report
    }

    /// Inserts only if no entry exists for `key`. Used for results that arrive after
    /// the caller has already been answered, so they never replace fresher data.
    pub fn put_if_absent_at(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool {
        let _guard = self.write_lock.lock();
        if self.store.contains(&key) {
            return false;
        }
        self.make_room(&key, now);
        self.store.insert_if_absent(key, stored_form(result), now)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<EvaluationResult> {
        self.store.remove(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    /// Drops every expired entry. Returns the number removed.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let _guard = self.write_lock.lock();
        let removed = maintenance::purge_expired(self.store.as_ref(), now, self.config.ttl);
        if removed > 0 {
            self.metrics.record_expired(removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.store.clear();
    }

    fn make_room(&self, incoming: &CacheKey, now: Instant) -> MaintenanceReport {
        let report = maintenance::make_room(
            self.store.as_ref(),
            incoming,
            self.config.capacity,
            self.config.eviction_fraction,
            now,
            self.config.ttl,
        );
        if report.expired > 0 {
            self.metrics.record_expired(report.expired as u64);
        }
        if report.evicted > 0 {
            self.metrics.record_evictions(report.evicted as u64);
            debug!(
                evicted = report.evicted,
                capacity = self.config.capacity,
                "Cache at capacity, evicted oldest entries"
            );
        }
        report
    }
}

impl std::fmt::Debug for ExactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactCache")
            .field("entries", &self.store.len())
            .field("capacity", &self.config.capacity)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

/// Per-request fields are not part of what gets cached.
fn stored_form(mut result: EvaluationResult) -> EvaluationResult {
    result.cached = false;
    result.retries = 0;
    result.error_recovered = false;
    result
}
