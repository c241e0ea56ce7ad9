//! Expiry and size-bounded eviction.
//!
//! Eviction ranks entries by last use (not creation), so an old entry that keeps
//! getting hit survives. One pass removes the least-recently-used
//! [`EVICTION_FRACTION`](crate::constants::EVICTION_FRACTION) of the store, and
//! always at least enough entries to make room for the pending insert.

use std::time::{Duration, Instant};

use tracing::debug;

use super::store::KvStore;
use crate::normalize::CacheKey;

/// Counts produced by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired: usize,
    pub evicted: usize,
}

impl MaintenanceReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Removes every entry older than `ttl`.
pub fn purge_expired(store: &dyn KvStore, now: Instant, ttl: Duration) -> usize {
    store.retain(&mut |entry| !entry.is_expired(now, ttl))
}

/// How many entries one eviction pass removes from a store holding `len` entries
/// with room for `capacity`.
pub fn eviction_quota(len: usize, capacity: usize, fraction: f64) -> usize {
    if len < capacity {
        return 0;
    }
    let by_fraction = (len as f64 * fraction).ceil() as usize;
    let to_fit = len + 1 - capacity;
    by_fraction.max(to_fit).max(1).min(len)
}

/// Evicts up to `count` least-recently-used entries, never touching `protect`.
pub fn evict_oldest(store: &dyn KvStore, count: usize, protect: Option<&CacheKey>) -> usize {
    if count == 0 {
        return 0;
    }

    let mut ranked: Vec<(u64, CacheKey)> = Vec::with_capacity(store.len());
    store.scan(&mut |entry| {
        if Some(entry.key) != protect {
            ranked.push((entry.last_used_seq, entry.key.clone()));
        }
    });

    ranked.sort_unstable_by_key(|(seq, _)| *seq);

    let mut evicted = 0;
    for (_, key) in ranked.into_iter().take(count) {
        if store.remove(&key).is_some() {
            evicted += 1;
        }
    }

    debug!(requested = count, evicted, "Evicted least-recently-used entries");
    evicted
}

/// Makes room for one insert of `incoming`: purges expired entries first, then
/// evicts by last use if the store is still at `capacity`.
pub fn make_room(
    store: &dyn KvStore,
    incoming: &CacheKey,
    capacity: usize,
    fraction: f64,
    now: Instant,
    ttl: Duration,
) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();
    if store.len() < capacity || store.contains(incoming) {
        return report;
    }

    report.expired = purge_expired(store, now, ttl);

    let quota = eviction_quota(store.len(), capacity, fraction);
    report.evicted = evict_oldest(store, quota, Some(incoming));
    report
}
