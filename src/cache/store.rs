//! Concurrent key-value store behind both cache tiers.
//!
//! [`KvStore`] is the seam: the exact and similarity tiers only talk to the trait, so
//! a different map (single mutex, lock-free, ...) can be dropped in without touching
//! the router. [`ShardedStore`] is the default: `N` stripes, each a
//! `parking_lot::RwLock<HashMap>`. Hit counters and last-use markers are atomics, so
//! a lookup that touches an entry still only needs a shared lock.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::constants::DEFAULT_SHARD_COUNT;
use crate::evaluation::EvaluationResult;
use crate::hashing::shard_index;
use crate::normalize::CacheKey;

/// Borrowed view of a stored entry, valid for the duration of a scan callback.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    pub key: &'a CacheKey,
    pub result: &'a EvaluationResult,
    pub created_at: Instant,
    pub last_used: Instant,
    /// Store-wide monotonic use counter; larger means more recently used.
    pub last_used_seq: u64,
    pub hits: u64,
}

impl EntryView<'_> {
    /// Age is measured from creation; re-hits do not extend the TTL.
    #[inline]
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// Owned copy of an entry returned by a touching lookup.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub result: EvaluationResult,
    pub created_at: Instant,
    pub last_used: Instant,
    pub last_used_seq: u64,
    pub hits: u64,
}

/// Outcome of [`KvStore::lookup`].
#[derive(Debug, Clone)]
pub enum StoreLookup {
    Hit(EntrySnapshot),
    Expired,
    Miss,
}

/// Concurrency-safe map from [`CacheKey`] to cached result.
pub trait KvStore: Send + Sync + std::fmt::Debug {
    /// Looks up `key`. A live entry is touched (hit counter + last-use refreshed);
    /// an entry older than `ttl` is reported as [`StoreLookup::Expired`] and left alone.
    fn lookup(&self, key: &CacheKey, now: Instant, ttl: Duration) -> StoreLookup;

    /// Inserts or overwrites `key`. Returns `true` if the key was new.
    fn insert(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool;

    /// Inserts only if `key` is absent. Returns `true` if inserted.
    fn insert_if_absent(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool;

    /// Refreshes the last-use marker without counting a hit.
    fn touch(&self, key: &CacheKey, now: Instant) -> bool;

    fn contains(&self, key: &CacheKey) -> bool;

    fn remove(&self, key: &CacheKey) -> Option<EvaluationResult>;

    /// Removes `key` only if it is older than `ttl` at `now`.
    fn remove_if_expired(&self, key: &CacheKey, now: Instant, ttl: Duration) -> bool;

    /// Visits every entry under shared locks. The callback must not call back into
    /// the store.
    fn scan(&self, visit: &mut dyn FnMut(EntryView<'_>));

    /// Like [`scan`](Self::scan), but stops as soon as `visit` breaks.
    fn scan_while(&self, visit: &mut dyn FnMut(EntryView<'_>) -> ControlFlow<()>) {
        let mut stopped = false;
        self.scan(&mut |entry| {
            if !stopped {
                stopped = visit(entry).is_break();
            }
        });
    }

    /// Removes every entry for which `keep` returns `false`; returns the removed count.
    fn retain(&self, keep: &mut dyn FnMut(EntryView<'_>) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

#[derive(Debug)]
struct StoredEntry {
    result: EvaluationResult,
    created_at: Instant,
    last_used_nanos: AtomicU64,
    last_used_seq: AtomicU64,
    hits: AtomicU64,
}

impl StoredEntry {
    fn new(result: EvaluationResult, created_at: Instant, nanos: u64, seq: u64) -> Self {
        Self {
            result,
            created_at,
            last_used_nanos: AtomicU64::new(nanos),
            last_used_seq: AtomicU64::new(seq),
            hits: AtomicU64::new(0),
        }
    }
}

/// Lock-striped [`KvStore`].
pub struct ShardedStore {
    shards: Box<[RwLock<HashMap<CacheKey, StoredEntry>>]>,
    epoch: Instant,
    use_clock: AtomicU64,
}

impl ShardedStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            epoch: Instant::now(),
            use_clock: AtomicU64::new(0),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_for(&self, key: &CacheKey) -> &RwLock<HashMap<CacheKey, StoredEntry>> {
        &self.shards[shard_index(key.as_str(), self.shards.len())]
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.use_clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    fn nanos_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    fn view<'a>(&self, key: &'a CacheKey, entry: &'a StoredEntry) -> EntryView<'a> {
        EntryView {
            key,
            result: &entry.result,
            created_at: entry.created_at,
            last_used: self.epoch
                + Duration::from_nanos(entry.last_used_nanos.load(Ordering::Acquire)),
            last_used_seq: entry.last_used_seq.load(Ordering::Acquire),
            hits: entry.hits.load(Ordering::Acquire),
        }
    }

    fn mark_used(&self, entry: &StoredEntry, now: Instant) {
        entry
            .last_used_nanos
            .store(self.nanos_since_epoch(now), Ordering::Release);
        entry.last_used_seq.store(self.next_seq(), Ordering::Release);
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}

impl KvStore for ShardedStore {
    fn lookup(&self, key: &CacheKey, now: Instant, ttl: Duration) -> StoreLookup {
        let shard = self.shard_for(key).read();
        let Some(entry) = shard.get(key) else {
            return StoreLookup::Miss;
        };

        if self.view(key, entry).is_expired(now, ttl) {
            return StoreLookup::Expired;
        }

        entry.hits.fetch_add(1, Ordering::AcqRel);
        self.mark_used(entry, now);

        let view = self.view(key, entry);
        StoreLookup::Hit(EntrySnapshot {
            result: entry.result.clone(),
            created_at: view.created_at,
            last_used: view.last_used,
            last_used_seq: view.last_used_seq,
            hits: view.hits,
        })
    }

    fn insert(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool {
        let entry = StoredEntry::new(result, now, self.nanos_since_epoch(now), self.next_seq());
        self.shard_for(&key).write().insert(key, entry).is_none()
    }

    fn insert_if_absent(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool {
        let mut shard = self.shard_for(&key).write();
        if shard.contains_key(&key) {
            return false;
        }
        let entry = StoredEntry::new(result, now, self.nanos_since_epoch(now), self.next_seq());
        shard.insert(key, entry);
        true
    }

    fn touch(&self, key: &CacheKey, now: Instant) -> bool {
        let shard = self.shard_for(key).read();
        match shard.get(key) {
            Some(entry) => {
                self.mark_used(entry, now);
                true
            }
            None => false,
        }
    }

    fn contains(&self, key: &CacheKey) -> bool {
        self.shard_for(key).read().contains_key(key)
    }

    fn remove(&self, key: &CacheKey) -> Option<EvaluationResult> {
        self.shard_for(key).write().remove(key).map(|e| e.result)
    }

    fn remove_if_expired(&self, key: &CacheKey, now: Instant, ttl: Duration) -> bool {
        let mut shard = self.shard_for(key).write();
        let expired = shard
            .get(key)
            .is_some_and(|entry| self.view(key, entry).is_expired(now, ttl));
        if expired {
            shard.remove(key);
        }
        expired
    }

    fn scan(&self, visit: &mut dyn FnMut(EntryView<'_>)) {
        for shard in self.shards.iter() {
            let guard = shard.read();
            for (key, entry) in guard.iter() {
                visit(self.view(key, entry));
            }
        }
    }

    fn scan_while(&self, visit: &mut dyn FnMut(EntryView<'_>) -> ControlFlow<()>) {
        for shard in self.shards.iter() {
            let guard = shard.read();
            for (key, entry) in guard.iter() {
                if visit(self.view(key, entry)).is_break() {
                    return;
                }
            }
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(EntryView<'_>) -> bool) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut guard = shard.write();
            let before = guard.len();
            guard.retain(|key, entry| keep(self.view(key, entry)));
            removed += before - guard.len();
        }
        removed
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }
}
