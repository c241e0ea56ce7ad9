//! Store wrapper for tests: counts scanned entries and can slow each one down.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::store::{EntryView, KvStore, ShardedStore, StoreLookup};
use crate::evaluation::EvaluationResult;
use crate::normalize::CacheKey;

#[derive(Debug, Default)]
pub(crate) struct InstrumentedStore {
    inner: ShardedStore,
    visit_delay: Duration,
    visits: AtomicUsize,
}

impl InstrumentedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sleeps `delay` (blocking) before handing each entry to a scan callback.
    pub(crate) fn visit_delay(mut self, delay: Duration) -> Self {
        self.visit_delay = delay;
        self
    }

    /// Entries handed to scan callbacks so far.
    pub(crate) fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }

    fn on_visit(&self) {
        self.visits.fetch_add(1, Ordering::SeqCst);
        if !self.visit_delay.is_zero() {
            std::thread::sleep(self.visit_delay);
        }
    }
}

impl KvStore for InstrumentedStore {
    fn lookup(&self, key: &CacheKey, now: Instant, ttl: Duration) -> StoreLookup {
        self.inner.lookup(key, now, ttl)
    }

    fn insert(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool {
        self.inner.insert(key, result, now)
    }

    fn insert_if_absent(&self, key: CacheKey, result: EvaluationResult, now: Instant) -> bool {
        self.inner.insert_if_absent(key, result, now)
    }

    fn touch(&self, key: &CacheKey, now: Instant) -> bool {
        self.inner.touch(key, now)
    }

    fn contains(&self, key: &CacheKey) -> bool {
        self.inner.contains(key)
    }

    fn remove(&self, key: &CacheKey) -> Option<EvaluationResult> {
        self.inner.remove(key)
    }

    fn remove_if_expired(&self, key: &CacheKey, now: Instant, ttl: Duration) -> bool {
        self.inner.remove_if_expired(key, now, ttl)
    }

    fn scan(&self, visit: &mut dyn FnMut(EntryView<'_>)) {
        self.inner.scan(&mut |entry| {
            self.on_visit();
            visit(entry);
        });
    }

    fn scan_while(&self, visit: &mut dyn FnMut(EntryView<'_>) -> ControlFlow<()>) {
        self.inner.scan_while(&mut |entry| {
            self.on_visit();
            visit(entry)
        });
    }

    fn retain(&self, keep: &mut dyn FnMut(EntryView<'_>) -> bool) -> usize {
        self.inner.retain(keep)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn clear(&self) {
        self.inner.clear();
    }
}
