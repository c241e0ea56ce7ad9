//! Process-wide counters.
//!
//! Every counter is a relaxed [`AtomicU64`]; readers take a [`MetricsSnapshot`] which
//! is serializable for the `/metrics` endpoint. Counters only go back to zero through
//! [`Metrics::reset`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::evaluation::Tier;

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    tier1_hits: AtomicU64,
    tier2_hits: AtomicU64,
    tier3_hits: AtomicU64,
    tier4_hits: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    retries: AtomicU64,
    malformed: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub tier1_hits: u64,
    pub tier2_hits: u64,
    pub tier3_hits: u64,
    pub tier4_hits: u64,
    pub fallbacks: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub retries: u64,
    pub malformed: u64,
    pub evictions: u64,
    pub expired: u64,
    /// Share of requests answered by Tier 1 or Tier 2.
    pub cache_hit_rate: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts the tier that answered a request.
    pub fn record_served(&self, tier: Tier) {
        let counter = match tier {
            Tier::ExactHit => &self.tier1_hits,
            Tier::SimilarHit => &self.tier2_hits,
            Tier::Heuristic => &self.tier3_hits,
            Tier::External => &self.tier4_hits,
            Tier::Fallback => &self.fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let tier1_hits = self.tier1_hits.load(Ordering::Relaxed);
        let tier2_hits = self.tier2_hits.load(Ordering::Relaxed);
        let cache_hit_rate = if requests == 0 {
            0.0
        } else {
            (tier1_hits + tier2_hits) as f64 / requests as f64
        };

        MetricsSnapshot {
            requests,
            tier1_hits,
            tier2_hits,
            tier3_hits: self.tier3_hits.load(Ordering::Relaxed),
            tier4_hits: self.tier4_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            cache_hit_rate,
        }
    }

    /// Operator reset. Not atomic across counters: increments racing with a reset may
    /// land on either side of it.
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.tier1_hits,
            &self.tier2_hits,
            &self.tier3_hits,
            &self.tier4_hits,
            &self.fallbacks,
            &self.errors,
            &self.timeouts,
            &self.retries,
            &self.malformed,
            &self.evictions,
            &self.expired,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
