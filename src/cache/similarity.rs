//! Tier 2: near-match lookup by normalized edit distance.
//!
//! # Cost
//!
//! A lookup walks every live entry in the shared store, so each candidate has to be
//! cheap to reject:
//!
//! - Only entries with an identical [`CacheKey::scope`] are candidates; the learner
//!   text alone is compared.
//! - Texts longer than [`SimilarityCache::max_chars`] are never compared.
//! - `similarity <= min(len) / max(len)`, so a candidate whose length differs by more
//!   than the allowed edit budget is dropped before any distance work.
//! - Survivors are copied out under the shard read locks and compared after the
//!   locks are released, with a banded distance that gives up once the budget is
//!   exceeded.
//!
//! A lookup given a deadline stops (and reports no match) once it passes.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::store::KvStore;
use crate::constants::{DEFAULT_CACHE_TTL, DEFAULT_SIMILARITY_MAX_CHARS, DEFAULT_SIMILARITY_THRESHOLD};
use crate::evaluation::{EvaluationResult, Tier};
use crate::normalize::CacheKey;

/// Tolerance for comparing a computed similarity against the threshold, so that a
/// ratio which is mathematically equal to the threshold is not lost to rounding.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// A Tier-2 hit.
#[derive(Debug, Clone)]
pub struct SimilarMatch {
    pub result: EvaluationResult,
    pub matched_key: CacheKey,
    pub similarity: f64,
}

/// Near-match tier scanning the exact tier's store.
pub struct SimilarityCache {
    store: Arc<dyn KvStore>,
    threshold: f64,
    ttl: Duration,
    max_chars: usize,
    comparisons: AtomicU64,
}

/// Candidate copied out of the store for comparison outside the locks.
struct Candidate {
    key: CacheKey,
    last_used_seq: u64,
    result: EvaluationResult,
}

impl SimilarityCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_threshold(store, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_CACHE_TTL)
    }

    pub fn with_threshold(store: Arc<dyn KvStore>, threshold: f64, ttl: Duration) -> Self {
        Self {
            store,
            threshold,
            ttl,
            max_chars: DEFAULT_SIMILARITY_MAX_CHARS,
            comparisons: AtomicU64::new(0),
        }
    }

    /// Longest text, in characters, this tier compares. Default: 512.
    pub fn max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Edit-distance computations run so far.
    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn find_similar(&self, key: &CacheKey) -> Option<SimilarMatch> {
        self.find_similar_before(key, Instant::now(), None)
    }

    #[inline]
    pub fn find_similar_at(&self, key: &CacheKey, now: Instant) -> Option<SimilarMatch> {
        self.find_similar_before(key, now, None)
    }

    /// Returns the best live near-match for `key`, or `None`.
    ///
    /// Highest similarity wins; exact ties go to the most recently used entry. The
    /// winning entry is touched so it ranks as recently used for eviction. Returns
    /// `None` if `deadline` passes before the lookup finishes.
    #[instrument(skip(self, key, now, deadline), fields(primary_len = key.primary().len()))]
    pub fn find_similar_before(
        &self,
        key: &CacheKey,
        now: Instant,
        deadline: Option<Instant>,
    ) -> Option<SimilarMatch> {
        let query_len = key.primary().chars().count();
        if query_len > self.max_chars {
            debug!(query_len, max_chars = self.max_chars, "Text too long for near-match lookup");
            return None;
        }

        let mut candidates = self.collect_candidates(key, query_len, now, deadline)?;
        let query: Vec<char> = key.primary().chars().collect();
        let mut best: Option<(f64, usize)> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if past(deadline) {
                warn!(candidates = candidates.len(), "Deadline passed during near-match lookup");
                return None;
            }

            let other: Vec<char> = candidate.key.primary().chars().collect();
            let longest = query.len().max(other.len());
            self.comparisons.fetch_add(1, Ordering::Relaxed);
            let Some(distance) = bounded_distance(&query, &other, max_edits(longest, self.threshold)) else {
                continue;
            };
            let score = ratio(distance, longest);
            if !meets_threshold(score, self.threshold) {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_score, best_index)) => {
                    score > best_score + SIMILARITY_EPSILON
                        || ((score - best_score).abs() <= SIMILARITY_EPSILON
                            && candidate.last_used_seq > candidates[best_index].last_used_seq)
                }
            };
            if better {
                best = Some((score, index));
            }
        }

        let scanned = candidates.len();
        let Some((score, index)) = best else {
            debug!(candidates = scanned, "No near-match above threshold");
            return None;
        };
        let winner = candidates.swap_remove(index);

        self.store.touch(&winner.key, now);
        debug!(candidates = scanned, similarity = score, matched = %winner.key, "Near-match found");

        Some(SimilarMatch {
            result: winner.result.as_cached(Tier::SimilarHit),
            matched_key: winner.key,
            similarity: score,
        })
    }

    /// Copies out every entry that could still reach the threshold. `None` if the
    /// deadline passed mid-scan.
    fn collect_candidates(
        &self,
        key: &CacheKey,
        query_len: usize,
        now: Instant,
        deadline: Option<Instant>,
    ) -> Option<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut timed_out = false;

        self.store.scan_while(&mut |entry| {
            if past(deadline) {
                timed_out = true;
                return ControlFlow::Break(());
            }
            if entry.key == key || entry.key.scope() != key.scope() || entry.is_expired(now, self.ttl) {
                return ControlFlow::Continue(());
            }
            let len = entry.key.primary().chars().count();
            if len > self.max_chars || !within_length_bound(query_len, len, self.threshold) {
                return ControlFlow::Continue(());
            }
            candidates.push(Candidate {
                key: entry.key.clone(),
                last_used_seq: entry.last_used_seq,
                result: entry.result.clone(),
            });
            ControlFlow::Continue(())
        });

        if timed_out {
            warn!("Deadline passed while scanning for near-matches");
            return None;
        }
        Some(candidates)
    }
}

#[inline]
fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[inline]
fn ratio(distance: usize, longest: usize) -> f64 {
    if longest == 0 {
        1.0
    } else {
        1.0 - distance as f64 / longest as f64
    }
}

/// Largest edit distance that still meets `threshold` for texts whose longer side
/// has `longest` characters.
#[inline]
pub fn max_edits(longest: usize, threshold: f64) -> usize {
    ((1.0 - threshold + SIMILARITY_EPSILON) * longest as f64).floor().max(0.0) as usize
}

/// `false` if texts of these lengths cannot meet `threshold` whatever their content.
#[inline]
pub fn within_length_bound(a_len: usize, b_len: usize, threshold: f64) -> bool {
    a_len.abs_diff(b_len) <= max_edits(a_len.max(b_len), threshold)
}

impl std::fmt::Debug for SimilarityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityCache")
            .field("threshold", &self.threshold)
            .field("ttl", &self.ttl)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, over characters. Two empty strings
/// are identical (1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let longest = a_len.max(b_len);
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// `true` if `score` is at or above `threshold`.
#[inline]
pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score + SIMILARITY_EPSILON >= threshold
}

/// Character-level edit distance (insert, delete, substitute), two-row DP.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit distance if it is at most `max`, else `None`. Only the diagonal band of
/// width `2 * max + 1` is filled, and the walk stops once a whole row exceeds `max`.
pub fn levenshtein_within(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    bounded_distance(&a, &b, max)
}

fn bounded_distance(a: &[char], b: &[char], max: usize) -> Option<usize> {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if long.len() - short.len() > max {
        return None;
    }
    if short.is_empty() {
        return Some(long.len());
    }

    // Cells outside the band hold this; it is larger than any reachable distance.
    let outside = long.len() + max + 1;
    let width = long.len();
    let mut prev = vec![outside; width + 1];
    let mut curr = vec![outside; width + 1];
    for (j, cell) in prev.iter_mut().enumerate().take(max.min(width) + 1) {
        *cell = j;
    }

    for i in 1..=short.len() {
        let lo = i.saturating_sub(max).max(1);
        let hi = (i + max).min(width);
        if lo == 1 {
            curr[0] = i;
        } else {
            curr[lo - 1] = outside;
        }

        let mut row_min = curr[lo - 1];
        for j in lo..=hi {
            let substitution = prev[j - 1] + usize::from(short[i - 1] != long[j - 1]);
            let value = substitution.min(prev[j] + 1).min(curr[j - 1] + 1);
            curr[j] = value;
            row_min = row_min.min(value);
        }
        if hi < width {
            curr[hi + 1] = outside;
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[width];
    (distance <= max).then_some(distance)
}
