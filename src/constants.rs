//! Cross-cutting, shared constants.
//!
//! These are the built-in defaults. Everything that operators may want to tune is
//! also exposed through [`crate::config::Config`]; the values here are what you get
//! when no `VERDICT_*` override is present.
//!
//! # Score Invariant
//!
//! Status is derived from score with a fixed threshold mapping wherever this crate
//! is responsible for it (heuristic tier, cache write-back):
//!
//! | Score       | Status    |
//! |-------------|-----------|
//! | `>= 75`     | `correct` |
//! | `>= 50`     | `close`   |
//! | otherwise   | `wrong`   |

use std::time::Duration;

/// Minimum score mapped to `correct`.
pub const CORRECT_SCORE_THRESHOLD: u8 = 75;
/// Minimum score mapped to `close`.
pub const CLOSE_SCORE_THRESHOLD: u8 = 50;
/// Upper bound of the score scale.
pub const MAX_SCORE: u8 = 100;

/// Entry time-to-live (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Max entries held by the exact-match store.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Fraction of entries removed by one eviction pass.
pub const EVICTION_FRACTION: f64 = 0.10;

/// Minimum normalized edit similarity for a Tier-2 hit.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
/// Longest learner text (in characters) the similarity tier compares. Longer
/// answers skip Tier 2 and longer stored entries are never candidates.
pub const DEFAULT_SIMILARITY_MAX_CHARS: usize = 512;

/// Context characters kept in the cache key.
pub const DEFAULT_CONTEXT_PREFIX_LEN: usize = 64;

/// Hard bound on one external attempt.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(2_000);
/// Overall pipeline deadline measured from request entry.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_millis(8_000);
/// Retries after the initial external attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Progressive, non-jittered delays between external attempts.
pub const DEFAULT_BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1_000),
    Duration::from_millis(2_000),
];

/// Confidence the heuristic needs before Tier 3 answers on its own.
pub const DEFAULT_HEURISTIC_CONFIDENCE: f64 = 0.80;
/// Max absolute jitter (in score points) added by the heuristic.
pub const DEFAULT_JITTER_AMPLITUDE: u8 = 3;

/// Number of lock stripes in [`crate::cache::ShardedStore`].
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// Default interval of the background expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Longest learner submission accepted by the HTTP gateway, in characters.
pub const MAX_TEXT_CHARS: usize = 4_096;
/// Longest grounding context accepted by the HTTP gateway, in characters.
pub const MAX_CONTEXT_CHARS: usize = 16_384;
