//! Verdict library crate (used by the server and integration tests).
//!
//! A tiered evaluation engine: each learner submission is answered by the cheapest
//! tier that can answer it, and the caller always gets an answer within a bounded
//! deadline.
//!
//! 1. Tier 1: exact match on a normalized key ([`ExactCache`]).
//! 2. Tier 2: near-duplicate match by edit similarity ([`SimilarityCache`]).
//! 3. Tier 3: local signal checks ([`HeuristicEvaluator`]).
//! 4. Tier 4: an external provider behind timeouts and retries ([`RetryController`]).
//!
//! The [`Orchestrator`] sequences the tiers and falls back to the heuristic result,
//! tagged `error_recovered`, on any failure or once the deadline passes.
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Server configuration
//! - [`EvaluationRequest`], [`EvaluationResult`], [`Status`], [`Tier`] - Data model
//! - [`Orchestrator`], [`OrchestratorConfig`] - The pipeline
//!
//! ## Providers
//! - [`EvaluationProvider`] - Tier 4 seam
//! - [`HttpProvider`], [`CannedProvider`], [`DisabledProvider`], [`ConfiguredProvider`]
//!
//! ## Test/Mock Support
//! [`MockProvider`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod evaluation;
pub mod external;
pub mod gateway;
pub mod hashing;
pub mod heuristic;
pub mod metrics;
pub mod normalize;
pub mod router;

pub use cache::{CacheConfig, ExactCache, ExpirySweeper, KvStore, ShardedStore, SimilarityCache};
pub use config::{Config, ConfigError};
pub use evaluation::{
    Difficulty, EvaluationRequest, EvaluationResult, PageContext, Status, Tier,
    VERDICT_STATUS_HEADER, VERDICT_TIER_HEADER,
};
#[cfg(any(test, feature = "mock"))]
pub use external::{MockProvider, MockStep};
pub use external::{
    CannedProvider, ConfiguredProvider, DisabledProvider, EvaluationProvider, ExternalClient,
    ExternalError, HttpProvider, RetryConfig, RetryController,
};
pub use hashing::{hash_key, hash_to_u64};
pub use heuristic::{HeuristicConfig, HeuristicEvaluator};
pub use metrics::{Metrics, MetricsSnapshot};
pub use normalize::{CacheKey, KeyNormalizer, NormalizerConfig};
pub use router::{DeadlineContext, Orchestrator, OrchestratorConfig, PipelineState};
