use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::deadline::DeadlineContext;
use super::state::PipelineState;
use crate::cache::{CacheConfig, ExactCache, KvStore, ShardedStore, SimilarityCache};
use crate::constants::{
    DEFAULT_FALLBACK_TIMEOUT, DEFAULT_SIMILARITY_MAX_CHARS, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::evaluation::{EvaluationRequest, EvaluationResult};
use crate::external::{EvaluationProvider, ExternalClient, RetryConfig, RetryController};
use crate::heuristic::{HeuristicConfig, HeuristicEvaluator};
use crate::metrics::Metrics;
use crate::normalize::{CacheKey, KeyNormalizer, NormalizerConfig};

/// Settings for every tier of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Overall deadline, measured from request entry. Default: 8000ms.
    pub fallback_timeout: Duration,
    /// Tier 2 match threshold. Default: `0.85`.
    pub similarity_threshold: f64,
    /// Longest text Tier 2 compares, in characters. Default: 512.
    pub similarity_max_chars: usize,
    pub normalizer: NormalizerConfig,
    pub cache: CacheConfig,
    pub heuristic: HeuristicConfig,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            similarity_max_chars: DEFAULT_SIMILARITY_MAX_CHARS,
            normalizer: NormalizerConfig::default(),
            cache: CacheConfig::default(),
            heuristic: HeuristicConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn similarity_max_chars(mut self, max_chars: usize) -> Self {
        self.similarity_max_chars = max_chars;
        self
    }

    pub fn normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn heuristic(mut self, heuristic: HeuristicConfig) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of running one tier.
#[derive(Debug)]
enum TierOutcome {
    Answered(EvaluationResult),
    Miss,
    /// Tier 4 gave up (error, exhausted retries, or a crashed call task).
    Failed { retries: u32 },
    DeadlineExceeded,
}

/// Sequences the four tiers under an overall deadline.
///
/// Never fails: every error path ends in the heuristic result tagged
/// `error_recovered`.
pub struct Orchestrator<P: EvaluationProvider> {
    config: OrchestratorConfig,
    normalizer: KeyNormalizer,
    exact: Arc<ExactCache>,
    similar: SimilarityCache,
    heuristic: HeuristicEvaluator,
    retry: RetryController<P>,
    metrics: Arc<Metrics>,
}

impl<P: EvaluationProvider> std::fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("fallback_timeout", &self.config.fallback_timeout)
            .field("exact", &self.exact)
            .field("similar", &self.similar)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<P: EvaluationProvider> Orchestrator<P> {
    pub fn new(config: OrchestratorConfig, provider: Arc<P>) -> Self {
        Self::with_metrics(config, provider, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(config: OrchestratorConfig, provider: Arc<P>, metrics: Arc<Metrics>) -> Self {
        Self::with_store(config, provider, Arc::new(ShardedStore::new()), metrics)
    }

    /// Builds the pipeline over a caller-supplied store.
    pub fn with_store(
        config: OrchestratorConfig,
        provider: Arc<P>,
        store: Arc<dyn KvStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let normalizer = KeyNormalizer::new(config.normalizer.clone());
        let exact = Arc::new(ExactCache::with_store(store, config.cache.clone(), Arc::clone(&metrics)));
        let similar = SimilarityCache::with_threshold(
            Arc::clone(exact.store()),
            config.similarity_threshold,
            config.cache.ttl,
        )
        .max_chars(config.similarity_max_chars);
        let heuristic = HeuristicEvaluator::with_normalizer(config.heuristic.clone(), normalizer.clone());
        let retry = RetryController::new(ExternalClient::new(provider), config.retry.clone());

        Self {
            config,
            normalizer,
            exact,
            similar,
            heuristic,
            retry,
            metrics,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn exact_cache(&self) -> &Arc<ExactCache> {
        &self.exact
    }

    pub fn similarity_cache(&self) -> &SimilarityCache {
        &self.similar
    }

    pub fn normalizer(&self) -> &KeyNormalizer {
        &self.normalizer
    }

    pub fn heuristic(&self) -> &HeuristicEvaluator {
        &self.heuristic
    }

    /// Evaluates `request`, trying each tier in order until one answers.
    #[instrument(skip_all, fields(difficulty = request.difficulty.as_str()))]
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let started = Instant::now();
        let ctx = DeadlineContext::new(self.config.fallback_timeout);
        self.metrics.record_request();

        let mut state = PipelineState::Normalizing;
        let key = self.normalizer.normalize(request);
        let mut heuristic: Option<EvaluationResult> = None;

        let mut next = PipelineState::Tier1Lookup;
        let result = loop {
            state = transition(state, next);

            if ctx.is_expired() {
                warn!(state = %state, "Deadline passed between tiers");
                self.metrics.record_timeout();
                break self.fallback(request, &key, heuristic.take(), 0);
            }

            let outcome = match state {
                PipelineState::Tier1Lookup => match self.exact.get(&key) {
                    Some(hit) => TierOutcome::Answered(hit),
                    None => TierOutcome::Miss,
                },
                PipelineState::Tier2Lookup => match self.similar.find_similar_before(
                    &key,
                    std::time::Instant::now(),
                    Some(ctx.deadline().into_std()),
                ) {
                    Some(found) => {
                        debug!(similarity = found.similarity, matched = %found.matched_key, "Tier 2 near-match");
                        TierOutcome::Answered(found.result)
                    }
                    None => TierOutcome::Miss,
                },
                PipelineState::Tier3Compute => {
                    let computed = self.heuristic.evaluate_with_key(request, &key);
                    let confident = self.heuristic.is_confident(&computed);
                    heuristic = Some(computed.clone());
                    if confident {
                        TierOutcome::Answered(computed)
                    } else {
                        TierOutcome::Miss
                    }
                }
                PipelineState::Tier4Call => self.call_external(request, &key, &ctx).await,
                PipelineState::Normalizing
                | PipelineState::Store
                | PipelineState::Done
                | PipelineState::FallbackDone => TierOutcome::Miss,
            };

            match outcome {
                TierOutcome::Answered(result) => {
                    info!(tier = %result.tier, score = result.score, "Request answered");
                    let served = state;
                    state = transition(state, PipelineState::Store);
                    self.store(served, &key, &result);
                    state = transition(state, PipelineState::Done);
                    break result;
                }
                TierOutcome::Miss => match state.next_tier() {
                    Some(following) => next = following,
                    None => {
                        self.metrics.record_error();
                        break self.fallback(request, &key, heuristic.take(), 0);
                    }
                },
                TierOutcome::Failed { retries } => {
                    self.metrics.record_error();
                    break self.fallback(request, &key, heuristic.take(), retries);
                }
                TierOutcome::DeadlineExceeded => {
                    self.metrics.record_timeout();
                    break self.fallback(request, &key, heuristic.take(), 0);
                }
            }
        };

        if result.error_recovered {
            transition(state, PipelineState::FallbackDone);
        }
        self.finish(result, started)
    }

    /// Tier 4. The call runs in its own task so the deadline can abandon it without
    /// aborting it; the task writes any successful result to the cache itself.
    async fn call_external(
        &self,
        request: &EvaluationRequest,
        key: &CacheKey,
        ctx: &DeadlineContext,
    ) -> TierOutcome {
        let retry = self.retry.clone();
        let exact = Arc::clone(&self.exact);
        let metrics = Arc::clone(&self.metrics);
        let owned_request = request.clone();
        let owned_key = key.clone();
        let token = ctx.token().clone();

        let task = tokio::spawn(async move {
            let report = retry.run(&owned_request, &token, &metrics).await;
            if let Ok(result) = &report.outcome {
                if token.is_cancelled() {
                    // Caller already has its fallback; never overwrite a fresher entry.
                    let stored =
                        exact.put_if_absent_at(owned_key, result.clone(), std::time::Instant::now());
                    debug!(stored, "Late provider result arrived after deadline");
                } else {
                    exact.put(owned_key, result.clone());
                }
            }
            report
        });

        match tokio::time::timeout_at(ctx.deadline(), task).await {
            Ok(Ok(report)) => {
                let retries = report.retries();
                match report.outcome {
                    Ok(result) => TierOutcome::Answered(result),
                    Err(e) => {
                        if e.is_malformed() {
                            self.metrics.record_malformed();
                        }
                        error!(error = %e, attempts = report.attempts, "External tier failed");
                        TierOutcome::Failed { retries }
                    }
                }
            }
            Ok(Err(join_error)) => {
                error!(error = %join_error, "External call task crashed");
                TierOutcome::Failed { retries: 0 }
            }
            Err(_) => {
                ctx.cancel();
                warn!(
                    timeout_ms = self.config.fallback_timeout.as_millis() as u64,
                    "Fallback deadline reached, abandoning external call"
                );
                TierOutcome::DeadlineExceeded
            }
        }
    }

    /// Writes an answer under the querying key. Tier 1 hits are already there and
    /// Tier 4 results are written by the call task.
    fn store(&self, served_by: PipelineState, key: &CacheKey, result: &EvaluationResult) {
        match served_by {
            PipelineState::Tier2Lookup | PipelineState::Tier3Compute => {
                self.exact.put(key.clone(), result.clone());
            }
            _ => {}
        }
    }

    fn fallback(
        &self,
        request: &EvaluationRequest,
        key: &CacheKey,
        heuristic: Option<EvaluationResult>,
        retries: u32,
    ) -> EvaluationResult {
        heuristic
            .unwrap_or_else(|| self.heuristic.evaluate_with_key(request, key))
            .into_recovered(retries)
    }

    fn finish(&self, mut result: EvaluationResult, started: Instant) -> EvaluationResult {
        result.evaluation_time = started.elapsed();
        self.metrics.record_served(result.tier);
        result
    }
}

fn transition(from: PipelineState, to: PipelineState) -> PipelineState {
    if from != to {
        debug!(from = %from, to = %to, "Pipeline transition");
    }
    to
}
