//! Tier 3: deterministic heuristic evaluator.
//!
//! A pure function of `(seed, request)` with no I/O. The router consults it before
//! paying for an external call, and reuses it as the ultimate fallback when the
//! external tier fails or the deadline fires.
//!
//! Scoring has two stages:
//!
//! 1. **Decisive checks** (empty answer, gibberish, copy of the prompt, absurd length).
//!    These are clear-cut, produce a fixed score and a high confidence, and are the
//!    only cases where Tier 3 answers on its own with default settings.
//! 2. **Additive signals** on top of a neutral base: length against what the
//!    difficulty allows, lexical overlap with the context, function words of the
//!    target language, and a per-[`PageContext`] adjustment. A bounded
//!    [`HashJitter`] offset is added last. Confidence stays low on this path.

mod jitter;
mod signals;


use tracing::{debug, instrument};

use crate::constants::{DEFAULT_HEURISTIC_CONFIDENCE, DEFAULT_JITTER_AMPLITUDE, MAX_SCORE};
use crate::evaluation::{EvaluationRequest, EvaluationResult, PageContext, Status, Tier};
use crate::normalize::{CacheKey, KeyNormalizer, fold_text};

pub use jitter::HashJitter;

use signals::{
    context_overlap, decisive_verdict, has_language_markers, page_adjustment, word_count,
};

const NEUTRAL_BASE: i16 = 60;
const BASE_CONFIDENCE: f64 = 0.55;
const CONFIDENCE_PER_SIGNAL: f64 = 0.05;
/// Additive-path confidence never reaches the default gate.
const MAX_ADDITIVE_CONFIDENCE: f64 = 0.75;
/// Above this share of words lifted from the context, the answer is mostly a copy.
const HIGH_OVERLAP: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    /// Minimum confidence for Tier 3 to answer instead of escalating. Default: `0.8`.
    pub confidence_threshold: f64,
    /// Jitter bound in score points. Default: `3`.
    pub jitter_amplitude: u8,
    pub seed: u64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_HEURISTIC_CONFIDENCE,
            jitter_amplitude: DEFAULT_JITTER_AMPLITUDE,
            seed: 0,
        }
    }
}

impl HeuristicConfig {
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn jitter_amplitude(mut self, amplitude: u8) -> Self {
        self.jitter_amplitude = amplitude;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicEvaluator {
    config: HeuristicConfig,
    normalizer: KeyNormalizer,
    jitter: HashJitter,
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

impl HeuristicEvaluator {
    pub fn new(config: HeuristicConfig) -> Self {
        Self::with_normalizer(config, KeyNormalizer::default())
    }

    /// Uses `normalizer` to derive the jitter key, so the jitter agrees with cache keys.
    pub fn with_normalizer(config: HeuristicConfig, normalizer: KeyNormalizer) -> Self {
        let jitter = HashJitter::new(config.seed, config.jitter_amplitude);
        Self {
            config,
            normalizer,
            jitter,
        }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// `true` if Tier 3 may answer with `result` instead of escalating.
    pub fn is_confident(&self, result: &EvaluationResult) -> bool {
        result.confidence >= self.config.confidence_threshold
    }

    pub fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let key = self.normalizer.normalize(request);
        self.evaluate_with_key(request, &key)
    }

    /// Same as [`evaluate`](Self::evaluate) for a caller that already holds the key.
    #[instrument(skip_all, fields(difficulty = request.difficulty.as_str()))]
    pub fn evaluate_with_key(&self, request: &EvaluationRequest, key: &CacheKey) -> EvaluationResult {
        let text = fold_text(&request.text);
        let context = fold_text(&request.context);
        let language = fold_text(&request.target_language);
        let max_words = request.difficulty.max_plausible_words();

        if let Some(verdict) = decisive_verdict(&text, &context, max_words, request.page_context) {
            debug!(?verdict, "Heuristic decisive verdict");
            return EvaluationResult::from_score(
                verdict.score(),
                verdict.confidence(),
                verdict.feedback(),
                Tier::Heuristic,
            );
        }

        let words = word_count(&text);
        let mut score = NEUTRAL_BASE;
        let mut signals = 0u32;

        if words <= max_words {
            score += 5;
        } else {
            score -= 10;
            signals += 1;
        }

        let overlap = context_overlap(&text, &context);
        if request.page_context == Some(PageContext::Dictation) {
            score += (overlap * 20.0).round() as i16;
        } else if overlap > HIGH_OVERLAP {
            score -= 15;
            signals += 1;
        }

        let markers = has_language_markers(&text, &language);
        match markers {
            Some(true) => {
                score += 10;
                signals += 1;
            }
            Some(false) => {
                score -= 12;
                signals += 1;
            }
            None => {}
        }

        score += page_adjustment(request.page_context, words);
        let jitter = self.jitter.offset(key);
        score += jitter;

        let score = score.clamp(0, i16::from(MAX_SCORE)) as u8;
        let confidence = (BASE_CONFIDENCE + CONFIDENCE_PER_SIGNAL * f64::from(signals))
            .min(MAX_ADDITIVE_CONFIDENCE);

        debug!(score, confidence, jitter, overlap, words, "Heuristic additive score");

        let feedback = feedback_for(Status::from_score(score), markers, &request.target_language);
        EvaluationResult::from_score(score, confidence, feedback, Tier::Heuristic)
    }
}

fn feedback_for(status: Status, markers: Option<bool>, language: &str) -> String {
    let mut feedback = match status {
        Status::Correct => String::from("Looks good."),
        Status::Close => String::from("Almost there. Check your word choice and spelling."),
        Status::Wrong => String::from("This doesn't quite answer the prompt."),
    };
    if markers == Some(false) {
        feedback.push_str(&format!(" It doesn't read like {}.", language.trim()));
    }
    feedback
}
