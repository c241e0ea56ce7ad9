use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::tier::Tier;
use crate::constants::{CLOSE_SCORE_THRESHOLD, CORRECT_SCORE_THRESHOLD, MAX_SCORE};

/// Verdict on a learner response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Correct,
    Close,
    Wrong,
}

impl Status {
    /// Fixed threshold mapping used by every path that derives status locally.
    pub fn from_score(score: u8) -> Self {
        if score >= CORRECT_SCORE_THRESHOLD {
            Status::Correct
        } else if score >= CLOSE_SCORE_THRESHOLD {
            Status::Close
        } else {
            Status::Wrong
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Correct => "correct",
            Status::Close => "close",
            Status::Wrong => "wrong",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Ok(Self::Correct),
            "close" | "almost" | "partial" => Ok(Self::Close),
            "wrong" | "incorrect" => Ok(Self::Wrong),
            _ => Err(format!("unknown status: {}", s)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score and feedback for one request, plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub status: Status,
    /// 0..=100.
    pub score: u8,
    /// 0.0..=1.0.
    pub confidence: f64,
    pub feedback: String,
    pub cached: bool,
    pub evaluation_time: Duration,
    /// External attempts beyond the first.
    pub retries: u32,
    pub error_recovered: bool,
    pub tier: Tier,
}

impl EvaluationResult {
    /// Builds a result whose status follows the fixed score mapping.
    pub fn from_score(score: u8, confidence: f64, feedback: impl Into<String>, tier: Tier) -> Self {
        let score = score.min(MAX_SCORE);
        Self {
            status: Status::from_score(score),
            score,
            confidence: confidence.clamp(0.0, 1.0),
            feedback: feedback.into(),
            cached: false,
            evaluation_time: Duration::ZERO,
            retries: 0,
            error_recovered: false,
            tier,
        }
    }

    /// Builds a result with an externally supplied status.
    pub fn with_status(
        status: Status,
        score: u8,
        confidence: f64,
        feedback: impl Into<String>,
        tier: Tier,
    ) -> Self {
        Self {
            status,
            ..Self::from_score(score, confidence, feedback, tier)
        }
    }

    /// Returns `true` if `status` agrees with the fixed score mapping.
    pub fn is_consistent(&self) -> bool {
        self.status == Status::from_score(self.score)
    }

    /// Copy as handed out by a cache tier.
    pub(crate) fn as_cached(&self, tier: Tier) -> Self {
        Self {
            cached: true,
            tier,
            retries: 0,
            error_recovered: false,
            ..self.clone()
        }
    }

    /// Marks this result as the ultimate fallback.
    pub(crate) fn into_recovered(mut self, retries: u32) -> Self {
        self.error_recovered = true;
        self.retries = retries;
        self.tier = Tier::Fallback;
        self
    }
}
