//! Wire shapes of `POST /v1/evaluate`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GatewayError;
use crate::constants::{MAX_CONTEXT_CHARS, MAX_TEXT_CHARS};
use crate::evaluation::{Difficulty, EvaluationRequest, EvaluationResult, PageContext, Status};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub text: String,
    pub context: String,
    pub difficulty: String,
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_context: Option<String>,
}

impl EvaluateRequest {
    /// Validates the payload and converts it into the engine's request type.
    ///
    /// Empty `text` is accepted. An unrecognized `pageContext` is dropped rather
    /// than rejected, since it is only a scoring hint.
    pub fn into_request(self) -> Result<EvaluationRequest, GatewayError> {
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|e: crate::evaluation::ParseEnumError| GatewayError::InvalidRequest(e.to_string()))?;

        let target_language = self.target_language.trim();
        if target_language.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "targetLanguage must not be empty".to_string(),
            ));
        }
        if self.text.chars().count() > MAX_TEXT_CHARS {
            return Err(GatewayError::InvalidRequest(format!(
                "text exceeds {MAX_TEXT_CHARS} characters"
            )));
        }
        if self.context.chars().count() > MAX_CONTEXT_CHARS {
            return Err(GatewayError::InvalidRequest(format!(
                "context exceeds {MAX_CONTEXT_CHARS} characters"
            )));
        }

        let page_context = self
            .page_context
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| match raw.parse::<PageContext>() {
                Ok(page) => Some(page),
                Err(e) => {
                    debug!(error = %e, "Ignoring unknown page context");
                    None
                }
            });

        let request = EvaluationRequest::new(
            self.text,
            self.context,
            difficulty,
            target_language.to_string(),
        );
        Ok(match page_context {
            Some(page) => request.with_page_context(page),
            None => request,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub status: Status,
    pub score: u8,
    pub confidence: f64,
    pub feedback: String,
    pub cached: bool,
    pub evaluation_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_recovered: Option<bool>,
}

impl From<&EvaluationResult> for EvaluateResponse {
    fn from(result: &EvaluationResult) -> Self {
        Self {
            status: result.status,
            score: result.score,
            confidence: result.confidence,
            feedback: result.feedback.clone(),
            cached: result.cached,
            evaluation_time_ms: u64::try_from(result.evaluation_time.as_millis()).unwrap_or(u64::MAX),
            error_recovered: result.error_recovered.then_some(true),
        }
    }
}

/// Body of `GET /admin/cache`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
}
