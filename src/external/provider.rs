//! Provider seam for Tier 4.
//!
//! [`EvaluationProvider`] is one logical call to whatever grades answers remotely.
//! [`HttpProvider`] posts JSON to a configured endpoint; [`CannedProvider`] answers
//! locally for demos and end-to-end tests; [`DisabledProvider`] fails every call fast
//! so the router falls back immediately when no endpoint is configured.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::error::ExternalError;
use super::prompt::build_prompt;
use crate::constants::MAX_SCORE;
use crate::evaluation::{EvaluationRequest, EvaluationResult, Status, Tier};

/// Confidence assumed when the provider does not report one.
const DEFAULT_PROVIDER_CONFIDENCE: f64 = 0.9;

/// One remote grading call, without timeout or retry (see
/// [`ExternalClient`](super::ExternalClient) and [`RetryController`](super::RetryController)).
pub trait EvaluationProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> impl Future<Output = Result<EvaluationResult, ExternalError>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: String,
    text: &'a str,
    context: &'a str,
    difficulty: &'static str,
    target_language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_context: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ProviderReply {
    score: Option<serde_json::Value>,
    status: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// JSON-over-HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpProvider {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, ExternalError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("verdict/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExternalError::service(None, false, e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            model,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EvaluationProvider for HttpProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, ExternalError> {
        let body = ProviderRequest {
            model: self.model.as_deref(),
            prompt: build_prompt(request),
            text: &request.text,
            context: &request.context,
            difficulty: request.difficulty.as_str(),
            target_language: &request.target_language,
            page_context: request.page_context.map(|p| p.as_str()),
        };

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, message));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExternalError::malformed(format!("unreadable body: {e}")))?;
        debug!(status = status.as_u16(), bytes = text.len(), "Provider replied");
        parse_reply(&text)
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> ExternalError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ExternalError::RateLimited { retry_after };
    }
    let retryable = status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT;
    if !retryable {
        error!(status = status.as_u16(), "Provider rejected request");
    }
    ExternalError::service(Some(status.as_u16()), retryable, message)
}

fn classify_transport_error(e: reqwest::Error) -> ExternalError {
    let retryable = e.is_timeout() || e.is_connect() || e.is_request();
    ExternalError::service(None, retryable, e.to_string())
}

/// Parses a provider body into a result. The body may wrap the JSON object in prose
/// (as language models tend to); the outermost `{...}` is used.
pub fn parse_reply(body: &str) -> Result<EvaluationResult, ExternalError> {
    let json = extract_json_object(body)
        .ok_or_else(|| ExternalError::malformed("no JSON object in response"))?;
    let reply: ProviderReply = serde_json::from_str(json)
        .map_err(|e| ExternalError::malformed(format!("invalid JSON: {e}")))?;

    let score = reply
        .score
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| ExternalError::malformed("missing numeric score"))?;
    if !score.is_finite() || !(0.0..=f64::from(MAX_SCORE)).contains(&score) {
        return Err(ExternalError::malformed(format!("score {score} out of range")));
    }

    let status: Status = reply
        .status
        .as_deref()
        .ok_or_else(|| ExternalError::malformed("missing status"))?
        .parse()
        .map_err(ExternalError::malformed)?;

    let confidence = reply
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_PROVIDER_CONFIDENCE);

    Ok(EvaluationResult::with_status(
        status,
        score.round() as u8,
        confidence,
        reply.feedback.unwrap_or_default(),
        Tier::External,
    ))
}

fn extract_json_object(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

/// Answers every call locally with a fixed verdict.
#[derive(Debug, Clone, Default)]
pub struct CannedProvider;

impl EvaluationProvider for CannedProvider {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, ExternalError> {
        Ok(EvaluationResult::from_score(
            88,
            0.95,
            format!("Mock evaluation for: {}", request.text.trim()),
            Tier::External,
        ))
    }
}

/// Fails every call with a non-retryable error.
#[derive(Debug, Clone, Default)]
pub struct DisabledProvider;

impl EvaluationProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn evaluate(&self, _request: &EvaluationRequest) -> Result<EvaluationResult, ExternalError> {
        Err(ExternalError::service(
            None,
            false,
            "no evaluation provider configured",
        ))
    }
}

/// Provider picked at startup from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredProvider {
    Http(HttpProvider),
    Canned(CannedProvider),
    Disabled(DisabledProvider),
}

impl EvaluationProvider for ConfiguredProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Http(p) => p.name(),
            Self::Canned(p) => p.name(),
            Self::Disabled(p) => p.name(),
        }
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, ExternalError> {
        match self {
            Self::Http(p) => p.evaluate(request).await,
            Self::Canned(p) => p.evaluate(request).await,
            Self::Disabled(p) => p.evaluate(request).await,
        }
    }
}
