//! HTTP client helpers for tests.

use serde_json::Value;
use std::time::Duration;
use verdict::VERDICT_TIER_HEADER;
use verdict::gateway::{CacheStatus, EvaluateResponse, HealthResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    /// Returns the parsed body and the `X-Verdict-Tier` header.
    pub async fn evaluate(&self, body: &Value) -> Result<(EvaluateResponse, String), TestClientError> {
        let resp = self
            .client
            .post(self.url("/v1/evaluate"))
            .json(body)
            .send()
            .await?;

        let tier = resp
            .headers()
            .get(VERDICT_TIER_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        match resp.status().as_u16() {
            200 => Ok((resp.json().await?, tier)),
            400 | 415 | 422 => Err(TestClientError::BadRequest(resp.text().await?)),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(TestClientError::UnexpectedStatus(status, body))
            }
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, TestClientError> {
        self.get_json("/healthz").await
    }

    pub async fn metrics(&self) -> Result<Value, TestClientError> {
        self.get_json("/metrics").await
    }

    pub async fn cache_status(&self) -> Result<CacheStatus, TestClientError> {
        self.get_json("/admin/cache").await
    }

    pub async fn reset_metrics(&self) -> Result<Value, TestClientError> {
        let resp = self
            .client
            .post(self.url("/admin/metrics/reset"))
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, TestClientError> {
        let resp = self.client.get(self.url(path)).send().await?;

        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(TestClientError::UnexpectedStatus(status, body))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0} - Body: {1}")]
    UnexpectedStatus(u16, String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}
