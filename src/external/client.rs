use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::error::ExternalError;
use super::provider::EvaluationProvider;
use crate::evaluation::{EvaluationRequest, EvaluationResult, Tier};

/// One provider call raced against a hard per-call timeout.
pub struct ExternalClient<P: EvaluationProvider> {
    provider: Arc<P>,
}

impl<P: EvaluationProvider> Clone for ExternalClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: EvaluationProvider> std::fmt::Debug for ExternalClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalClient")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl<P: EvaluationProvider> ExternalClient<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Calls the provider once. A call still running after `timeout` is dropped and
    /// reported as [`ExternalError::Timeout`].
    #[instrument(skip_all, fields(provider = self.provider.name(), timeout_ms = timeout.as_millis() as u64))]
    pub async fn call_external(
        &self,
        request: &EvaluationRequest,
        timeout: Duration,
    ) -> Result<EvaluationResult, ExternalError> {
        match tokio::time::timeout(timeout, self.provider.evaluate(request)).await {
            Ok(Ok(mut result)) => {
                result.tier = Tier::External;
                result.cached = false;
                debug!(score = result.score, status = %result.status, "Provider call succeeded");
                Ok(result)
            }
            Ok(Err(e)) => {
                debug!(error = %e, retryable = e.is_retryable(), "Provider call failed");
                Err(e)
            }
            Err(_) => {
                debug!("Provider call timed out");
                Err(ExternalError::Timeout(timeout))
            }
        }
    }
}
