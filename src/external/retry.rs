//! Bounded retries with a fixed, progressive backoff schedule.
//!
//! At most `max_retries + 1` attempts are made. The delay before retry `n` is
//! `backoff[n - 1]` (the last entry repeats if the schedule is shorter), raised to a
//! server `Retry-After` hint if one was sent, and never shorter than the previous
//! delay. No jitter.
//!
//! Cancellation stops the controller from *starting* anything new: a backoff sleep
//! is abandoned, but an attempt already in flight runs to completion.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::ExternalClient;
use super::error::ExternalError;
use super::provider::EvaluationProvider;
use crate::constants::{DEFAULT_BACKOFF_SCHEDULE, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_RETRIES};
use crate::evaluation::{EvaluationRequest, EvaluationResult};
use crate::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,
    /// Delay before each retry. Default: 500ms, 1000ms, 2000ms.
    pub backoff: Vec<Duration>,
    /// Bound on each individual attempt. Default: 2000ms.
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF_SCHEDULE.to_vec(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backoff(mut self, schedule: Vec<Duration>) -> Self {
        self.backoff = schedule;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Scheduled delay before retry `retry` (1-based), ignoring hints.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let index = retry.saturating_sub(1) as usize;
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Final outcome of a retried call.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub outcome: Result<EvaluationResult, ExternalError>,
    pub attempts: u32,
}

impl RetryReport {
    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Drives an [`ExternalClient`] through the retry policy.
pub struct RetryController<P: EvaluationProvider> {
    client: ExternalClient<P>,
    config: RetryConfig,
}

impl<P: EvaluationProvider> Clone for RetryController<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl<P: EvaluationProvider> std::fmt::Debug for RetryController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish()
    }
}

impl<P: EvaluationProvider> RetryController<P> {
    pub fn new(client: ExternalClient<P>, config: RetryConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn client(&self) -> &ExternalClient<P> {
        &self.client
    }

    /// Runs the call with retries. Successful results carry the retry count.
    pub async fn run(
        &self,
        request: &EvaluationRequest,
        cancel: &CancellationToken,
        metrics: &Metrics,
    ) -> RetryReport {
        let max_attempts = self.config.max_attempts();
        let mut attempts = 0u32;
        let mut last_delay = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return RetryReport {
                    outcome: Err(ExternalError::Cancelled),
                    attempts,
                };
            }

            attempts += 1;
            let error = match self
                .client
                .call_external(request, self.config.call_timeout)
                .await
            {
                Ok(mut result) => {
                    result.retries = attempts - 1;
                    return RetryReport {
                        outcome: Ok(result),
                        attempts,
                    };
                }
                Err(e) => e,
            };

            if matches!(error, ExternalError::Timeout(_)) {
                metrics.record_timeout();
            }

            if !error.is_retryable() || attempts >= max_attempts {
                if error.is_retryable() {
                    warn!(attempts, error = %error, "Retries exhausted");
                } else {
                    debug!(attempts, error = %error, "Non-retryable provider error");
                }
                return RetryReport {
                    outcome: Err(error),
                    attempts,
                };
            }

            let delay = self
                .config
                .delay_for_retry(attempts)
                .max(error.retry_after().unwrap_or(Duration::ZERO))
                .max(last_delay);
            last_delay = delay;

            metrics.record_retry();
            warn!(
                attempt = attempts,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying provider call after transient error"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(attempts, "Deadline reached during backoff, giving up");
                    return RetryReport {
                        outcome: Err(ExternalError::Cancelled),
                        attempts,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
