use std::time::Duration;

use thiserror::Error;

/// Failure of one call to the external evaluation provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExternalError {
    /// The call did not finish within its per-call timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Provider signalled throttling.
    #[error("provider rate limited the request")]
    RateLimited {
        /// Server hint, if it sent one.
        retry_after: Option<Duration>,
    },

    /// Any other provider-side failure.
    #[error("provider error (status {status:?}): {message}")]
    Service {
        /// HTTP status, when there was a response at all.
        status: Option<u16>,
        retryable: bool,
        message: String,
    },

    /// Response did not contain a usable score and status. Never retried.
    #[error("malformed provider response: {reason}")]
    MalformedResponse { reason: String },

    /// The request deadline fired before this attempt could start.
    #[error("external call cancelled")]
    Cancelled,
}

impl ExternalError {
    pub fn service(status: Option<u16>, retryable: bool, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            retryable,
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// `true` for failures the same call may survive on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Service { retryable, .. } => *retryable,
            Self::MalformedResponse { .. } | Self::Cancelled => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }

    /// Server-provided backoff hint.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
