//! Tier 4: the external evaluation provider.
//!
//! Layers, innermost first: an [`EvaluationProvider`] makes one call, the
//! [`ExternalClient`] bounds it with a per-call timeout, and the [`RetryController`]
//! retries transient failures on a fixed backoff schedule.

mod client;
mod error;
mod prompt;
mod provider;
mod retry;

#[cfg(any(test, feature = "mock"))]
mod mock;


pub use client::ExternalClient;
pub use error::ExternalError;
pub use prompt::build_prompt;
pub use provider::{
    CannedProvider, ConfiguredProvider, DisabledProvider, EvaluationProvider, HttpProvider,
    classify_status, parse_reply,
};
pub use retry::{RetryConfig, RetryController, RetryReport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockProvider, MockStep};
