//! Configuration error types.

use thiserror::Error;

use crate::external::ExternalError;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A variable was set but its value is unusable.
    #[error("invalid value for {name} ('{value}'): {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The configured provider could not be constructed.
    #[error("failed to build evaluation provider: {0}")]
    Provider(#[from] ExternalError),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
