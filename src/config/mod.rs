//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `VERDICT_*` environment variables.
//! Unlike the listen address, timing and sizing values are never silently
//! defaulted: a value that is set but unparseable is a [`ConfigError::InvalidValue`].

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_BACKOFF_SCHEDULE, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_CALL_TIMEOUT,
    DEFAULT_CONTEXT_PREFIX_LEN, DEFAULT_FALLBACK_TIMEOUT, DEFAULT_HEURISTIC_CONFIDENCE,
    DEFAULT_MAX_RETRIES, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SWEEP_INTERVAL,
};
use crate::external::{CannedProvider, ConfiguredProvider, DisabledProvider, HttpProvider, RetryConfig};
use crate::heuristic::HeuristicConfig;
use crate::normalize::NormalizerConfig;
use crate::router::OrchestratorConfig;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `VERDICT_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Endpoint of the external evaluation provider. Unset disables Tier 4.
    pub provider_url: Option<String>,

    /// Bearer credential sent to the provider.
    pub provider_api_key: Option<String>,

    /// Model name forwarded to the provider.
    pub provider_model: Option<String>,

    /// Answer Tier 4 locally with a canned verdict instead of calling out.
    pub mock_provider: bool,

    /// Bound on a single provider attempt. Default: 2000ms.
    pub call_timeout: Duration,

    /// Overall pipeline deadline. Default: 8000ms.
    pub fallback_timeout: Duration,

    /// Retries after the first attempt. Default: `3`.
    pub max_retries: u32,

    /// Delays between attempts. Default: 500ms, 1000ms, 2000ms.
    pub backoff: Vec<Duration>,

    /// Max entries in the exact-match store. Default: `10_000`.
    pub cache_capacity: usize,

    /// Entry time-to-live. Default: 24h.
    pub cache_ttl: Duration,

    /// Tier 2 match threshold. Default: `0.85`.
    pub similarity_threshold: f64,

    /// Context characters kept in the cache key. Default: `64`.
    pub context_prefix_len: usize,

    /// Confidence the heuristic needs to answer at Tier 3. Default: `0.8`.
    pub heuristic_confidence: f64,

    /// Background expiry sweep period; zero disables the sweeper. Default: 300s.
    pub sweep_interval: Duration,

    /// Seed of the heuristic jitter. Default: `0`.
    pub jitter_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            provider_url: None,
            provider_api_key: None,
            provider_model: None,
            mock_provider: false,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF_SCHEDULE.to_vec(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            context_prefix_len: DEFAULT_CONTEXT_PREFIX_LEN,
            heuristic_confidence: DEFAULT_HEURISTIC_CONFIDENCE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            jitter_seed: 0,
        }
    }
}

impl Config {
    pub const ENV_PORT: &'static str = "VERDICT_PORT";
    pub const ENV_BIND_ADDR: &'static str = "VERDICT_BIND_ADDR";
    pub const ENV_PROVIDER_URL: &'static str = "VERDICT_PROVIDER_URL";
    pub const ENV_PROVIDER_API_KEY: &'static str = "VERDICT_PROVIDER_API_KEY";
    pub const ENV_PROVIDER_MODEL: &'static str = "VERDICT_PROVIDER_MODEL";
    pub const ENV_MOCK_PROVIDER: &'static str = "VERDICT_MOCK_PROVIDER";
    pub const ENV_CALL_TIMEOUT_MS: &'static str = "VERDICT_CALL_TIMEOUT_MS";
    pub const ENV_FALLBACK_TIMEOUT_MS: &'static str = "VERDICT_FALLBACK_TIMEOUT_MS";
    pub const ENV_MAX_RETRIES: &'static str = "VERDICT_MAX_RETRIES";
    pub const ENV_BACKOFF_MS: &'static str = "VERDICT_BACKOFF_MS";
    pub const ENV_CACHE_CAPACITY: &'static str = "VERDICT_CACHE_CAPACITY";
    pub const ENV_CACHE_TTL_SECS: &'static str = "VERDICT_CACHE_TTL_SECS";
    pub const ENV_SIMILARITY_THRESHOLD: &'static str = "VERDICT_SIMILARITY_THRESHOLD";
    pub const ENV_CONTEXT_PREFIX_LEN: &'static str = "VERDICT_CONTEXT_PREFIX_LEN";
    pub const ENV_HEURISTIC_CONFIDENCE: &'static str = "VERDICT_HEURISTIC_CONFIDENCE";
    pub const ENV_SWEEP_INTERVAL_SECS: &'static str = "VERDICT_SWEEP_INTERVAL_SECS";
    pub const ENV_JITTER_SEED: &'static str = "VERDICT_JITTER_SEED";

    /// Every variable read by [`Config::from_env`].
    pub const ALL_ENV_VARS: [&'static str; 17] = [
        Self::ENV_PORT,
        Self::ENV_BIND_ADDR,
        Self::ENV_PROVIDER_URL,
        Self::ENV_PROVIDER_API_KEY,
        Self::ENV_PROVIDER_MODEL,
        Self::ENV_MOCK_PROVIDER,
        Self::ENV_CALL_TIMEOUT_MS,
        Self::ENV_FALLBACK_TIMEOUT_MS,
        Self::ENV_MAX_RETRIES,
        Self::ENV_BACKOFF_MS,
        Self::ENV_CACHE_CAPACITY,
        Self::ENV_CACHE_TTL_SECS,
        Self::ENV_SIMILARITY_THRESHOLD,
        Self::ENV_CONTEXT_PREFIX_LEN,
        Self::ENV_HEURISTIC_CONFIDENCE,
        Self::ENV_SWEEP_INTERVAL_SECS,
        Self::ENV_JITTER_SEED,
    ];

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            provider_url: Self::parse_optional_string_from_env(Self::ENV_PROVIDER_URL),
            provider_api_key: Self::parse_optional_string_from_env(Self::ENV_PROVIDER_API_KEY),
            provider_model: Self::parse_optional_string_from_env(Self::ENV_PROVIDER_MODEL),
            mock_provider: Self::parse_flag_from_env(Self::ENV_MOCK_PROVIDER)?,
            call_timeout: Self::parse_millis_from_env(Self::ENV_CALL_TIMEOUT_MS, defaults.call_timeout)?,
            fallback_timeout: Self::parse_millis_from_env(
                Self::ENV_FALLBACK_TIMEOUT_MS,
                defaults.fallback_timeout,
            )?,
            max_retries: Self::parse_from_env(Self::ENV_MAX_RETRIES, defaults.max_retries)?,
            backoff: Self::parse_backoff_from_env(defaults.backoff)?,
            cache_capacity: Self::parse_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity)?,
            cache_ttl: Self::parse_secs_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl)?,
            similarity_threshold: Self::parse_from_env(
                Self::ENV_SIMILARITY_THRESHOLD,
                defaults.similarity_threshold,
            )?,
            context_prefix_len: Self::parse_from_env(
                Self::ENV_CONTEXT_PREFIX_LEN,
                defaults.context_prefix_len,
            )?,
            heuristic_confidence: Self::parse_from_env(
                Self::ENV_HEURISTIC_CONFIDENCE,
                defaults.heuristic_confidence,
            )?,
            sweep_interval: Self::parse_secs_from_env(
                Self::ENV_SWEEP_INTERVAL_SECS,
                defaults.sweep_interval,
            )?,
            jitter_seed: Self::parse_from_env(Self::ENV_JITTER_SEED, defaults.jitter_seed)?,
        })
    }

    /// Rejects values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout.is_zero() {
            return Err(ConfigError::invalid(
                Self::ENV_CALL_TIMEOUT_MS,
                0,
                "must be greater than zero",
            ));
        }
        if self.fallback_timeout.is_zero() {
            return Err(ConfigError::invalid(
                Self::ENV_FALLBACK_TIMEOUT_MS,
                0,
                "must be greater than zero",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid(
                Self::ENV_CACHE_CAPACITY,
                0,
                "must be greater than zero",
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::invalid(
                Self::ENV_CACHE_TTL_SECS,
                0,
                "must be greater than zero",
            ));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                Self::ENV_SIMILARITY_THRESHOLD,
                self.similarity_threshold,
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.heuristic_confidence) {
            return Err(ConfigError::invalid(
                Self::ENV_HEURISTIC_CONFIDENCE,
                self.heuristic_confidence,
                "must be in [0, 1]",
            ));
        }
        if !self.backoff.windows(2).all(|pair| pair[0] <= pair[1]) {
            return Err(ConfigError::invalid(
                Self::ENV_BACKOFF_MS,
                format_backoff(&self.backoff),
                "delays must be non-decreasing",
            ));
        }
        if let Some(url) = &self.provider_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::invalid(
                Self::ENV_PROVIDER_URL,
                url,
                "must be an http(s) URL",
            ));
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Pipeline settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .fallback_timeout(self.fallback_timeout)
            .similarity_threshold(self.similarity_threshold)
            .normalizer(NormalizerConfig::default().context_prefix_len(self.context_prefix_len))
            .cache(
                CacheConfig::default()
                    .capacity(self.cache_capacity)
                    .ttl(self.cache_ttl),
            )
            .heuristic(
                HeuristicConfig::default()
                    .confidence_threshold(self.heuristic_confidence)
                    .seed(self.jitter_seed),
            )
            .retry(
                RetryConfig::default()
                    .max_retries(self.max_retries)
                    .backoff(self.backoff.clone())
                    .call_timeout(self.call_timeout),
            )
    }

    /// Picks the Tier 4 provider: the canned one when mocking, HTTP when an
    /// endpoint is configured, otherwise a provider that always fails fast.
    pub fn provider(&self) -> Result<ConfiguredProvider, ConfigError> {
        if self.mock_provider {
            return Ok(ConfiguredProvider::Canned(CannedProvider));
        }
        match &self.provider_url {
            Some(url) => Ok(ConfiguredProvider::Http(HttpProvider::new(
                url.clone(),
                self.provider_api_key.clone(),
                self.provider_model.clone(),
            )?)),
            None => Ok(ConfiguredProvider::Disabled(DisabledProvider)),
        }
    }

    /// Whether the background expiry sweeper should run.
    pub fn sweeper_enabled(&self) -> bool {
        !self.sweep_interval.is_zero()
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_flag_from_env(var_name: &'static str) -> Result<bool, ConfigError> {
        let Some(value) = Self::parse_optional_string_from_env(var_name) else {
            return Ok(false);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(var_name, value, "expected a boolean")),
        }
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(var_name, &value, e.to_string())),
            None => Ok(default),
        }
    }

    fn parse_millis_from_env(var_name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(_) => Self::parse_from_env::<u64>(var_name, 0).map(Duration::from_millis),
            None => Ok(default),
        }
    }

    fn parse_secs_from_env(var_name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(_) => Self::parse_from_env::<u64>(var_name, 0).map(Duration::from_secs),
            None => Ok(default),
        }
    }

    fn parse_backoff_from_env(default: Vec<Duration>) -> Result<Vec<Duration>, ConfigError> {
        let Some(value) = Self::parse_optional_string_from_env(Self::ENV_BACKOFF_MS) else {
            return Ok(default);
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::invalid(Self::ENV_BACKOFF_MS, &value, e.to_string()))
            })
            .collect()
    }
}

fn format_backoff(schedule: &[Duration]) -> String {
    schedule
        .iter()
        .map(|d| d.as_millis().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
