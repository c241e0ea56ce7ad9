use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;
use std::time::Duration;

use crate::external::EvaluationProvider;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    clear_verdict_env();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    clear_verdict_env();
    result
}

fn clear_verdict_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for name in Config::ALL_ENV_VARS {
        unsafe { env::remove_var(name) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert!(config.provider_url.is_none());
    assert!(!config.mock_provider);
    assert_eq!(config.call_timeout, Duration::from_millis(2000));
    assert_eq!(config.fallback_timeout, Duration::from_millis(8000));
    assert_eq!(config.max_retries, 3);
    assert_eq!(
        config.backoff,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(2000)
        ]
    );
    assert_eq!(config.cache_capacity, 10_000);
    assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
    assert_eq!(config.similarity_threshold, 0.85);
    assert!(config.validate().is_ok());
}

#[test]
fn test_socket_addr() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = Config {
        port: 3000,
        bind_addr: "0.0.0.0".parse().unwrap(),
        ..Config::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_from_env_defaults() {
    let config = with_env_vars(&[], Config::from_env).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    let config = with_env_vars(
        &[
            ("VERDICT_PORT", "9090"),
            ("VERDICT_BIND_ADDR", "0.0.0.0"),
            ("VERDICT_PROVIDER_URL", "https://grader.internal/v1/score"),
            ("VERDICT_PROVIDER_API_KEY", "secret"),
            ("VERDICT_CALL_TIMEOUT_MS", "1500"),
            ("VERDICT_FALLBACK_TIMEOUT_MS", "5000"),
            ("VERDICT_MAX_RETRIES", "2"),
            ("VERDICT_BACKOFF_MS", "100, 200"),
            ("VERDICT_CACHE_CAPACITY", "500"),
            ("VERDICT_CACHE_TTL_SECS", "60"),
            ("VERDICT_SIMILARITY_THRESHOLD", "0.9"),
            ("VERDICT_SWEEP_INTERVAL_SECS", "0"),
            ("VERDICT_JITTER_SEED", "42"),
        ],
        Config::from_env,
    )
    .unwrap();

    assert_eq!(config.port, 9090);
    assert_eq!(config.socket_addr(), "0.0.0.0:9090");
    assert_eq!(
        config.provider_url.as_deref(),
        Some("https://grader.internal/v1/score")
    );
    assert_eq!(config.provider_api_key.as_deref(), Some("secret"));
    assert_eq!(config.call_timeout, Duration::from_millis(1500));
    assert_eq!(config.fallback_timeout, Duration::from_millis(5000));
    assert_eq!(config.max_retries, 2);
    assert_eq!(
        config.backoff,
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert_eq!(config.cache_capacity, 500);
    assert_eq!(config.cache_ttl, Duration::from_secs(60));
    assert_eq!(config.similarity_threshold, 0.9);
    assert!(!config.sweeper_enabled());
    assert_eq!(config.jitter_seed, 42);
}

#[test]
#[serial]
fn test_invalid_port() {
    let zero = with_env_vars(&[("VERDICT_PORT", "0")], Config::from_env);
    assert!(matches!(zero, Err(ConfigError::InvalidPort { .. })));

    let garbage = with_env_vars(&[("VERDICT_PORT", "http")], Config::from_env);
    assert!(matches!(garbage, Err(ConfigError::PortParseError { .. })));
}

#[test]
#[serial]
fn test_invalid_bind_addr() {
    let result = with_env_vars(&[("VERDICT_BIND_ADDR", "localhost")], Config::from_env);
    assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));
}

#[test]
#[serial]
fn test_unparseable_numbers_are_errors() {
    for (name, value) in [
        ("VERDICT_CALL_TIMEOUT_MS", "fast"),
        ("VERDICT_MAX_RETRIES", "-1"),
        ("VERDICT_CACHE_CAPACITY", "lots"),
        ("VERDICT_SIMILARITY_THRESHOLD", "high"),
        ("VERDICT_BACKOFF_MS", "500,soon"),
    ] {
        let result = with_env_vars(&[(name, value)], Config::from_env);
        match result {
            Err(ConfigError::InvalidValue { name: reported, .. }) => assert_eq!(reported, name),
            other => panic!("{name}={value}: expected InvalidValue, got {other:?}"),
        }
    }
}

#[test]
#[serial]
fn test_mock_provider_flag() {
    let on = with_env_vars(&[("VERDICT_MOCK_PROVIDER", "true")], Config::from_env).unwrap();
    assert!(on.mock_provider);

    let off = with_env_vars(&[("VERDICT_MOCK_PROVIDER", "0")], Config::from_env).unwrap();
    assert!(!off.mock_provider);

    let bad = with_env_vars(&[("VERDICT_MOCK_PROVIDER", "maybe")], Config::from_env);
    assert!(matches!(bad, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_validate_rejects_nonsense() {
    let cases = [
        Config {
            fallback_timeout: Duration::ZERO,
            ..Config::default()
        },
        Config {
            cache_capacity: 0,
            ..Config::default()
        },
        Config {
            similarity_threshold: 1.5,
            ..Config::default()
        },
        Config {
            similarity_threshold: 0.0,
            ..Config::default()
        },
        Config {
            heuristic_confidence: -0.1,
            ..Config::default()
        },
        Config {
            backoff: vec![Duration::from_millis(1000), Duration::from_millis(500)],
            ..Config::default()
        },
        Config {
            provider_url: Some("grader.internal".to_string()),
            ..Config::default()
        },
    ];

    for config in cases {
        assert!(
            matches!(config.validate(), Err(ConfigError::InvalidValue { .. })),
            "{config:?} should be rejected"
        );
    }
}

#[test]
fn test_orchestrator_config_mapping() {
    let config = Config {
        call_timeout: Duration::from_millis(700),
        fallback_timeout: Duration::from_millis(3000),
        max_retries: 1,
        cache_capacity: 42,
        context_prefix_len: 16,
        heuristic_confidence: 0.7,
        jitter_seed: 9,
        ..Config::default()
    };

    let orchestrator = config.orchestrator_config();
    assert_eq!(orchestrator.fallback_timeout, Duration::from_millis(3000));
    assert_eq!(orchestrator.retry.call_timeout, Duration::from_millis(700));
    assert_eq!(orchestrator.retry.max_retries, 1);
    assert_eq!(orchestrator.cache.capacity, 42);
    assert_eq!(orchestrator.normalizer.context_prefix_len, 16);
    assert_eq!(orchestrator.heuristic.confidence_threshold, 0.7);
    assert_eq!(orchestrator.heuristic.seed, 9);
}

#[test]
fn test_provider_selection() {
    let disabled = Config::default().provider().unwrap();
    assert_eq!(disabled.name(), "disabled");

    let http = Config {
        provider_url: Some("http://127.0.0.1:9/score".to_string()),
        ..Config::default()
    }
    .provider()
    .unwrap();
    assert_eq!(http.name(), "http");

    let canned = Config {
        provider_url: Some("http://127.0.0.1:9/score".to_string()),
        mock_provider: true,
        ..Config::default()
    }
    .provider()
    .unwrap();
    assert_eq!(canned.name(), "canned");
}
