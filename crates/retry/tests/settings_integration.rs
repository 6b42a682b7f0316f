//! Integration tests for declarative retry settings
//!
//! Loads policies from TOML the way a service configuration file would embed
//! them, then drives decisions with the resulting policy.

#![cfg(feature = "settings")]

use std::time::Duration;

use pulsearc_retry::{
    AttemptOutcome, Clock, ConfigError, ExecutionAttemptHistory, MockClock, RetryDecisionEngine,
    RetryPolicyConfig, RetrySettings, Verdict,
};
use serde::Deserialize;

/// Service configuration embedding retry settings under its own table
#[derive(Debug, Deserialize)]
struct ServiceConfig {
    endpoint: String,
    retry: RetrySettings,
}

/// Validates settings embedded in a larger configuration document.
///
/// # Test Steps
/// 1. Parse a service config with a `[retry]` table
/// 2. Convert the settings into a policy with an abort condition added
/// 3. Drive failures and verify backoff delays and the abort
#[test]
fn test_embedded_settings_drive_decisions() {
    let document = r#"
        endpoint = "https://ingest.internal"

        [retry]
        max_retries = 4
        delay_ms = 50
        backoff_max_delay_ms = 150
    "#;

    let service: ServiceConfig = toml::from_str(document).expect("valid service config");
    assert_eq!(service.endpoint, "https://ingest.internal");

    let config: RetryPolicyConfig<u16, String> = service
        .retry
        .into_builder()
        .expect("valid retry settings")
        .abort_when(401)
        .build()
        .expect("valid policy");

    let clock = MockClock::new();
    let mut history = ExecutionAttemptHistory::start(&clock);
    let mut delays = Vec::new();
    for _ in 0..3 {
        history.record_attempt(AttemptOutcome::failed_result(503), clock.now());
        delays.push(RetryDecisionEngine::evaluate(&config, &history).delay());
    }
    let expected: Vec<_> = [50, 100, 150].into_iter().map(Duration::from_millis).collect();
    assert_eq!(delays, expected);

    history.record_attempt(AttemptOutcome::failed_result(401), clock.now());
    assert_eq!(RetryDecisionEngine::evaluate(&config, &history), Verdict::Abort);
}

/// Validates that invalid documents surface as configuration errors.
///
/// Assertions:
/// - Unparseable TOML is a `Settings` error.
/// - A jitter larger than the delay is an `InvalidState` error.
/// - Both delay modes at once is an `InvalidState` error.
#[test]
fn test_invalid_documents_are_rejected() {
    let err = RetrySettings::from_toml_str("max_retries = [").expect_err("invalid TOML");
    assert!(matches!(err, ConfigError::Settings { .. }));

    let settings = RetrySettings::from_toml_str("delay_ms = 10\njitter_ms = 20").expect("parses");
    let err = settings.build::<(), String>().expect_err("jitter exceeds delay");
    assert!(err.is_invalid_state());

    let settings = RetrySettings::from_toml_str("delay_ms = 10\ndelay_min_ms = 1\ndelay_max_ms = 5")
        .expect("parses");
    let err = settings.build::<(), String>().expect_err("conflicting delay modes");
    assert!(err.is_invalid_state());

    let settings = RetrySettings::from_toml_str("max_duration_ms = 0").expect("parses");
    let err = settings.build::<(), String>().expect_err("zero max duration");
    assert_eq!(err.field(), Some("max_duration"));
}

/// Validates that a policy survives a trip through its settings form.
#[test]
fn test_policy_to_settings_and_back() {
    let original = RetryPolicyConfig::<(), String>::builder()
        .with_delay_range(Duration::from_millis(20), Duration::from_millis(80))
        .and_then(|b| b.with_jitter_factor(0.25))
        .and_then(|b| b.with_max_duration(Duration::from_secs(10)))
        .map(|b| b.with_unlimited_retries())
        .and_then(|b| b.build())
        .expect("valid policy");

    let document = RetrySettings::try_from(&original)
        .expect("whole-millisecond policy")
        .to_toml_string()
        .expect("serializable settings");
    let restored: RetryPolicyConfig<(), String> = RetrySettings::from_toml_str(&document)
        .and_then(RetrySettings::build)
        .expect("valid restored policy");

    assert_eq!(restored.delay_strategy(), original.delay_strategy());
    assert_eq!(restored.jitter(), original.jitter());
    assert_eq!(restored.max_duration(), original.max_duration());
    assert_eq!(restored.max_attempts(), -1);
}

/// Validates settings parsed from JSON as well as TOML.
#[test]
fn test_settings_from_json() {
    let settings: RetrySettings =
        serde_json::from_str(r#"{"max_retries": 1, "delay_ms": 5}"#).expect("valid JSON settings");
    let config: RetryPolicyConfig<(), String> = settings.build().expect("valid policy");

    let clock = MockClock::new();
    let mut history = ExecutionAttemptHistory::start(&clock);
    history.record_attempt(AttemptOutcome::failure("reset".to_string()), clock.now());
    assert_eq!(
        RetryDecisionEngine::evaluate(&config, &history),
        Verdict::Retry { delay: Duration::from_millis(5) }
    );
    history.record_attempt(AttemptOutcome::failure("reset".to_string()), clock.now());
    assert_eq!(RetryDecisionEngine::evaluate(&config, &history), Verdict::RetriesExceeded);
}
