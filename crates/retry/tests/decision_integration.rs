//! Integration tests for retry decisions
//!
//! Drives complete executions through a small synchronous driver on a
//! `MockClock`, checking verdict sequences, delays, limits, abort handling,
//! event ordering and sharing one policy across threads.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pulsearc_retry::{
    AttemptOutcome, Clock, ExecutionAttemptHistory, MockClock, RetryDecisionEngine,
    RetryPolicyConfig, Verdict,
};

/// Error raised by the simulated remote service
#[derive(Debug, Clone, PartialEq)]
struct ServiceError {
    code: u16,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service returned {}", self.code)
    }
}

impl Error for ServiceError {}

/// Error that must never be retried
#[derive(Debug)]
struct PermissionDenied;

impl fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("permission denied")
    }
}

impl Error for PermissionDenied {}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Result of a driven execution
struct Execution<R, E> {
    verdict: Verdict,
    history: ExecutionAttemptHistory<R, E>,
    verdicts: Vec<Verdict>,
}

/// Minimal synchronous driver: every attempt takes `attempt_time` on the mock
/// clock and retry delays are "slept" by advancing the clock.
fn drive<R, E>(
    config: &RetryPolicyConfig<R, E>,
    clock: &MockClock,
    attempt_time: Duration,
    mut operation: impl FnMut(u32) -> Result<R, E>,
) -> Execution<R, E> {
    let mut history = ExecutionAttemptHistory::start(clock);
    let mut verdicts = Vec::new();

    loop {
        clock.advance(attempt_time);
        let outcome = AttemptOutcome::from(operation(history.attempts() + 1));
        history.record_attempt(outcome, clock.now());

        let verdict = RetryDecisionEngine::evaluate(config, &history);
        verdicts.push(verdict);

        match verdict {
            Verdict::Retry { delay } => {
                history.record_scheduled_delay(delay);
                clock.advance(delay);
                RetryDecisionEngine::notify_retry(config, &history);
            }
            verdict => return Execution { verdict, history, verdicts },
        }
    }
}

/// Validates the default policy end to end.
///
/// # Test Steps
/// 1. Build the default policy (two retries, no delay)
/// 2. Drive an operation that always fails
/// 3. Verify the verdicts are Retry, Retry, RetriesExceeded
/// 4. Confirm exactly three attempts were made
#[test]
fn test_default_policy_gives_up_after_three_attempts() {
    init_tracing();
    let config = RetryPolicyConfig::<(), ServiceError>::default();
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::ZERO, |_| Err(ServiceError { code: 503 }));

    assert_eq!(
        execution.verdicts,
        vec![
            Verdict::Retry { delay: Duration::ZERO },
            Verdict::Retry { delay: Duration::ZERO },
            Verdict::RetriesExceeded,
        ]
    );
    assert_eq!(execution.history.attempts(), 3);
    assert_eq!(execution.history.last_failure(), Some(&ServiceError { code: 503 }));
}

/// Validates recovery from transient failures with exponential backoff.
///
/// Assertions:
/// - The third attempt succeeds.
/// - Scheduled delays were 100ms then 200ms.
#[test]
fn test_backoff_recovers_from_transient_failures() {
    init_tracing();
    let config = RetryPolicyConfig::<&str, ServiceError>::builder()
        .with_backoff(Duration::from_millis(100), Duration::from_secs(2))
        .and_then(|b| b.with_max_retries(5))
        .and_then(|b| b.build())
        .expect("valid backoff policy");
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::from_millis(10), |attempt| {
        if attempt < 3 {
            Err(ServiceError { code: 502 })
        } else {
            Ok("payload")
        }
    });

    assert_eq!(execution.verdict, Verdict::Succeed);
    assert_eq!(execution.history.attempts(), 3);
    assert_eq!(execution.history.last_result(), Some(&"payload"));
    assert_eq!(execution.history.total_delay(), Duration::from_millis(300));
    assert_eq!(execution.history.elapsed(), Duration::from_millis(330));
}

/// Validates failure-type abort with retries remaining.
///
/// Assertions:
/// - A `PermissionDenied` failure aborts on the first attempt.
/// - Other failures are still retried.
#[test]
fn test_abort_on_error_type_with_retries_remaining() {
    init_tracing();
    let config = RetryPolicyConfig::<(), anyhow::Error>::builder()
        .with_unlimited_retries()
        .abort_on_error::<PermissionDenied>()
        .build()
        .expect("valid policy");
    let clock = MockClock::new();

    let execution =
        drive(&config, &clock, Duration::ZERO, |_| Err(anyhow::Error::new(PermissionDenied)));
    assert_eq!(execution.verdict, Verdict::Abort);
    assert_eq!(execution.history.attempts(), 1);

    let execution = drive(&config, &clock, Duration::ZERO, |attempt| {
        if attempt < 4 {
            Err(anyhow::Error::new(ServiceError { code: 500 }))
        } else {
            Err(anyhow::Error::new(PermissionDenied))
        }
    });
    assert_eq!(execution.verdict, Verdict::Abort);
    assert_eq!(execution.history.attempts(), 4);
}

/// Validates that results can be classified as failures and abort values.
#[test]
fn test_result_classification_and_abort_value() {
    let config = RetryPolicyConfig::<u16, ServiceError>::builder()
        .abort_when(401)
        .build()
        .expect("valid policy");
    let clock = MockClock::new();
    let mut history = ExecutionAttemptHistory::start(&clock);

    history.record_attempt(AttemptOutcome::failed_result(503), clock.now());
    assert!(RetryDecisionEngine::evaluate(&config, &history).is_retry());

    history.record_attempt(AttemptOutcome::failed_result(401), clock.now());
    assert_eq!(RetryDecisionEngine::evaluate(&config, &history), Verdict::Abort);
}

/// Validates the max-duration ceiling over a whole execution.
///
/// # Test Steps
/// 1. Fixed 300ms delay, 1s max duration, unlimited retries
/// 2. Every attempt takes 100ms and fails
/// 3. Verify the last delay is clamped to the remaining 100ms
/// 4. Verify the execution ends with RetriesExceeded once 1s has elapsed
#[test]
fn test_max_duration_bounds_execution() {
    init_tracing();
    let config = RetryPolicyConfig::<(), ServiceError>::builder()
        .with_delay(Duration::from_millis(300))
        .and_then(|b| b.with_max_duration(Duration::from_secs(1)))
        .map(|b| b.with_unlimited_retries())
        .and_then(|b| b.build())
        .expect("valid policy");
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::from_millis(100), |_| {
        Err(ServiceError { code: 504 })
    });

    let delays: Vec<_> =
        execution.verdicts.iter().filter(|v| v.is_retry()).map(Verdict::delay).collect();
    assert_eq!(
        delays,
        vec![Duration::from_millis(300), Duration::from_millis(300), Duration::from_millis(100)]
    );
    assert_eq!(execution.verdict, Verdict::RetriesExceeded);
    assert_eq!(execution.history.attempts(), 4);
    assert!(execution.history.total_delay() <= Duration::from_secs(1));
}

/// Validates the full event sequence of an execution.
///
/// Assertions:
/// - Per retry: failed-attempt, retry-scheduled, retry.
/// - On exhaustion: failed-attempt, retries-exceeded.
/// - Handlers observe attempt numbers and delays.
#[test]
fn test_event_sequence() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));

    let failed = Arc::clone(&events);
    let scheduled = Arc::clone(&events);
    let retried = Arc::clone(&events);
    let exceeded = Arc::clone(&events);
    let aborted = Arc::clone(&events);

    let push = |events: &Arc<Mutex<Vec<String>>>, entry: String| {
        if let Ok(mut events) = events.lock() {
            events.push(entry);
        }
    };

    let config = RetryPolicyConfig::<(), ServiceError>::builder()
        .with_delay(Duration::from_millis(20))
        .and_then(|b| b.with_max_attempts(2))
        .expect("valid limits")
        .on_failed_attempt(move |event| push(&failed, format!("failed:{}", event.attempts)))
        .on_retry_scheduled(move |event| {
            let entry =
                format!("scheduled:{}:{}ms", event.attempt.attempts, event.delay.as_millis());
            push(&scheduled, entry);
        })
        .on_retry(move |event| push(&retried, format!("retry:{}", event.attempts)))
        .on_retries_exceeded(move |event| push(&exceeded, format!("exceeded:{}", event.attempts)))
        .on_abort(move |_event| push(&aborted, "abort".to_string()))
        .build()
        .expect("valid policy");
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::ZERO, |_| Err(ServiceError { code: 503 }));
    assert_eq!(execution.verdict, Verdict::RetriesExceeded);

    let events = events.lock().map(|events| events.clone()).unwrap_or_default();
    assert_eq!(
        events,
        vec!["failed:1", "scheduled:1:20ms", "retry:1", "failed:2", "exceeded:2"]
    );
}

/// Validates the event sequence of an execution ended by an abort.
///
/// # Test Steps
/// 1. Abort on a 401 failure with every handler recording
/// 2. Drive two retryable 503 failures, then a 401
/// 3. Verify the aborting attempt fires failed-attempt, then abort
/// 4. Verify the abort event carries the attempt count and the 401
#[test]
fn test_abort_event_sequence() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));

    let failed = Arc::clone(&events);
    let retried = Arc::clone(&events);
    let exceeded = Arc::clone(&events);
    let aborted = Arc::clone(&events);

    let push = |events: &Arc<Mutex<Vec<String>>>, entry: String| {
        if let Ok(mut events) = events.lock() {
            events.push(entry);
        }
    };

    let config = RetryPolicyConfig::<(), ServiceError>::builder()
        .with_unlimited_retries()
        .abort_on(|failure| failure.code == 401)
        .on_failed_attempt(move |event| push(&failed, format!("failed:{}", event.attempts)))
        .on_retry(move |event| push(&retried, format!("retry:{}", event.attempts)))
        .on_retries_exceeded(move |event| push(&exceeded, format!("exceeded:{}", event.attempts)))
        .on_abort(move |event| {
            let code = event.failure.map(|failure| failure.code);
            push(&aborted, format!("abort:{}:{code:?}", event.attempts));
        })
        .build()
        .expect("valid policy");
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::ZERO, |attempt| {
        Err(ServiceError { code: if attempt < 3 { 503 } else { 401 } })
    });
    assert_eq!(execution.verdict, Verdict::Abort);
    assert_eq!(execution.history.attempts(), 3);

    let events = events.lock().map(|events| events.clone()).unwrap_or_default();
    assert_eq!(
        events,
        vec!["failed:1", "retry:1", "failed:2", "retry:2", "failed:3", "abort:3:Some(401)"]
    );
}

/// Validates that misbehaving callbacks cannot disturb an execution.
///
/// Assertions:
/// - A panicking abort predicate counts as non-matching.
/// - Panicking handlers leave the verdict sequence unchanged.
#[test]
fn test_panicking_callbacks_are_contained() {
    init_tracing();
    let config = RetryPolicyConfig::<(), ServiceError>::builder()
        .abort_on(|_failure| panic!("predicate bug"))
        .on_failed_attempt(|_event| panic!("handler bug"))
        .on_retries_exceeded(|_event| panic!("handler bug"))
        .build()
        .expect("valid policy");
    let clock = MockClock::new();

    let execution = drive(&config, &clock, Duration::ZERO, |_| Err(ServiceError { code: 503 }));

    assert_eq!(execution.verdict, Verdict::RetriesExceeded);
    assert_eq!(execution.history.attempts(), 3);
}

/// Validates evaluating one shared policy from many threads.
///
/// # Test Steps
/// 1. Share one policy with a counting handler across 8 threads
/// 2. Each thread drives its own history to exhaustion
/// 3. Verify every thread saw the same verdicts
/// 4. Confirm the handler counted every failed attempt
#[test]
fn test_policy_shared_across_threads() {
    const THREADS: u32 = 8;

    let failed_attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&failed_attempts);
    let config = RetryPolicyConfig::<u32, ServiceError>::builder()
        .with_delay_range(Duration::from_millis(10), Duration::from_millis(50))
        .and_then(|b| b.with_jitter_factor(0.5))
        .and_then(|b| b.with_max_retries(3))
        .expect("valid policy")
        .on_failed_attempt(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .expect("valid policy");

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                let clock = MockClock::new();
                let execution = drive(&config, &clock, Duration::from_millis(1), |_| {
                    Err(ServiceError { code: 500 })
                });

                assert_eq!(execution.verdict, Verdict::RetriesExceeded);
                assert_eq!(execution.history.attempts(), 4);
                let delays = execution.verdicts.iter().filter(|v| v.is_retry()).map(Verdict::delay);
                for delay in delays {
                    assert!(
                        delay >= Duration::from_millis(5) && delay <= Duration::from_millis(75)
                    );
                }
            });
        }
    });

    assert_eq!(failed_attempts.load(Ordering::SeqCst), THREADS * 4);
}

/// Validates deriving a stricter policy from an existing one.
#[test]
fn test_derived_policy_is_independent() {
    let base = RetryPolicyConfig::<(), ServiceError>::builder()
        .with_max_retries(5)
        .and_then(|b| b.build())
        .expect("valid policy");
    let strict = base
        .to_builder()
        .abort_on(|failure| failure.code == 400)
        .build()
        .expect("valid policy");

    let clock = MockClock::new();
    let execution = drive(&base, &clock, Duration::ZERO, |_| Err(ServiceError { code: 400 }));
    assert_eq!(execution.verdict, Verdict::RetriesExceeded);
    assert_eq!(execution.history.attempts(), 6);

    let execution = drive(&strict, &clock, Duration::ZERO, |_| Err(ServiceError { code: 400 }));
    assert_eq!(execution.verdict, Verdict::Abort);
    assert_eq!(execution.history.attempts(), 1);
}
