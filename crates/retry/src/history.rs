//! Per-execution attempt record
//!
//! An [`ExecutionAttemptHistory`] is created by the execution driver when an
//! execution starts and discarded when it ends. The driver records every
//! attempt outcome into it; the decision engine only reads it. Nothing here is
//! shared between executions, so no synchronization is involved.

use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Outcome of a single attempt as seen by the retry policy
///
/// `is_failure` is supplied by the caller's failure classification. A result
/// may be classified as a failure (for example an HTTP 503 response), and a
/// failure may be classified as not worth handling.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome<R, E> {
    /// Value produced by the attempt, if any
    pub result: Option<R>,
    /// Error raised by the attempt, if any
    pub failure: Option<E>,
    /// Whether the attempt counts as a failure for this policy
    pub is_failure: bool,
}

impl<R, E> AttemptOutcome<R, E> {
    /// A successful attempt that produced `result`
    pub fn success(result: R) -> Self {
        Self { result: Some(result), failure: None, is_failure: false }
    }

    /// An attempt that produced `result`, classified as a failure
    pub fn failed_result(result: R) -> Self {
        Self { result: Some(result), failure: None, is_failure: true }
    }

    /// An attempt that raised `failure`
    pub fn failure(failure: E) -> Self {
        Self { result: None, failure: Some(failure), is_failure: true }
    }

    /// Override the failure classification
    #[must_use]
    pub fn classified_as_failure(mut self, is_failure: bool) -> Self {
        self.is_failure = is_failure;
        self
    }
}

impl<R, E> From<Result<R, E>> for AttemptOutcome<R, E> {
    /// `Ok` is a success and `Err` a failure
    fn from(outcome: Result<R, E>) -> Self {
        match outcome {
            Ok(result) => Self::success(result),
            Err(failure) => Self::failure(failure),
        }
    }
}

/// Attempt history for one execution
#[derive(Debug, Clone)]
pub struct ExecutionAttemptHistory<R, E> {
    started_at: Instant,
    attempts: u32,
    elapsed: Duration,
    total_delay: Duration,
    last: Option<AttemptOutcome<R, E>>,
}

impl<R, E> ExecutionAttemptHistory<R, E> {
    /// Create a history for an execution whose first attempt starts at
    /// `started_at`
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            attempts: 0,
            elapsed: Duration::ZERO,
            total_delay: Duration::ZERO,
            last: None,
        }
    }

    /// Create a history starting now according to `clock`
    pub fn start<C: Clock + ?Sized>(clock: &C) -> Self {
        Self::new(clock.now())
    }

    /// Record the outcome of an attempt that completed at `now`
    pub fn record_attempt(&mut self, outcome: AttemptOutcome<R, E>, now: Instant) {
        self.attempts = self.attempts.saturating_add(1);
        self.last = Some(outcome);
        self.refresh_elapsed(now);
    }

    /// Record the delay the driver scheduled before the next attempt
    pub fn record_scheduled_delay(&mut self, delay: Duration) {
        self.total_delay = self.total_delay.saturating_add(delay);
    }

    /// Update the elapsed time without recording an attempt
    pub fn refresh_elapsed(&mut self, now: Instant) {
        self.elapsed = now.saturating_duration_since(self.started_at);
    }

    /// Number of attempts performed so far (1-based once an attempt is
    /// recorded)
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Number of retries performed so far
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Time elapsed since the first attempt started
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Sum of all scheduled delays
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// When the first attempt started
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Outcome of the most recent attempt
    pub fn last_outcome(&self) -> Option<&AttemptOutcome<R, E>> {
        self.last.as_ref()
    }

    /// Result of the most recent attempt
    pub fn last_result(&self) -> Option<&R> {
        self.last.as_ref().and_then(|outcome| outcome.result.as_ref())
    }

    /// Failure of the most recent attempt
    pub fn last_failure(&self) -> Option<&E> {
        self.last.as_ref().and_then(|outcome| outcome.failure.as_ref())
    }

    /// Whether the most recent attempt was classified as a failure
    pub fn last_was_failure(&self) -> bool {
        self.last.as_ref().is_some_and(|outcome| outcome.is_failure)
    }

    /// Consume the history, returning the final outcome
    pub fn into_last_outcome(self) -> Option<AttemptOutcome<R, E>> {
        self.last
    }
}
