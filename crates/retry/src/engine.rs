//! Retry decision engine
//!
//! [`RetryDecisionEngine`] turns a policy and the history of an execution into
//! a [`Verdict`]. It holds no state: every call reads the immutable
//! [`RetryPolicyConfig`] and the caller-owned [`ExecutionAttemptHistory`], so
//! any number of executions can be evaluated concurrently against one policy.
//!
//! The engine never sleeps or schedules anything. A [`Verdict::Retry`]
//! carries the delay the driver should wait before the next attempt.
//!
//! # Decision order
//!
//! 1. An abort condition matches: [`Verdict::Abort`], regardless of remaining
//!    budget.
//! 2. The attempt is not a failure: [`Verdict::Succeed`].
//! 3. Attempts or duration are exhausted: [`Verdict::RetriesExceeded`].
//! 4. Otherwise: [`Verdict::Retry`] with the computed delay.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::events::{AttemptEvent, CompletionEvent, RetryScheduledEvent};
use crate::history::ExecutionAttemptHistory;
use crate::policy::RetryPolicyConfig;

/// Outcome of evaluating one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The attempt succeeded; stop and return its outcome
    Succeed,
    /// Run another attempt after `delay`
    Retry {
        /// Time to wait before the next attempt, already jittered and clamped
        /// to the remaining max-duration budget
        delay: Duration,
    },
    /// An abort condition matched; stop without retrying
    Abort,
    /// The attempt failed and no retry budget remains
    RetriesExceeded,
}

impl Verdict {
    /// The verdict without its payload
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Succeed => VerdictKind::Succeed,
            Verdict::Retry { .. } => VerdictKind::Retry,
            Verdict::Abort => VerdictKind::Abort,
            Verdict::RetriesExceeded => VerdictKind::RetriesExceeded,
        }
    }

    /// Delay before the next attempt; zero unless the verdict is a retry
    pub fn delay(&self) -> Duration {
        match self {
            Verdict::Retry { delay } => *delay,
            _ => Duration::ZERO,
        }
    }

    /// Whether another attempt should run
    pub fn is_retry(&self) -> bool {
        matches!(self, Verdict::Retry { .. })
    }

    /// Whether the execution ends with this verdict
    pub fn is_terminal(&self) -> bool {
        !self.is_retry()
    }
}

/// Payload-free verdict discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictKind {
    /// See [`Verdict::Succeed`]
    Succeed,
    /// See [`Verdict::Retry`]
    Retry,
    /// See [`Verdict::Abort`]
    Abort,
    /// See [`Verdict::RetriesExceeded`]
    RetriesExceeded,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerdictKind::Succeed => "succeed",
            VerdictKind::Retry => "retry",
            VerdictKind::Abort => "abort",
            VerdictKind::RetriesExceeded => "retries_exceeded",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Retry { delay } => write!(f, "retry after {delay:?}"),
            other => fmt::Display::fmt(&other.kind(), f),
        }
    }
}

/// Stateless retry decision and delay computation
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryDecisionEngine;

impl RetryDecisionEngine {
    /// Evaluate the most recent attempt recorded in `history`
    ///
    /// Abort conditions are evaluated against the attempt's result and
    /// failure. An empty history evaluates to [`Verdict::Succeed`].
    pub fn evaluate<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
    ) -> Verdict {
        Self::evaluate_with_rng(config, history, &mut rand::thread_rng())
    }

    /// [`evaluate`](Self::evaluate) drawing randomness from `rng`
    pub fn evaluate_with_rng<R, E, G>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
        rng: &mut G,
    ) -> Verdict
    where
        G: Rng + ?Sized,
    {
        let is_abortable = history.last_outcome().is_some_and(|outcome| {
            config.is_abortable(outcome.result.as_ref(), outcome.failure.as_ref())
        });
        Self::decide_with_rng(config, history, is_abortable, rng)
    }

    /// Decide with an abort classification computed by the caller
    pub fn decide<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
        is_abortable: bool,
    ) -> Verdict {
        Self::decide_with_rng(config, history, is_abortable, &mut rand::thread_rng())
    }

    /// [`decide`](Self::decide) drawing randomness from `rng`
    pub fn decide_with_rng<R, E, G>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
        is_abortable: bool,
        rng: &mut G,
    ) -> Verdict
    where
        G: Rng + ?Sized,
    {
        let Some(outcome) = history.last_outcome() else {
            return Verdict::Succeed;
        };
        let handlers = &config.handlers;
        let attempt = history.attempts();
        let elapsed_ms = history.elapsed().as_millis() as u64;

        if is_abortable {
            if outcome.is_failure {
                handlers.fire_failed_attempt(&AttemptEvent::from_history(history));
            }
            warn!(attempt, elapsed_ms, "Retry execution aborted by abort condition");
            handlers.fire_abort(&CompletionEvent::from_history(history));
            return Verdict::Abort;
        }

        if !outcome.is_failure {
            debug!(attempt, elapsed_ms, "Attempt succeeded");
            return Verdict::Succeed;
        }

        handlers.fire_failed_attempt(&AttemptEvent::from_history(history));

        if Self::retries_exhausted(config, history) {
            warn!(
                attempt,
                elapsed_ms,
                max_retries = config.max_retries(),
                "Retries exceeded"
            );
            handlers.fire_retries_exceeded(&CompletionEvent::from_history(history));
            return Verdict::RetriesExceeded;
        }

        let delay = Self::compute_delay_with_rng(config, history, rng);
        debug!(
            attempt,
            elapsed_ms,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        handlers.fire_retry_scheduled(&RetryScheduledEvent {
            attempt: AttemptEvent::from_history(history),
            delay,
        });

        Verdict::Retry { delay }
    }

    /// Delay before the retry that follows the most recent attempt
    pub fn compute_delay<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
    ) -> Duration {
        Self::compute_delay_with_rng(config, history, &mut rand::thread_rng())
    }

    /// [`compute_delay`](Self::compute_delay) drawing randomness from `rng`
    ///
    /// The base delay of the strategy is jittered and then clamped so that
    /// the retry never starts after the max duration.
    pub fn compute_delay_with_rng<R, E, G>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
        rng: &mut G,
    ) -> Duration
    where
        G: Rng + ?Sized,
    {
        let base = config.delay.base_delay(history.attempts().max(1), rng);
        let jittered = config.jitter.apply(base, rng);

        match Self::remaining_budget(config, history) {
            Some(remaining) => jittered.min(remaining),
            None => jittered,
        }
    }

    /// Whether no further retry is allowed for `history`
    pub fn retries_exhausted<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
    ) -> bool {
        if !config.allows_retries() {
            return true;
        }
        let attempts_exhausted =
            config.max_retries.is_some_and(|max_retries| history.attempts() > max_retries);
        let duration_exhausted =
            config.max_duration.is_some_and(|max_duration| history.elapsed() >= max_duration);
        attempts_exhausted || duration_exhausted
    }

    /// Time left before the max duration is reached; `None` without a max
    /// duration
    pub fn remaining_budget<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
    ) -> Option<Duration> {
        config.max_duration.map(|max_duration| max_duration.saturating_sub(history.elapsed()))
    }

    /// Fire the retry handler; drivers call this just before running a
    /// retried attempt
    pub fn notify_retry<R, E>(
        config: &RetryPolicyConfig<R, E>,
        history: &ExecutionAttemptHistory<R, E>,
    ) {
        config.handlers.fire_retry(&AttemptEvent::from_history(history));
    }
}
