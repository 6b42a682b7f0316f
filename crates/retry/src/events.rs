//! Retry event callbacks
//!
//! A retry policy exposes five optional, independent observation points:
//!
//! - `on_failed_attempt` ([`AttemptEvent`]): fired by the engine for every
//!   failing attempt, before the verdict event.
//! - `on_retry_scheduled` ([`RetryScheduledEvent`]): fired by the engine when
//!   a retry is scheduled; carries the delay.
//! - `on_retry` ([`AttemptEvent`]): fired by the driver through
//!   [`RetryDecisionEngine::notify_retry`](crate::RetryDecisionEngine::notify_retry)
//!   just before the retried attempt runs.
//! - `on_retries_exceeded` ([`CompletionEvent`]): fired by the engine when
//!   attempts or duration are exhausted.
//! - `on_abort` ([`CompletionEvent`]): fired by the engine when an abort
//!   condition matches.
//!
//! Handlers are observation-only. They run synchronously inside the
//! evaluation call, and a panicking handler is logged and ignored so it can
//! never change a verdict or unwind into the driver. Registering a handler
//! for a slot replaces any previous handler for that slot.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::guard;
use crate::history::ExecutionAttemptHistory;

/// Context passed to attempt-level handlers
#[derive(Debug)]
pub struct AttemptEvent<'a, R, E> {
    /// Number of attempts performed so far
    pub attempts: u32,
    /// Time elapsed since the first attempt started
    pub elapsed: Duration,
    /// Result of the most recent attempt
    pub last_result: Option<&'a R>,
    /// Failure of the most recent attempt
    pub last_failure: Option<&'a E>,
}

impl<'a, R, E> AttemptEvent<'a, R, E> {
    pub(crate) fn from_history(history: &'a ExecutionAttemptHistory<R, E>) -> Self {
        Self {
            attempts: history.attempts(),
            elapsed: history.elapsed(),
            last_result: history.last_result(),
            last_failure: history.last_failure(),
        }
    }
}

/// Context passed to the retry-scheduled handler
#[derive(Debug)]
pub struct RetryScheduledEvent<'a, R, E> {
    /// The failed attempt that caused the retry
    pub attempt: AttemptEvent<'a, R, E>,
    /// Delay before the retried attempt
    pub delay: Duration,
}

/// Context passed to completion handlers (aborted or retries exceeded)
#[derive(Debug)]
pub struct CompletionEvent<'a, R, E> {
    /// Total attempts performed by the execution
    pub attempts: u32,
    /// Total time elapsed since the first attempt started
    pub elapsed: Duration,
    /// Final result, if any
    pub result: Option<&'a R>,
    /// Final failure, if any
    pub failure: Option<&'a E>,
}

impl<'a, R, E> CompletionEvent<'a, R, E> {
    pub(crate) fn from_history(history: &'a ExecutionAttemptHistory<R, E>) -> Self {
        Self {
            attempts: history.attempts(),
            elapsed: history.elapsed(),
            result: history.last_result(),
            failure: history.last_failure(),
        }
    }
}

/// Handler for attempt-level events
pub type AttemptHandler<R, E> = Arc<dyn Fn(&AttemptEvent<'_, R, E>) + Send + Sync>;

/// Handler for retry-scheduled events
pub type ScheduledHandler<R, E> = Arc<dyn Fn(&RetryScheduledEvent<'_, R, E>) + Send + Sync>;

/// Handler for completion events
pub type CompletionHandler<R, E> = Arc<dyn Fn(&CompletionEvent<'_, R, E>) + Send + Sync>;

/// The five optional handler slots of a retry policy
pub struct EventHandlers<R, E> {
    pub(crate) failed_attempt: Option<AttemptHandler<R, E>>,
    pub(crate) retry: Option<AttemptHandler<R, E>>,
    pub(crate) retry_scheduled: Option<ScheduledHandler<R, E>>,
    pub(crate) retries_exceeded: Option<CompletionHandler<R, E>>,
    pub(crate) abort: Option<CompletionHandler<R, E>>,
}

impl<R, E> EventHandlers<R, E> {
    /// Whether no handler is registered in any slot
    pub fn is_empty(&self) -> bool {
        self.failed_attempt.is_none()
            && self.retry.is_none()
            && self.retry_scheduled.is_none()
            && self.retries_exceeded.is_none()
            && self.abort.is_none()
    }

    pub(crate) fn fire_failed_attempt(&self, event: &AttemptEvent<'_, R, E>) {
        if let Some(handler) = &self.failed_attempt {
            guard::contained("on_failed_attempt", || handler(event));
        }
    }

    pub(crate) fn fire_retry(&self, event: &AttemptEvent<'_, R, E>) {
        if let Some(handler) = &self.retry {
            guard::contained("on_retry", || handler(event));
        }
    }

    pub(crate) fn fire_retry_scheduled(&self, event: &RetryScheduledEvent<'_, R, E>) {
        if let Some(handler) = &self.retry_scheduled {
            guard::contained("on_retry_scheduled", || handler(event));
        }
    }

    pub(crate) fn fire_retries_exceeded(&self, event: &CompletionEvent<'_, R, E>) {
        if let Some(handler) = &self.retries_exceeded {
            guard::contained("on_retries_exceeded", || handler(event));
        }
    }

    pub(crate) fn fire_abort(&self, event: &CompletionEvent<'_, R, E>) {
        if let Some(handler) = &self.abort {
            guard::contained("on_abort", || handler(event));
        }
    }
}

impl<R, E> Default for EventHandlers<R, E> {
    fn default() -> Self {
        Self {
            failed_attempt: None,
            retry: None,
            retry_scheduled: None,
            retries_exceeded: None,
            abort: None,
        }
    }
}

// Handlers are shared, not deep-copied.
impl<R, E> Clone for EventHandlers<R, E> {
    fn clone(&self) -> Self {
        Self {
            failed_attempt: self.failed_attempt.clone(),
            retry: self.retry.clone(),
            retry_scheduled: self.retry_scheduled.clone(),
            retries_exceeded: self.retries_exceeded.clone(),
            abort: self.abort.clone(),
        }
    }
}

impl<R, E> fmt::Debug for EventHandlers<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_failed_attempt", &self.failed_attempt.is_some())
            .field("on_retry", &self.retry.is_some())
            .field("on_retry_scheduled", &self.retry_scheduled.is_some())
            .field("on_retries_exceeded", &self.retries_exceeded.is_some())
            .field("on_abort", &self.abort.is_some())
            .finish()
    }
}
