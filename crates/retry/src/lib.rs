//! Retry decision and delay computation for PulseArc resilience pipelines.
//!
//! This crate decides, after each attempt of an operation, whether the
//! operation should be retried and how long the caller should wait first. It
//! never executes, sleeps or schedules anything itself: an external execution
//! driver runs the attempts, records their outcomes in an
//! [`ExecutionAttemptHistory`] and asks the [`RetryDecisionEngine`] for a
//! [`Verdict`].
//!
//! # Components
//!
//! - [`policy`]: [`RetryPolicyBuilder`] validates every setting as it is made
//!   and produces an immutable [`RetryPolicyConfig`] that can be shared
//!   across concurrent executions.
//! - [`engine`]: stateless verdict and delay computation (fixed, random and
//!   exponential backoff delays, jitter, attempt and duration ceilings).
//! - [`events`]: optional observation callbacks fired while a verdict is
//!   produced. Panicking callbacks are contained and ignored.
//! - [`history`]: the per-execution record owned by the driver.
//! - [`settings`]: declarative (serde/TOML) configuration that goes through
//!   the same validation as the builder.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use pulsearc_retry::{
//!     AttemptOutcome, Clock, ExecutionAttemptHistory, MockClock, RetryDecisionEngine,
//!     RetryPolicyConfig, Verdict,
//! };
//!
//! let config = RetryPolicyConfig::<u32, String>::builder()
//!     .with_backoff(Duration::from_millis(100), Duration::from_secs(1))?
//!     .with_max_retries(3)?
//!     .build()?;
//!
//! let clock = MockClock::new();
//! let mut history = ExecutionAttemptHistory::start(&clock);
//! history.record_attempt(AttemptOutcome::failure("connection reset".to_string()), clock.now());
//!
//! let verdict = RetryDecisionEngine::evaluate(&config, &history);
//! assert_eq!(verdict, Verdict::Retry { delay: Duration::from_millis(100) });
//! # Ok::<(), pulsearc_retry::ConfigError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod clock;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
mod guard;
pub mod history;
pub mod policy;
#[cfg(feature = "settings")]
pub mod settings;

// Re-export commonly used types for convenience
// ------------------------
pub use clock::{Clock, MockClock, SystemClock};
pub use engine::{RetryDecisionEngine, Verdict, VerdictKind};
pub use error::{ConfigError, ConfigResult};
pub use events::{
    AttemptEvent, AttemptHandler, CompletionEvent, CompletionHandler, EventHandlers,
    RetryScheduledEvent, ScheduledHandler,
};
pub use history::{AttemptOutcome, ExecutionAttemptHistory};
pub use policy::{AbortCondition, DelayStrategy, Jitter, RetryPolicyBuilder, RetryPolicyConfig};
#[cfg(feature = "settings")]
pub use settings::RetrySettings;
