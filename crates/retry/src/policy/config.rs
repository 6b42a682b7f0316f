//! Immutable, validated retry policy configuration
//!
//! A [`RetryPolicyConfig`] is produced by
//! [`RetryPolicyBuilder::build`](super::RetryPolicyBuilder::build) and never
//! changes afterwards. It holds no per-execution state, so one instance can be
//! evaluated by any number of concurrent executions (share it by reference or
//! through an `Arc`).

use std::fmt;
use std::time::Duration;

use super::abort::AbortCondition;
use super::builder::RetryPolicyBuilder;
use super::delay::{DelayStrategy, Jitter};
use crate::constants::{
    DEFAULT_MAX_RETRIES, MAX_JITTER_FACTOR, MIN_JITTER_FACTOR, NO_DELAY, UNLIMITED,
};
use crate::error::{ConfigError, ConfigResult};
use crate::events::EventHandlers;

/// Validated retry policy
///
/// `R` is the operation's result type and `E` its failure type.
pub struct RetryPolicyConfig<R, E> {
    pub(crate) delay: DelayStrategy,
    pub(crate) jitter: Jitter,
    pub(crate) max_duration: Option<Duration>,
    /// `None` means unlimited
    pub(crate) max_retries: Option<u32>,
    pub(crate) abort_conditions: Vec<AbortCondition<R, E>>,
    pub(crate) handlers: EventHandlers<R, E>,
}

impl<R, E> Default for RetryPolicyConfig<R, E> {
    /// Three attempts, no delay, no jitter, no duration limit
    fn default() -> Self {
        Self {
            delay: DelayStrategy::None,
            jitter: Jitter::None,
            max_duration: None,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            abort_conditions: Vec::new(),
            handlers: EventHandlers::default(),
        }
    }
}

impl<R, E> RetryPolicyConfig<R, E> {
    /// Create a configuration builder
    pub fn builder() -> RetryPolicyBuilder<R, E> {
        RetryPolicyBuilder::new()
    }

    /// Start a new builder from a copy of this configuration
    ///
    /// The abort-condition list is copied; predicates and handlers are shared.
    pub fn to_builder(&self) -> RetryPolicyBuilder<R, E> {
        RetryPolicyBuilder::from_config(self.clone())
    }

    /// Whether the limits allow any retry at all
    pub fn allows_retries(&self) -> bool {
        self.max_retries.map_or(true, |retries| retries > 0)
            && self.max_duration.map_or(true, |duration| !duration.is_zero())
    }

    /// Maximum number of attempts, or `-1` when unlimited
    pub fn max_attempts(&self) -> i32 {
        self.max_retries.map_or(UNLIMITED, |retries| {
            i32::try_from(retries).unwrap_or(i32::MAX).saturating_add(1)
        })
    }

    /// Maximum number of retries after the first attempt, or `-1` when
    /// unlimited
    pub fn max_retries(&self) -> i32 {
        self.max_retries.map_or(UNLIMITED, |retries| i32::try_from(retries).unwrap_or(i32::MAX))
    }

    /// Maximum number of retries, `None` when unlimited
    pub fn retry_limit(&self) -> Option<u32> {
        self.max_retries
    }

    /// The active delay strategy
    pub fn delay_strategy(&self) -> &DelayStrategy {
        &self.delay
    }

    /// Fixed delay or backoff starting delay; zero otherwise
    pub fn delay(&self) -> Duration {
        match self.delay {
            DelayStrategy::Fixed(delay) | DelayStrategy::Backoff { delay, .. } => delay,
            DelayStrategy::None | DelayStrategy::Random { .. } => NO_DELAY,
        }
    }

    /// Lower bound of a random delay
    pub fn delay_min(&self) -> Option<Duration> {
        match self.delay {
            DelayStrategy::Random { min, .. } => Some(min),
            _ => None,
        }
    }

    /// Upper bound of a random delay
    pub fn delay_max(&self) -> Option<Duration> {
        match self.delay {
            DelayStrategy::Random { max, .. } => Some(max),
            _ => None,
        }
    }

    /// Backoff multiplier
    pub fn delay_factor(&self) -> Option<f64> {
        match self.delay {
            DelayStrategy::Backoff { factor, .. } => Some(factor),
            _ => None,
        }
    }

    /// Backoff cap
    pub fn max_delay(&self) -> Option<Duration> {
        match self.delay {
            DelayStrategy::Backoff { max_delay, .. } => Some(max_delay),
            _ => None,
        }
    }

    /// The active jitter mode
    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    /// Jitter duration, if configured
    pub fn jitter_duration(&self) -> Option<Duration> {
        match self.jitter {
            Jitter::Duration(jitter) => Some(jitter),
            _ => None,
        }
    }

    /// Jitter factor, `0.0` if none is configured
    pub fn jitter_factor(&self) -> f64 {
        match self.jitter {
            Jitter::Factor(factor) => factor,
            _ => 0.0,
        }
    }

    /// Wall-clock ceiling on the whole execution
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Number of configured abort conditions
    pub fn abort_condition_count(&self) -> usize {
        self.abort_conditions.len()
    }

    /// Registered event handlers
    pub fn handlers(&self) -> &EventHandlers<R, E> {
        &self.handlers
    }

    /// Whether any abort condition matches `(result, failure)`
    ///
    /// Conditions run in insertion order and evaluation stops at the first
    /// match. A condition that panics counts as not matching.
    pub fn is_abortable(&self, result: Option<&R>, failure: Option<&E>) -> bool {
        self.abort_conditions.iter().any(|condition| condition.matches(result, failure))
    }

    /// Check every invariant of the configuration as a whole
    pub fn validate(&self) -> ConfigResult<()> {
        match self.delay {
            DelayStrategy::None => {}
            DelayStrategy::Fixed(delay) => ensure_positive("delay", delay)?,
            DelayStrategy::Random { min, max } => {
                ensure_positive("delay_min", min)?;
                ensure_positive("delay_max", max)?;
                if min >= max {
                    return Err(ConfigError::argument(
                        "delay_min",
                        "delay_min must be less than delay_max",
                    ));
                }
            }
            DelayStrategy::Backoff { delay, max_delay, factor } => {
                ensure_positive("delay", delay)?;
                if delay >= max_delay {
                    return Err(ConfigError::argument(
                        "delay",
                        "delay must be less than the max_delay",
                    ));
                }
                ensure_backoff_factor(factor)?;
            }
        }

        match self.jitter {
            Jitter::None => {}
            Jitter::Duration(jitter) => {
                ensure_positive("jitter", jitter)?;
                if jitter > self.delay.min_delay() {
                    return Err(ConfigError::state(
                        "jitter must not exceed the minimum configured delay",
                    ));
                }
            }
            Jitter::Factor(factor) => ensure_jitter_factor(factor)?,
        }

        if let Some(max_duration) = self.max_duration {
            if max_duration <= self.delay.duration_bound() {
                return Err(ConfigError::state(format!(
                    "max_duration ({max_duration:?}) must be greater than the {} delay ({:?})",
                    self.delay,
                    self.delay.duration_bound()
                )));
            }
        }

        Ok(())
    }
}

pub(crate) fn ensure_positive(field: &'static str, value: Duration) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::argument(field, format!("{field} must be greater than 0")));
    }
    Ok(())
}

pub(crate) fn ensure_backoff_factor(factor: f64) -> ConfigResult<()> {
    if !factor.is_finite() || factor <= 1.0 {
        return Err(ConfigError::argument(
            "delay_factor",
            format!("delay_factor must be a finite number greater than 1, got {factor}"),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_jitter_factor(factor: f64) -> ConfigResult<()> {
    if !(MIN_JITTER_FACTOR..=MAX_JITTER_FACTOR).contains(&factor) {
        return Err(ConfigError::argument(
            "jitter_factor",
            format!("jitter_factor must be >= 0 and <= 1, got {factor}"),
        ));
    }
    Ok(())
}

impl<R, E> Clone for RetryPolicyConfig<R, E> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            jitter: self.jitter,
            max_duration: self.max_duration,
            max_retries: self.max_retries,
            abort_conditions: self.abort_conditions.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<R, E> fmt::Debug for RetryPolicyConfig<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicyConfig")
            .field("delay", &self.delay)
            .field("jitter", &self.jitter)
            .field("max_duration", &self.max_duration)
            .field("max_retries", &self.max_retries())
            .field("abort_conditions", &self.abort_conditions.len())
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Config = RetryPolicyConfig<u32, String>;

    /// Validates `RetryPolicyConfig::default` values.
    ///
    /// Assertions:
    /// - Two retries, three attempts.
    /// - No delay, no jitter, no duration limit.
    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_retries(), 2);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.delay(), Duration::ZERO);
        assert_eq!(*config.delay_strategy(), DelayStrategy::None);
        assert_eq!(*config.jitter(), Jitter::None);
        assert_eq!(config.jitter_factor(), 0.0);
        assert_eq!(config.max_duration(), None);
        assert!(config.allows_retries());
        assert!(config.validate().is_ok());
    }

    /// Validates `allows_retries` against each limit.
    #[test]
    fn test_allows_retries() {
        let mut config = Config::default();

        config.max_retries = Some(0);
        assert!(!config.allows_retries());
        assert_eq!(config.max_attempts(), 1);

        config.max_retries = None;
        assert!(config.allows_retries());
        assert_eq!(config.max_attempts(), UNLIMITED);
        assert_eq!(config.max_retries(), UNLIMITED);

        config.max_duration = Some(Duration::ZERO);
        assert!(!config.allows_retries());

        config.max_duration = Some(Duration::from_secs(1));
        assert!(config.allows_retries());
    }

    #[test]
    fn test_is_abortable_any_match() {
        let mut config = Config::default();
        assert!(!config.is_abortable(Some(&1), None));

        config.abort_conditions.push(AbortCondition::on_result(|result| *result == 1));
        config
            .abort_conditions
            .push(AbortCondition::on_failure(|failure: &String| failure == "fatal"));

        assert!(config.is_abortable(Some(&1), None));
        assert!(config.is_abortable(None, Some(&"fatal".to_string())));
        assert!(!config.is_abortable(Some(&2), None));
    }

    /// Validates that a panicking condition does not hide later matches.
    #[test]
    fn test_is_abortable_skips_panicking_condition() {
        let mut config = Config::default();
        config
            .abort_conditions
            .push(AbortCondition::new(|_result, _failure| panic!("bad predicate")));
        config.abort_conditions.push(AbortCondition::on_result(|result| *result == 9));

        assert!(config.is_abortable(Some(&9), None));
        assert!(!config.is_abortable(Some(&1), None));
    }

    #[test]
    fn test_validate_rejects_inconsistent_state() {
        let mut config = Config::default();
        config.delay = DelayStrategy::Fixed(Duration::from_secs(1));
        config.max_duration = Some(Duration::from_secs(1));
        assert!(config.validate().unwrap_err().is_invalid_state());

        let mut config = Config::default();
        config.jitter = Jitter::Duration(Duration::from_millis(1));
        assert!(config.validate().unwrap_err().is_invalid_state());

        let mut config = Config::default();
        config.delay = DelayStrategy::Backoff {
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 1.0,
        };
        assert_eq!(config.validate().unwrap_err().field(), Some("delay_factor"));
    }

    #[test]
    fn test_clone_copies_abort_list() {
        let mut config = Config::default();
        config.abort_conditions.push(AbortCondition::on_result(|result| *result == 1));

        let mut copy = config.clone();
        copy.abort_conditions.push(AbortCondition::on_result(|result| *result == 2));

        assert_eq!(config.abort_condition_count(), 1);
        assert_eq!(copy.abort_condition_count(), 2);
    }

    #[test]
    fn test_debug_output() {
        let rendered = format!("{:?}", Config::default());
        assert!(rendered.contains("RetryPolicyConfig"));
        assert!(rendered.contains("max_retries: 2"));
    }
}
