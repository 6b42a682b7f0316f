//! Validating builder for [`RetryPolicyConfig`]
//!
//! Every setter checks its argument and its consistency with what has been
//! configured so far, so an invalid combination fails at the call that
//! introduces it. [`RetryPolicyBuilder::build`] re-checks the configuration
//! as a whole before handing out the immutable policy.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::abort::AbortCondition;
use super::config::{
    ensure_backoff_factor, ensure_jitter_factor, ensure_positive, RetryPolicyConfig,
};
use super::delay::{DelayStrategy, Jitter};
use crate::constants::DEFAULT_BACKOFF_FACTOR;
use crate::error::{ConfigError, ConfigResult};
use crate::events::{AttemptEvent, CompletionEvent, RetryScheduledEvent};

/// Builder for [`RetryPolicyConfig`]
pub struct RetryPolicyBuilder<R, E> {
    config: RetryPolicyConfig<R, E>,
}

impl<R, E> Default for RetryPolicyBuilder<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> RetryPolicyBuilder<R, E> {
    /// Start from the default policy: three attempts, no delay
    pub fn new() -> Self {
        Self { config: RetryPolicyConfig::default() }
    }

    pub(crate) fn from_config(config: RetryPolicyConfig<R, E>) -> Self {
        Self { config }
    }

    // ------------------------------------------------------------------
    // Delays
    // ------------------------------------------------------------------

    /// Wait a fixed `delay` between attempts
    pub fn with_delay(mut self, delay: Duration) -> ConfigResult<Self> {
        ensure_positive("delay", delay)?;
        self.ensure_fits_max_duration("delay", delay)?;
        match self.config.delay {
            DelayStrategy::Random { .. } => {
                return Err(ConfigError::state("Random delays have already been set"));
            }
            DelayStrategy::Backoff { .. } => {
                return Err(ConfigError::state("Backoff delays have already been set"));
            }
            DelayStrategy::None | DelayStrategy::Fixed(_) => {}
        }
        self.ensure_jitter_fits("delay", delay)?;

        self.config.delay = DelayStrategy::Fixed(delay);
        Ok(self)
    }

    /// Wait a uniformly random delay in `[min, max]` between attempts
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> ConfigResult<Self> {
        ensure_positive("delay_min", min)?;
        ensure_positive("delay_max", max)?;
        if min >= max {
            return Err(ConfigError::argument("delay_min", "delay_min must be less than delay_max"));
        }
        self.ensure_fits_max_duration("delay_max", max)?;
        match self.config.delay {
            DelayStrategy::Fixed(_) => {
                return Err(ConfigError::state("Delays have already been set"));
            }
            DelayStrategy::Backoff { .. } => {
                return Err(ConfigError::state("Backoff delays have already been set"));
            }
            DelayStrategy::None | DelayStrategy::Random { .. } => {}
        }
        self.ensure_jitter_fits("delay_min", min)?;

        self.config.delay = DelayStrategy::Random { min, max };
        Ok(self)
    }

    /// Exponential backoff doubling from `delay` up to `max_delay`
    pub fn with_backoff(self, delay: Duration, max_delay: Duration) -> ConfigResult<Self> {
        self.with_backoff_factor(delay, max_delay, DEFAULT_BACKOFF_FACTOR)
    }

    /// Exponential backoff multiplying by `factor` from `delay` up to
    /// `max_delay`
    pub fn with_backoff_factor(
        mut self,
        delay: Duration,
        max_delay: Duration,
        factor: f64,
    ) -> ConfigResult<Self> {
        ensure_positive("delay", delay)?;
        self.ensure_fits_max_duration("delay", delay)?;
        if delay >= max_delay {
            return Err(ConfigError::argument("delay", "delay must be less than the max_delay"));
        }
        ensure_backoff_factor(factor)?;
        match self.config.delay {
            DelayStrategy::Fixed(_) => {
                return Err(ConfigError::state("Delays have already been set"));
            }
            DelayStrategy::Random { .. } => {
                return Err(ConfigError::state("Random delays have already been set"));
            }
            DelayStrategy::None | DelayStrategy::Backoff { .. } => {}
        }
        self.ensure_jitter_fits("delay", delay)?;

        self.config.delay = DelayStrategy::Backoff { delay, max_delay, factor };
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Jitter
    // ------------------------------------------------------------------

    /// Randomly adjust every delay by up to `jitter` in either direction
    pub fn with_jitter(mut self, jitter: Duration) -> ConfigResult<Self> {
        ensure_positive("jitter", jitter)?;
        if matches!(self.config.jitter, Jitter::Factor(_)) {
            return Err(ConfigError::state("A jitter factor has already been set"));
        }
        let min_delay = self.config.delay.min_delay();
        if jitter > min_delay {
            return Err(ConfigError::state(format!(
                "jitter ({jitter:?}) must be less than or equal to the minimum delay \
                 ({min_delay:?})"
            )));
        }

        self.config.jitter = Jitter::Duration(jitter);
        Ok(self)
    }

    /// Randomly adjust every delay by up to `delay × factor` in either
    /// direction
    ///
    /// A factor of `0.0` disables jitter.
    pub fn with_jitter_factor(mut self, factor: f64) -> ConfigResult<Self> {
        ensure_jitter_factor(factor)?;
        if matches!(self.config.jitter, Jitter::Duration(_)) {
            return Err(ConfigError::state("A jitter duration has already been set"));
        }

        self.config.jitter = if factor == 0.0 { Jitter::None } else { Jitter::Factor(factor) };
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Limits
    // ------------------------------------------------------------------

    /// Stop retrying once `max_duration` has elapsed since the first attempt
    /// started
    pub fn with_max_duration(mut self, max_duration: Duration) -> ConfigResult<Self> {
        let bound = self.config.delay.duration_bound();
        if max_duration <= bound {
            if bound.is_zero() {
                return Err(ConfigError::argument(
                    "max_duration",
                    "max_duration must be greater than 0",
                ));
            }
            return Err(ConfigError::state(format!(
                "max_duration ({max_duration:?}) must be greater than the {} delay ({bound:?})",
                self.config.delay
            )));
        }

        self.config.max_duration = Some(max_duration);
        Ok(self)
    }

    /// Allow `max_retries` retries after the first attempt; `-1` means
    /// unlimited and `0` means a single attempt
    pub fn with_max_retries(mut self, max_retries: i32) -> ConfigResult<Self> {
        self.config.max_retries = match max_retries {
            -1 => None,
            retries => Some(u32::try_from(retries).map_err(|_| {
                ConfigError::argument(
                    "max_retries",
                    format!("max_retries must be greater than or equal to -1, got {retries}"),
                )
            })?),
        };
        Ok(self)
    }

    /// Allow `max_attempts` attempts in total; `-1` means unlimited
    pub fn with_max_attempts(self, max_attempts: i32) -> ConfigResult<Self> {
        match max_attempts {
            0 => Err(ConfigError::argument("max_attempts", "max_attempts cannot be 0")),
            -1 => self.with_max_retries(-1),
            attempts if attempts < -1 => Err(ConfigError::argument(
                "max_attempts",
                format!("max_attempts cannot be less than -1, got {attempts}"),
            )),
            attempts => self.with_max_retries(attempts - 1),
        }
    }

    /// Retry without an attempt limit
    pub fn with_unlimited_retries(mut self) -> Self {
        self.config.max_retries = None;
        self
    }

    // ------------------------------------------------------------------
    // Abort conditions
    // ------------------------------------------------------------------

    /// Abort when `predicate` matches the attempt's result and failure
    pub fn abort_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Option<&R>, Option<&E>) -> bool + Send + Sync + 'static,
    {
        self.config.abort_conditions.push(AbortCondition::new(predicate));
        self
    }

    /// Abort when `predicate` matches the attempt's result
    ///
    /// Not consulted for attempts that failed with an error.
    pub fn abort_if_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.config.abort_conditions.push(AbortCondition::on_result(predicate));
        self
    }

    /// Abort when `predicate` matches the attempt's failure
    pub fn abort_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.config.abort_conditions.push(AbortCondition::on_failure(predicate));
        self
    }

    /// Abort when the attempt's result equals `value`
    pub fn abort_when(mut self, value: R) -> Self
    where
        R: PartialEq + Send + Sync + 'static,
    {
        self.config.abort_conditions.push(AbortCondition::result_equals(value));
        self
    }

    /// Add a prepared abort condition
    pub fn abort_condition(mut self, condition: AbortCondition<R, E>) -> Self {
        self.config.abort_conditions.push(condition);
        self
    }

    // ------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------

    /// Called after every failed attempt
    pub fn on_failed_attempt<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AttemptEvent<'_, R, E>) + Send + Sync + 'static,
    {
        self.config.handlers.failed_attempt = Some(Arc::new(handler));
        self
    }

    /// Called by the driver just before a retried attempt runs
    pub fn on_retry<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AttemptEvent<'_, R, E>) + Send + Sync + 'static,
    {
        self.config.handlers.retry = Some(Arc::new(handler));
        self
    }

    /// Called when a retry is scheduled, with the delay before it
    pub fn on_retry_scheduled<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RetryScheduledEvent<'_, R, E>) + Send + Sync + 'static,
    {
        self.config.handlers.retry_scheduled = Some(Arc::new(handler));
        self
    }

    /// Called when attempts or the max duration are exhausted
    pub fn on_retries_exceeded<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CompletionEvent<'_, R, E>) + Send + Sync + 'static,
    {
        self.config.handlers.retries_exceeded = Some(Arc::new(handler));
        self
    }

    /// Called when an abort condition matches
    pub fn on_abort<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CompletionEvent<'_, R, E>) + Send + Sync + 'static,
    {
        self.config.handlers.abort = Some(Arc::new(handler));
        self
    }

    /// Validate the whole configuration and produce the immutable policy
    pub fn build(self) -> ConfigResult<RetryPolicyConfig<R, E>> {
        self.config.validate()?;

        debug!(
            delay = %self.config.delay,
            max_retries = self.config.max_retries(),
            max_duration_ms = self.config.max_duration.map(|d| d.as_millis() as u64),
            abort_conditions = self.config.abort_conditions.len(),
            "Built retry policy"
        );

        Ok(self.config)
    }

    fn ensure_fits_max_duration(&self, field: &'static str, delay: Duration) -> ConfigResult<()> {
        match self.config.max_duration {
            Some(max_duration) if delay >= max_duration => Err(ConfigError::state(format!(
                "{field} ({delay:?}) must be less than the max_duration ({max_duration:?})"
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_jitter_fits(&self, field: &'static str, min_delay: Duration) -> ConfigResult<()> {
        match self.config.jitter {
            Jitter::Duration(jitter) if jitter > min_delay => Err(ConfigError::state(format!(
                "{field} ({min_delay:?}) must not be less than the configured jitter ({jitter:?})"
            ))),
            _ => Ok(()),
        }
    }
}

impl<R, E> RetryPolicyBuilder<R, E>
where
    E: AsRef<dyn Error + Send + Sync + 'static>,
{
    /// Abort when the failure's error is a `T`
    pub fn abort_on_error<T>(mut self) -> Self
    where
        T: Error + 'static,
    {
        self.config.abort_conditions.push(AbortCondition::on_error_type::<T>());
        self
    }
}

impl<R, E> std::fmt::Debug for RetryPolicyBuilder<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicyBuilder").field("config", &self.config).finish()
    }
}
