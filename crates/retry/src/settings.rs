//! Declarative retry settings
//!
//! [`RetrySettings`] is the serde form of a retry policy, meant to be embedded
//! in service configuration files. Durations are expressed in milliseconds.
//! Settings are turned into a policy through the same validating builder
//! setters as programmatic configuration, so both paths reject exactly the
//! same combinations.
//!
//! ```toml
//! max_retries = 5
//! delay_ms = 200
//! backoff_max_delay_ms = 5000
//! jitter_factor = 0.2
//! max_duration_ms = 30000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES};
use crate::error::{ConfigError, ConfigResult};
use crate::policy::{DelayStrategy, Jitter, RetryPolicyBuilder, RetryPolicyConfig};

/// Serde helpers for optional durations stored as milliseconds
pub mod option_duration_millis {
    use std::time::Duration;

    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize an optional Duration as milliseconds (u64)
    ///
    /// Durations with sub-millisecond precision are rejected instead of being
    /// truncated.
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => {
                let millis = super::whole_millis(*duration).map_err(S::Error::custom)?;
                serializer.serialize_some(&millis)
            }
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Milliseconds in `duration`, or an error if it is not a whole number of
/// milliseconds
fn whole_millis(duration: Duration) -> Result<u64, String> {
    if duration.subsec_nanos() % 1_000_000 != 0 {
        return Err(format!("{duration:?} cannot be expressed in whole milliseconds"));
    }
    u64::try_from(duration.as_millis()).map_err(|_| format!("{duration:?} is too large"))
}

fn ensure_whole_millis(field: &str, duration: Option<Duration>) -> ConfigResult<()> {
    match duration.map(whole_millis) {
        Some(Err(reason)) => Err(ConfigError::settings(format!("{field}: {reason}"))),
        _ => Ok(()),
    }
}

/// Retry policy settings as found in configuration files
///
/// Absent fields keep the policy defaults. Unknown fields are rejected so a
/// misspelled key does not silently fall back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retries after the first attempt; `-1` for unlimited
    pub max_retries: i32,

    /// Fixed delay, or the starting delay when `backoff_max_delay_ms` is set
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<Duration>,

    /// Lower bound of a random delay; requires `delay_max_ms`
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub delay_min_ms: Option<Duration>,

    /// Upper bound of a random delay; requires `delay_min_ms`
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub delay_max_ms: Option<Duration>,

    /// Backoff cap; turns `delay_ms` into an exponential backoff
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub backoff_max_delay_ms: Option<Duration>,

    /// Backoff multiplier, 2 when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,

    /// Jitter added to or removed from every delay
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<Duration>,

    /// Jitter as a fraction of every delay, in `[0, 1]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_factor: Option<f64>,

    /// Wall-clock ceiling on the whole execution
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<Duration>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES as i32,
            delay_ms: None,
            delay_min_ms: None,
            delay_max_ms: None,
            backoff_max_delay_ms: None,
            backoff_factor: None,
            jitter_ms: None,
            jitter_factor: None,
            max_duration_ms: None,
        }
    }
}

impl RetrySettings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        toml::from_str(source).map_err(|err| ConfigError::settings(err.to_string()))
    }

    /// Render the settings as a TOML document
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string(self).map_err(|err| ConfigError::settings(err.to_string()))
    }

    /// Apply the settings to a fresh builder
    ///
    /// Limits are applied first, then the delay mode, then jitter, so every
    /// value is validated against the ones it depends on.
    pub fn into_builder<R, E>(self) -> ConfigResult<RetryPolicyBuilder<R, E>> {
        let mut builder = RetryPolicyBuilder::new().with_max_retries(self.max_retries)?;

        if let Some(max_duration) = self.max_duration_ms {
            builder = builder.with_max_duration(max_duration)?;
        }

        builder = match (self.delay_ms, self.backoff_max_delay_ms) {
            (Some(delay), Some(max_delay)) => builder.with_backoff_factor(
                delay,
                max_delay,
                self.backoff_factor.unwrap_or(DEFAULT_BACKOFF_FACTOR),
            )?,
            (Some(delay), None) => {
                if self.backoff_factor.is_some() {
                    return Err(ConfigError::settings(
                        "backoff_factor requires backoff_max_delay_ms",
                    ));
                }
                builder.with_delay(delay)?
            }
            (None, Some(_)) => {
                return Err(ConfigError::settings("backoff_max_delay_ms requires delay_ms"));
            }
            (None, None) => {
                if self.backoff_factor.is_some() {
                    return Err(ConfigError::settings("backoff_factor requires delay_ms"));
                }
                builder
            }
        };

        builder = match (self.delay_min_ms, self.delay_max_ms) {
            (Some(min), Some(max)) => builder.with_delay_range(min, max)?,
            (None, None) => builder,
            _ => {
                return Err(ConfigError::settings(
                    "delay_min_ms and delay_max_ms must be set together",
                ));
            }
        };

        if let Some(jitter) = self.jitter_ms {
            builder = builder.with_jitter(jitter)?;
        }
        if let Some(factor) = self.jitter_factor {
            builder = builder.with_jitter_factor(factor)?;
        }

        Ok(builder)
    }

    /// Build a policy with no abort conditions or handlers
    pub fn build<R, E>(self) -> ConfigResult<RetryPolicyConfig<R, E>> {
        self.into_builder()?.build()
    }
}

impl<R, E> TryFrom<&RetryPolicyConfig<R, E>> for RetrySettings {
    type Error = ConfigError;

    /// Capture the declarative part of a policy; predicates and handlers are
    /// not representable and are dropped
    ///
    /// Fails if a duration has sub-millisecond precision, since the settings
    /// form could not rebuild the same policy.
    fn try_from(config: &RetryPolicyConfig<R, E>) -> ConfigResult<Self> {
        let mut settings = Self { max_retries: config.max_retries(), ..Self::default() };

        match *config.delay_strategy() {
            DelayStrategy::None => {}
            DelayStrategy::Fixed(delay) => settings.delay_ms = Some(delay),
            DelayStrategy::Random { min, max } => {
                settings.delay_min_ms = Some(min);
                settings.delay_max_ms = Some(max);
            }
            DelayStrategy::Backoff { delay, max_delay, factor } => {
                settings.delay_ms = Some(delay);
                settings.backoff_max_delay_ms = Some(max_delay);
                settings.backoff_factor = Some(factor);
            }
        }

        match *config.jitter() {
            Jitter::None => {}
            Jitter::Duration(jitter) => settings.jitter_ms = Some(jitter),
            Jitter::Factor(factor) => settings.jitter_factor = Some(factor),
        }

        settings.max_duration_ms = config.max_duration();

        ensure_whole_millis("delay_ms", settings.delay_ms)?;
        ensure_whole_millis("delay_min_ms", settings.delay_min_ms)?;
        ensure_whole_millis("delay_max_ms", settings.delay_max_ms)?;
        ensure_whole_millis("backoff_max_delay_ms", settings.backoff_max_delay_ms)?;
        ensure_whole_millis("jitter_ms", settings.jitter_ms)?;
        ensure_whole_millis("max_duration_ms", settings.max_duration_ms)?;

        Ok(settings)
    }
}
