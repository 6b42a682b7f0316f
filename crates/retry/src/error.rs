//! Configuration errors for retry policies
//!
//! Every builder call validates its own argument and its consistency with the
//! settings made before it. Violations are reported immediately as a
//! [`ConfigError`] and are never deferred to evaluation time.
//!
//! Two kinds of violation are distinguished:
//!
//! - [`ConfigError::InvalidArgument`]: the value itself is unacceptable
//!   (a zero delay, an inverted range, a backoff factor of 1).
//! - [`ConfigError::InvalidState`]: the value conflicts with something already
//!   configured (a random delay after a fixed delay, a jitter duration after a
//!   jitter factor, a delay that does not fit inside the max duration).

use thiserror::Error;

/// Errors raised while building a retry policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The supplied value is invalid on its own
    #[error("Invalid value for {field}: {message}")]
    InvalidArgument { field: &'static str, message: String },

    /// The supplied value conflicts with the current configuration
    #[error("Invalid retry configuration state: {message}")]
    InvalidState { message: String },

    /// Declarative settings could not be parsed or are incomplete
    #[error("Invalid retry settings: {message}")]
    Settings { message: String },
}

impl ConfigError {
    pub(crate) fn argument(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument { field, message: message.into() }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    #[cfg_attr(not(feature = "settings"), allow(dead_code))]
    pub(crate) fn settings(message: impl Into<String>) -> Self {
        Self::Settings { message: message.into() }
    }

    /// Whether the error rejects a value on its own merits
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Whether the error rejects a value because of earlier configuration
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Name of the offending field, for argument errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
