//! Retry policy configuration
//!
//! A policy is configured through [`RetryPolicyBuilder`], whose setters
//! validate eagerly, and then frozen into an immutable [`RetryPolicyConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use pulsearc_retry::RetryPolicyConfig;
//!
//! let config = RetryPolicyConfig::<u16, std::io::Error>::builder()
//!     .with_delay_range(Duration::from_millis(50), Duration::from_millis(250))?
//!     .with_jitter_factor(0.1)?
//!     .with_max_duration(Duration::from_secs(30))?
//!     .abort_when(403)
//!     .build()?;
//!
//! assert_eq!(config.max_attempts(), 3);
//! assert!(config.is_abortable(Some(&403), None));
//! # Ok::<(), pulsearc_retry::ConfigError>(())
//! ```

mod abort;
mod builder;
mod config;
mod delay;

pub use abort::AbortCondition;
pub use builder::RetryPolicyBuilder;
pub use config::RetryPolicyConfig;
pub use delay::{DelayStrategy, Jitter};
