// Constants for retry policy configuration
use std::time::Duration;

/// Default number of retries after the first attempt (3 attempts in total)
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default multiplier between successive exponential backoff delays
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Sentinel accepted and reported for "no limit" on retries or attempts
pub const UNLIMITED: i32 = -1;

/// Delay used when no delay strategy is configured
pub const NO_DELAY: Duration = Duration::ZERO;

/// Smallest allowed jitter factor
pub const MIN_JITTER_FACTOR: f64 = 0.0;

/// Largest allowed jitter factor
pub const MAX_JITTER_FACTOR: f64 = 1.0;
