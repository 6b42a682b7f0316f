//! Delay strategies and jitter
//!
//! A policy has exactly one [`DelayStrategy`] and at most one [`Jitter`] mode.
//! The engine computes a retry delay in three steps: the strategy's base
//! delay, then jitter, then the max-duration ceiling (applied by the engine).

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// How the base delay between attempts is chosen
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DelayStrategy {
    /// Retry immediately
    #[default]
    None,
    /// Same delay before every retry
    Fixed(Duration),
    /// Uniformly random delay in `[min, max]`, drawn fresh for every retry
    Random { min: Duration, max: Duration },
    /// `delay × factor^retries`, capped at `max_delay`
    Backoff { delay: Duration, max_delay: Duration, factor: f64 },
}

impl DelayStrategy {
    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            DelayStrategy::None => "none",
            DelayStrategy::Fixed(_) => "fixed",
            DelayStrategy::Random { .. } => "random",
            DelayStrategy::Backoff { .. } => "backoff",
        }
    }

    /// Smallest delay this strategy can produce before jitter
    pub fn min_delay(&self) -> Duration {
        match *self {
            DelayStrategy::None => Duration::ZERO,
            DelayStrategy::Fixed(delay) => delay,
            DelayStrategy::Random { min, .. } => min,
            DelayStrategy::Backoff { delay, .. } => delay,
        }
    }

    /// Largest configured delay that must fit inside a max duration
    ///
    /// For backoff this is the starting delay: later backoff delays are
    /// clamped to the remaining duration budget instead.
    pub fn duration_bound(&self) -> Duration {
        match *self {
            DelayStrategy::None => Duration::ZERO,
            DelayStrategy::Fixed(delay) => delay,
            DelayStrategy::Random { max, .. } => max,
            DelayStrategy::Backoff { delay, .. } => delay,
        }
    }

    /// Base delay before the retry that follows `attempts` attempts
    ///
    /// The first retry (after attempt 1) uses the unscaled backoff delay.
    pub fn base_delay<G: Rng + ?Sized>(&self, attempts: u32, rng: &mut G) -> Duration {
        match *self {
            DelayStrategy::None => Duration::ZERO,
            DelayStrategy::Fixed(delay) => delay,
            DelayStrategy::Random { min, max } => {
                if min >= max {
                    return min;
                }
                Duration::from_nanos(rng.gen_range(as_nanos(min)..=as_nanos(max)))
            }
            DelayStrategy::Backoff { delay, max_delay, factor } => {
                let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
                let scaled = as_nanos(delay) as f64 * factor.powi(exponent);
                let capped = scaled.min(as_nanos(max_delay) as f64);
                Duration::from_nanos(capped as u64)
            }
        }
    }
}

impl fmt::Display for DelayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Random adjustment applied to the base delay
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Jitter {
    /// No adjustment
    #[default]
    None,
    /// Offset drawn uniformly from `[-jitter, +jitter]`
    Duration(Duration),
    /// Offset drawn uniformly from `[-delay × factor, +delay × factor]`
    Factor(f64),
}

impl Jitter {
    /// Apply jitter to `delay`, never producing a negative delay
    pub fn apply<G: Rng + ?Sized>(&self, delay: Duration, rng: &mut G) -> Duration {
        let amount = match *self {
            Jitter::None => return delay,
            Jitter::Duration(jitter) => as_nanos(jitter) as f64,
            Jitter::Factor(factor) => as_nanos(delay) as f64 * factor,
        };

        if amount <= 0.0 {
            return delay;
        }

        let offset = rng.gen_range(-amount..=amount);
        let jittered = (as_nanos(delay) as f64 + offset).max(0.0);
        Duration::from_nanos(jittered as u64)
    }
}

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
