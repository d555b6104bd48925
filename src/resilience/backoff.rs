//! # Backoff Calculator
//!
//! Computes the sleep between retry attempts.
//!
//! ## Strategies
//!
//! | Strategy       | Raw delay              |
//! |----------------|------------------------|
//! | `Fixed`        | `base`                 |
//! | `Exponential`  | `base * 2^attempt`     |
//! | `Linear`       | `base * (attempt + 1)` |
//! | `RandomJitter` | `base + U(0, base)`    |
//!
//! The raw delay is clamped to `max_delay`, optionally widened by
//! `+/- delay * jitter_range`, and finally kept inside `[100ms, max_delay]`.
//! Attempt numbers are zero-based.

use super::RetryStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound applied to every computed delay
pub const MIN_BACKOFF_DELAY: Duration = Duration::from_millis(100);

/// Exponent ceiling; beyond this the delay is already clamped by any sane max
const MAX_EXPONENT: u32 = 30;

/// Jitter settings for backoff calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffCalculator {
    /// Whether to widen delays with random jitter
    pub jitter: bool,
    /// Fraction of the delay used as the jitter band (0.0 to 1.0)
    pub jitter_range: f64,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self {
            jitter: true,
            jitter_range: 0.1,
        }
    }
}

impl BackoffCalculator {
    pub fn new(jitter: bool, jitter_range: f64) -> Self {
        Self {
            jitter,
            jitter_range: jitter_range.clamp(0.0, 1.0),
        }
    }

    /// Calculator that never adds jitter
    pub fn without_jitter() -> Self {
        Self::new(false, 0.0)
    }

    /// Delay to sleep before retrying after the failure of `attempt`
    pub fn calculate(
        &self,
        attempt: u32,
        strategy: RetryStrategy,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        let ceiling = max_delay.max(MIN_BACKOFF_DELAY);
        let mut delay = Self::raw_delay(attempt, strategy, base_delay).min(max_delay);

        if self.jitter && self.jitter_range > 0.0 {
            let band = delay.as_secs_f64() * self.jitter_range;
            let offset = (fastrand::f64() * 2.0 - 1.0) * band;
            delay = saturating_from_secs_f64(delay.as_secs_f64() + offset);
        }

        delay.clamp(MIN_BACKOFF_DELAY, ceiling)
    }

    fn raw_delay(attempt: u32, strategy: RetryStrategy, base_delay: Duration) -> Duration {
        match strategy {
            RetryStrategy::NoRetry => Duration::ZERO,
            RetryStrategy::Fixed => base_delay,
            RetryStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.min(MAX_EXPONENT));
                base_delay.saturating_mul(factor)
            }
            RetryStrategy::Linear => base_delay.saturating_mul(attempt.saturating_add(1)),
            RetryStrategy::RandomJitter => {
                saturating_from_secs_f64(base_delay.as_secs_f64() * (1.0 + fastrand::f64()))
            }
        }
    }
}

/// Like `Duration::from_secs_f64`, but negative values become zero and overflow
/// saturates at `Duration::MAX`
fn saturating_from_secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_strategy_formulas_without_jitter() {
        let calc = BackoffCalculator::without_jitter();
        let max = Duration::from_secs(3600);

        assert_eq!(calc.calculate(3, RetryStrategy::Fixed, SECOND, max), SECOND);
        assert_eq!(
            calc.calculate(3, RetryStrategy::Exponential, SECOND, max),
            Duration::from_secs(8)
        );
        assert_eq!(
            calc.calculate(3, RetryStrategy::Linear, SECOND, max),
            Duration::from_secs(4)
        );
        assert_eq!(calc.calculate(0, RetryStrategy::Exponential, SECOND, max), SECOND);
    }

    #[test]
    fn test_random_jitter_strategy_stays_within_one_extra_base() {
        let calc = BackoffCalculator::without_jitter();
        for _ in 0..100 {
            let delay = calc.calculate(2, RetryStrategy::RandomJitter, SECOND, Duration::from_secs(60));
            assert!(delay >= SECOND && delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_huge_delays_saturate_instead_of_overflowing() {
        let calc = BackoffCalculator::new(true, 0.5);
        for strategy in [
            RetryStrategy::Fixed,
            RetryStrategy::Exponential,
            RetryStrategy::Linear,
            RetryStrategy::RandomJitter,
        ] {
            let delay = calc.calculate(5, strategy, Duration::MAX, Duration::MAX);
            assert!(delay >= MIN_BACKOFF_DELAY, "{strategy:?} produced {delay:?}");
        }

        let capped = BackoffCalculator::without_jitter().calculate(
            0,
            RetryStrategy::RandomJitter,
            Duration::MAX,
            Duration::from_secs(60),
        );
        assert_eq!(capped, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let calc = BackoffCalculator::new(true, 0.5);
        let max = Duration::from_secs(30);
        for attempt in 0..64 {
            let delay = calc.calculate(attempt, RetryStrategy::Exponential, SECOND, max);
            assert!(delay <= max, "attempt {attempt} produced {delay:?}");
        }
    }

    #[test]
    fn test_floor_applies_to_tiny_delays() {
        let calc = BackoffCalculator::without_jitter();
        let delay = calc.calculate(
            0,
            RetryStrategy::Fixed,
            Duration::from_millis(5),
            Duration::from_secs(1),
        );
        assert_eq!(delay, MIN_BACKOFF_DELAY);
    }

    #[test]
    fn test_jitter_band() {
        let calc = BackoffCalculator::new(true, 0.1);
        for _ in 0..200 {
            let delay = calc.calculate(
                0,
                RetryStrategy::Fixed,
                Duration::from_secs(10),
                Duration::from_secs(60),
            );
            assert!(delay >= Duration::from_secs(9) && delay <= Duration::from_secs(11));
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let calc = BackoffCalculator::without_jitter();
        let max = Duration::from_secs(300);
        assert_eq!(
            calc.calculate(u32::MAX, RetryStrategy::Exponential, SECOND, max),
            max
        );
        assert_eq!(calc.calculate(u32::MAX, RetryStrategy::Linear, SECOND, max), max);
    }
}
