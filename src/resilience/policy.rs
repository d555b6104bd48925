//! Retry policy applied by the resilient caller.

use super::{BackoffCalculator, ErrorKind, ErrorPattern, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and circuit breaker settings for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Strategy for faults classified as unknown. Classified faults always use
    /// their pattern's strategy.
    pub strategy: RetryStrategy,
    pub jitter: bool,
    pub jitter_range: f64,
    /// Tripping failures needed to open the breaker
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::Exponential,
            jitter: true,
            jitter_range: 0.1,
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Retries allowed for a failure matching `pattern`
    pub fn retry_limit(&self, pattern: &ErrorPattern) -> u32 {
        self.max_retries.min(pattern.max_retries)
    }

    /// Strategy for a failure matching `pattern`.
    ///
    /// Unknown failures follow the policy strategy rather than the unknown pattern's
    /// table entry, so callers can tune how unclassified faults back off. Classified
    /// failures follow their pattern.
    pub fn strategy_for(&self, pattern: &ErrorPattern) -> RetryStrategy {
        if pattern.kind == ErrorKind::Unknown {
            self.strategy
        } else {
            pattern.retry_strategy
        }
    }

    pub fn base_delay_for(&self, pattern: &ErrorPattern) -> Duration {
        pattern.base_delay.unwrap_or(self.base_delay)
    }

    pub fn max_delay_for(&self, pattern: &ErrorPattern) -> Duration {
        pattern.max_delay.unwrap_or(self.max_delay)
    }

    pub fn backoff_calculator(&self) -> BackoffCalculator {
        BackoffCalculator::new(self.jitter, self.jitter_range)
    }

    /// Policy with no jitter and the given retry budget; handy for deterministic callers
    pub fn deterministic(max_retries: u32) -> Self {
        Self {
            max_retries,
            jitter: false,
            jitter_range: 0.0,
            ..Default::default()
        }
    }
}
