//! # Inventory Core Configuration
//!
//! Typed configuration for the resilience, orchestration, aggregation and telemetry
//! layers. Every section carries production defaults so a partial file (or no file at
//! all) still yields a complete, validated configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use inventory_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_parallel = manager.config().orchestration.max_parallel_adapters;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::resilience::{RetryPolicy, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/inventory-core.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Retry and circuit breaker defaults
    pub resilience: ResilienceConfig,

    /// Parallel collection settings
    pub orchestration: OrchestrationConfig,

    /// Deduplication and correlation settings
    pub aggregation: AggregationConfig,

    /// Performance telemetry thresholds and retention
    pub telemetry: TelemetryConfig,
}

/// Retry policy and circuit breaker defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: RetryStrategy,
    pub jitter: bool,
    /// Fraction of the computed delay used as the +/- jitter band
    pub jitter_range: f64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_seconds: u64,
    /// Capacity of the in-memory error history
    pub error_history_size: usize,
    /// TTL applied to breaker state persisted in a shared store
    pub breaker_state_ttl_seconds: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            strategy: RetryStrategy::Exponential,
            jitter: true,
            jitter_range: 0.1,
            breaker_failure_threshold: 5,
            breaker_cooldown_seconds: 60,
            error_history_size: 1000,
            breaker_state_ttl_seconds: 86_400,
        }
    }
}

impl ResilienceConfig {
    /// Build the default retry policy described by this section
    pub fn default_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            strategy: self.strategy,
            jitter: self.jitter,
            jitter_range: self.jitter_range,
            breaker_threshold: self.breaker_failure_threshold,
            breaker_cooldown: Duration::from_secs(self.breaker_cooldown_seconds),
        }
    }

    pub fn breaker_state_ttl(&self) -> Duration {
        Duration::from_secs(self.breaker_state_ttl_seconds)
    }
}

/// Parallel orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Size of the admission gate
    pub max_parallel_adapters: usize,
    pub task_timeout_seconds: u64,
    /// Worker pool size for CPU-bound aggregation
    pub cpu_workers: usize,
    pub resource_sample_interval_ms: u64,
    pub limits: ResourceLimitsConfig,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_parallel_adapters: 5,
            task_timeout_seconds: 300,
            cpu_workers: 4,
            resource_sample_interval_ms: 1000,
            limits: ResourceLimitsConfig::default(),
        }
    }
}

impl OrchestrationConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds)
    }

    pub fn resource_sample_interval(&self) -> Duration {
        Duration::from_millis(self.resource_sample_interval_ms)
    }
}

/// Resource admission limits checked before each adapter task starts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceLimitsConfig {
    /// Process resident memory ceiling
    pub max_memory_mb: f64,
    /// Process CPU level above which task start is briefly delayed
    pub max_cpu_percent: f64,
    /// Minimum free disk space required to start a task
    pub min_free_disk_gb: f64,
    pub cpu_backoff_ms: u64,
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 2048.0,
            max_cpu_percent: 80.0,
            min_free_disk_gb: 1.0,
            cpu_backoff_ms: 500,
        }
    }
}

impl ResourceLimitsConfig {
    pub fn cpu_backoff(&self) -> Duration {
        Duration::from_millis(self.cpu_backoff_ms)
    }
}

/// Result aggregation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub similarity_threshold: f64,
    pub enable_correlation: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            enable_correlation: true,
        }
    }
}

/// Performance telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub max_samples_per_series: usize,
    pub snapshot_window_seconds: u64,
    pub trend_lookback_hours: u64,
    /// Samples taken from each end of the lookback window for trend comparison
    pub trend_sample_size: usize,
    pub max_latency_ms: f64,
    pub max_error_rate: f64,
    pub min_throughput: f64,
    pub max_recent_alerts: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_samples_per_series: 1000,
            snapshot_window_seconds: 300,
            trend_lookback_hours: 24,
            trend_sample_size: 10,
            max_latency_ms: 5000.0,
            max_error_rate: 0.05,
            min_throughput: 1.0,
            max_recent_alerts: 100,
        }
    }
}

impl TelemetryConfig {
    pub fn snapshot_window(&self) -> Duration {
        Duration::from_secs(self.snapshot_window_seconds)
    }

    pub fn trend_lookback(&self) -> Duration {
        Duration::from_secs(self.trend_lookback_hours * 3600)
    }
}

impl InventoryConfig {
    /// Validate the merged configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let resilience = &self.resilience;
        if resilience.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "resilience.base_delay_ms",
                "0",
                "base delay must be greater than 0",
            ));
        }

        if resilience.max_delay_ms < resilience.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "resilience.max_delay_ms",
                resilience.max_delay_ms.to_string(),
                "max delay must not be smaller than base delay",
            ));
        }

        if !(0.0..=1.0).contains(&resilience.jitter_range) {
            return Err(ConfigurationError::invalid_value(
                "resilience.jitter_range",
                resilience.jitter_range.to_string(),
                "jitter range must be between 0.0 and 1.0",
            ));
        }

        if resilience.breaker_failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "resilience.breaker_failure_threshold",
                "0",
                "breaker threshold must be greater than 0",
            ));
        }

        if resilience.error_history_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "resilience.error_history_size",
                "0",
                "error history must retain at least one record",
            ));
        }

        let orchestration = &self.orchestration;
        if orchestration.max_parallel_adapters == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.max_parallel_adapters",
                "0",
                "at least one adapter must be allowed to run",
            ));
        }

        if orchestration.task_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.task_timeout_seconds",
                "0",
                "task timeout must be greater than 0",
            ));
        }

        if orchestration.cpu_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.cpu_workers",
                "0",
                "cpu worker pool must have at least one worker",
            ));
        }

        if orchestration.limits.max_memory_mb <= 0.0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.limits.max_memory_mb",
                orchestration.limits.max_memory_mb.to_string(),
                "memory limit must be positive",
            ));
        }

        let threshold = self.aggregation.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) || threshold == 0.0 {
            return Err(ConfigurationError::invalid_value(
                "aggregation.similarity_threshold",
                threshold.to_string(),
                "similarity threshold must be in (0.0, 1.0]",
            ));
        }

        let telemetry = &self.telemetry;
        if telemetry.max_samples_per_series == 0 || telemetry.trend_sample_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "telemetry.max_samples_per_series",
                telemetry.max_samples_per_series.to_string(),
                "telemetry series and trend sample sizes must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&telemetry.max_error_rate) {
            return Err(ConfigurationError::invalid_value(
                "telemetry.max_error_rate",
                telemetry.max_error_rate.to_string(),
                "error rate ceiling must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = InventoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestration.max_parallel_adapters, 5);
        assert_eq!(config.aggregation.similarity_threshold, 0.8);
    }

    #[test]
    fn test_default_policy_mirrors_section() {
        let resilience = ResilienceConfig {
            max_retries: 7,
            breaker_cooldown_seconds: 12,
            ..Default::default()
        };
        let policy = resilience.default_policy();
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.breaker_cooldown, Duration::from_secs(12));
        assert_eq!(policy.strategy, RetryStrategy::Exponential);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = InventoryConfig::default();
        config.orchestration.max_parallel_adapters = 0;
        assert!(config.validate().is_err());

        let mut config = InventoryConfig::default();
        config.aggregation.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = InventoryConfig::default();
        config.resilience.max_delay_ms = 10;
        assert!(config.validate().is_err());

        let mut config = InventoryConfig::default();
        config.resilience.breaker_failure_threshold = 0;
        assert!(config.validate().is_err());
    }
}
