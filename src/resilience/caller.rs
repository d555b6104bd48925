//! # Resilient Caller
//!
//! Wraps a single adapter operation with circuit breaking and classified retries.
//!
//! ```text
//! try_acquire ──▶ invoke ──▶ Ok ──▶ record_success ──▶ return
//!                   ▲         │
//!                   │        Err ──▶ classify ──▶ history + record_failure
//!                   │                      │
//!                   └──── sleep(backoff) ◀─┴─ retry budget left?  (else MaxRetriesExceeded)
//! ```
//!
//! The breaker is consulted once per call, before the first attempt. Retries inside
//! the loop are not re-admitted, so a breaker that opens mid-call only affects later
//! calls.

use super::{
    AdapterFault, CircuitBreakerStore, ErrorClassifier, ErrorHistory, ErrorKind, ErrorRecord,
    ErrorStatistics, RetryPolicy, RetryStrategy, StandardErrorClassifier,
};
use crate::config::ResilienceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// The only two failures allowed to leave a resilient call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    #[error("Max retries exceeded for {adapter_key} after {attempts} attempt(s) ({kind}): {last_error}")]
    MaxRetriesExceeded {
        adapter_key: String,
        attempts: u32,
        kind: ErrorKind,
        last_error: String,
    },

    #[error("Circuit breaker open for {adapter_key}")]
    CircuitBreakerOpen {
        adapter_key: String,
        next_attempt_time: Option<DateTime<Utc>>,
    },
}

impl ResilienceError {
    pub fn adapter_key(&self) -> &str {
        match self {
            ResilienceError::MaxRetriesExceeded { adapter_key, .. }
            | ResilienceError::CircuitBreakerOpen { adapter_key, .. } => adapter_key,
        }
    }
}

/// Breaker key: one adapter talking to one target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterKey {
    pub adapter: String,
    pub target: String,
}

impl AdapterKey {
    pub fn new(adapter: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for AdapterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.adapter, self.target)
    }
}

/// Retry + circuit breaker wrapper shared by all adapters of a process
pub struct ResilientCaller {
    classifier: Arc<dyn ErrorClassifier>,
    breakers: Arc<CircuitBreakerStore>,
    history: ErrorHistory,
    default_policy: RetryPolicy,
}

impl std::fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("classifier", &self.classifier.classifier_name())
            .field("breakers", &self.breakers)
            .field("default_policy", &self.default_policy)
            .finish()
    }
}

impl Default for ResilientCaller {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ResilientCaller {
    /// Caller with the standard classifier and an in-process breaker store
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self::with_components(
            Arc::new(StandardErrorClassifier::new()),
            Arc::new(CircuitBreakerStore::in_process()),
            default_policy,
            1000,
        )
    }

    pub fn with_components(
        classifier: Arc<dyn ErrorClassifier>,
        breakers: Arc<CircuitBreakerStore>,
        default_policy: RetryPolicy,
        history_size: usize,
    ) -> Self {
        Self {
            classifier,
            breakers,
            history: ErrorHistory::new(history_size),
            default_policy,
        }
    }

    /// Build from the `[resilience]` configuration section
    pub fn from_config(config: &ResilienceConfig, breakers: Arc<CircuitBreakerStore>) -> Self {
        Self::with_components(
            Arc::new(StandardErrorClassifier::new()),
            breakers,
            config.default_policy(),
            config.error_history_size,
        )
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerStore> {
        &self.breakers
    }

    pub fn error_history(&self) -> Vec<ErrorRecord> {
        self.history.records()
    }

    pub fn error_statistics(&self) -> ErrorStatistics {
        self.history.statistics()
    }

    /// Invoke `operation` under the breaker for `key`, retrying classified failures.
    ///
    /// `policy` overrides the default policy for this call only.
    #[instrument(skip(self, policy, operation), fields(adapter_key = %key))]
    pub async fn call<F, Fut, T>(
        &self,
        key: &AdapterKey,
        policy: Option<&RetryPolicy>,
        mut operation: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterFault>>,
    {
        let policy = policy.unwrap_or(&self.default_policy);
        let breaker_key = key.to_string();
        let calculator = policy.backoff_calculator();

        self.breakers
            .try_acquire(&breaker_key, policy.breaker_cooldown)
            .await?;

        let mut attempt: u32 = 0;
        loop {
            let fault = match operation().await {
                Ok(value) => {
                    self.breakers.record_success(&breaker_key).await;
                    if attempt > 0 {
                        debug!(attempt = attempt, "Adapter call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            let pattern = self.classifier.classify(&fault);
            let limit = policy.retry_limit(&pattern);
            let strategy = policy.strategy_for(&pattern);

            self.history.push(ErrorRecord {
                timestamp: Utc::now(),
                kind: pattern.kind,
                severity: pattern.severity,
                message: fault.to_string(),
                adapter: key.adapter.clone(),
                target: key.target.clone(),
                attempt,
                total_retries: limit,
            });

            self.breakers
                .record_failure(
                    &breaker_key,
                    pattern.should_trip_breaker,
                    policy.breaker_threshold,
                    policy.breaker_cooldown,
                )
                .await;

            if attempt >= limit || strategy == RetryStrategy::NoRetry {
                warn!(
                    attempt = attempt,
                    error_kind = %pattern.kind,
                    severity = %pattern.severity,
                    error = %fault,
                    "Adapter call failed - no retries left"
                );
                return Err(ResilienceError::MaxRetriesExceeded {
                    adapter_key: breaker_key,
                    attempts: attempt + 1,
                    kind: pattern.kind,
                    last_error: fault.to_string(),
                });
            }

            let delay = calculator.calculate(
                attempt,
                strategy,
                policy.base_delay_for(&pattern),
                policy.max_delay_for(&pattern),
            );

            warn!(
                attempt = attempt,
                max_retries = limit,
                error_kind = %pattern.kind,
                delay_ms = delay.as_millis() as u64,
                error = %fault,
                "Adapter call failed - retry scheduled"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
