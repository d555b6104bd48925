//! # Circuit Breaker Store
//!
//! Keyed circuit breaker state for every `adapter:target` pair. Three operational
//! modes are derived from the stored state: Closed (normal operation), Open (failing
//! fast until `next_attempt_time`) and Half-Open (one trial call after the cooldown).
//!
//! State lives in an optional shared [`KeyValueStore`] so several worker processes
//! observe the same breakers, with an in-process map as fallback whenever the shared
//! store is absent or failing. Updates are read-modify-write without compare-and-swap:
//! concurrent writers to the same key race and the last write wins.

use super::{KeyValueStore, ResilienceError, StoreError};
use crate::logging::log_breaker_transition;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STORE_KEY_PREFIX: &str = "circuit_breaker:";

/// Operational mode derived from a [`CircuitBreakerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - one trial call allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Persisted breaker state for one key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub is_open: bool,
    pub half_open: bool,
    pub failure_count: u32,
    pub consecutive_successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub next_attempt_time: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    pub fn circuit_state(&self) -> CircuitState {
        match (self.is_open, self.half_open) {
            (true, true) => CircuitState::HalfOpen,
            (true, false) => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_time.map_or(true, |next| now >= next)
    }
}

/// Counts of breakers per mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerSummary {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    /// Fraction of breakers not open (1.0 with no breakers)
    pub health_score: f64,
}

/// Keyed breaker state with shared-store persistence and local fallback
pub struct CircuitBreakerStore {
    shared: Option<Arc<dyn KeyValueStore>>,
    local: DashMap<String, CircuitBreakerState>,
    known_keys: DashSet<String>,
    state_ttl: Duration,
}

impl std::fmt::Debug for CircuitBreakerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerStore")
            .field("shared", &self.shared.is_some())
            .field("local_entries", &self.local.len())
            .field("state_ttl", &self.state_ttl)
            .finish()
    }
}

impl Default for CircuitBreakerStore {
    fn default() -> Self {
        Self::in_process()
    }
}

impl CircuitBreakerStore {
    /// Store backed only by the in-process map
    pub fn in_process() -> Self {
        Self {
            shared: None,
            local: DashMap::new(),
            known_keys: DashSet::new(),
            state_ttl: Duration::from_secs(86_400),
        }
    }

    /// Store that persists state in a shared key-value store
    pub fn with_shared_store(store: Arc<dyn KeyValueStore>, state_ttl: Duration) -> Self {
        Self {
            shared: Some(store),
            state_ttl,
            ..Self::in_process()
        }
    }

    pub fn has_shared_store(&self) -> bool {
        self.shared.is_some()
    }

    /// Current state for a key; unseen keys are closed
    pub async fn load(&self, key: &str) -> CircuitBreakerState {
        if let Some(shared) = &self.shared {
            match Self::load_shared(shared.as_ref(), key).await {
                Ok(Some(state)) => return state,
                Ok(None) => return CircuitBreakerState::default(),
                Err(e) => {
                    warn!(
                        adapter_key = %key,
                        error = %e,
                        "Shared breaker store read failed - using in-process state"
                    );
                }
            }
        }

        self.local
            .get(key)
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    async fn load_shared(
        shared: &dyn KeyValueStore,
        key: &str,
    ) -> Result<Option<CircuitBreakerState>, StoreError> {
        let raw = shared.get(&format!("{STORE_KEY_PREFIX}{key}")).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    /// Persist state for a key
    pub async fn save(&self, key: &str, state: &CircuitBreakerState) {
        self.known_keys.insert(key.to_string());

        if let Some(shared) = &self.shared {
            let written = match serde_json::to_string(state) {
                Ok(json) => {
                    shared
                        .set_with_ttl(&format!("{STORE_KEY_PREFIX}{key}"), json, self.state_ttl)
                        .await
                }
                Err(e) => Err(StoreError::from(e)),
            };
            match written {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        adapter_key = %key,
                        error = %e,
                        "Shared breaker store write failed - keeping in-process state"
                    );
                }
            }
        }

        self.local.insert(key.to_string(), state.clone());
    }

    /// Admission check performed once before a resilient call
    pub async fn try_acquire(&self, key: &str, cooldown: Duration) -> Result<(), ResilienceError> {
        self.try_acquire_at(key, cooldown, Utc::now()).await
    }

    /// Admission check against an explicit clock reading.
    ///
    /// Once the cooldown has elapsed the breaker moves to half-open and grants a trial
    /// lease that lasts one further cooldown; other callers are rejected until the
    /// trial resolves or the lease runs out.
    pub async fn try_acquire_at(
        &self,
        key: &str,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), ResilienceError> {
        let mut state = self.load(key).await;
        if !state.is_open {
            return Ok(());
        }

        if !state.cooldown_elapsed(now) {
            debug!(adapter_key = %key, "Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitBreakerOpen {
                adapter_key: key.to_string(),
                next_attempt_time: state.next_attempt_time,
            });
        }

        let previous = state.circuit_state();
        state.half_open = true;
        state.next_attempt_time = Some(deadline_after(now, cooldown));
        self.save(key, &state).await;

        if previous != CircuitState::HalfOpen {
            log_breaker_transition(key, &previous.to_string(), "half_open", state.failure_count);
        }
        info!(adapter_key = %key, "Circuit breaker half-open - allowing trial call");
        Ok(())
    }

    /// Record a successful call; always clears the failure streak
    pub async fn record_success(&self, key: &str) {
        let mut state = self.load(key).await;
        let previous = state.circuit_state();

        state.consecutive_successes = state.consecutive_successes.saturating_add(1);
        state.failure_count = 0;
        if state.is_open || state.half_open {
            state.is_open = false;
            state.half_open = false;
            state.next_attempt_time = None;
            log_breaker_transition(key, &previous.to_string(), "closed", 0);
        }

        self.save(key, &state).await;
    }

    /// Record a failed call
    pub async fn record_failure(
        &self,
        key: &str,
        should_trip: bool,
        threshold: u32,
        cooldown: Duration,
    ) -> CircuitBreakerState {
        self.record_failure_at(key, should_trip, threshold, cooldown, Utc::now())
            .await
    }

    /// Record a failed call observed at `now`.
    ///
    /// Only tripping failures count towards the threshold. Reaching it opens the breaker
    /// with `next_attempt_time = now + cooldown`.
    pub async fn record_failure_at(
        &self,
        key: &str,
        should_trip: bool,
        threshold: u32,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> CircuitBreakerState {
        let mut state = self.load(key).await;
        let previous = state.circuit_state();

        state.consecutive_successes = 0;
        state.last_failure_time = Some(now);

        if should_trip {
            state.failure_count = state.failure_count.saturating_add(1);
            if state.failure_count >= threshold.max(1) {
                state.is_open = true;
                state.half_open = false;
                state.next_attempt_time = Some(deadline_after(now, cooldown));

                if previous != CircuitState::Open {
                    log_breaker_transition(key, &previous.to_string(), "open", state.failure_count);
                }
            }
        }

        self.save(key, &state).await;
        state
    }

    /// Snapshot of one breaker, if it has ever been used
    pub async fn breaker_state(&self, key: &str) -> Option<CircuitBreakerState> {
        if !self.known_keys.contains(key) {
            return None;
        }
        Some(self.load(key).await)
    }

    /// Force a breaker back to closed
    pub async fn reset_breaker(&self, key: &str) {
        info!(adapter_key = %key, "Circuit breaker manually reset");
        self.save(key, &CircuitBreakerState::default()).await;
    }

    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.known_keys.iter().map(|k| k.clone()).collect();
        keys.sort();
        keys
    }

    /// Counts of breakers by mode plus an overall health score
    pub async fn breaker_summary(&self) -> BreakerSummary {
        let mut summary = BreakerSummary::default();
        for key in self.known_keys() {
            summary.total += 1;
            match self.load(&key).await.circuit_state() {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
        }

        summary.health_score = if summary.total == 0 {
            1.0
        } else {
            (summary.total - summary.open) as f64 / summary.total as f64
        };
        summary
    }
}

fn deadline_after(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(cooldown)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
