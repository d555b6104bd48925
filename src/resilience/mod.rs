//! # Resilience Module
//!
//! Protects every adapter invocation from cascading failure.
//!
//! ## Architecture
//!
//! - **Error Classification**: maps adapter faults onto static handling patterns
//! - **Backoff**: strategy-specific retry delays with jitter and bounds
//! - **Circuit Breakers**: keyed breaker state, optionally shared between processes
//! - **Resilient Caller**: composes the above around one adapter call
//! - **Resilient Adapter**: decorator applying the caller to a `PlatformAdapter`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use inventory_core::resilience::{AdapterFault, AdapterKey, ResilientCaller, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caller = ResilientCaller::new(RetryPolicy::default());
//! let key = AdapterKey::new("aws-collector", "aws");
//!
//! let count = caller
//!     .call(&key, None, || async { Ok::<usize, AdapterFault>(42) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backoff;
pub mod caller;
pub mod circuit_breaker;
pub mod error_classifier;
pub mod history;
pub mod policy;
pub mod store;

pub use adapter::{wrap_with_resilience, ResilientAdapter};
pub use backoff::{BackoffCalculator, MIN_BACKOFF_DELAY};
pub use caller::{AdapterKey, ResilienceError, ResilientCaller};
pub use circuit_breaker::{BreakerSummary, CircuitBreakerState, CircuitBreakerStore, CircuitState};
pub use error_classifier::{
    AdapterFault, ErrorClassifier, ErrorKind, ErrorPattern, ErrorSeverity, FaultType,
    RetryStrategy, StandardErrorClassifier,
};
pub use history::{ErrorHistory, ErrorRecord, ErrorStatistics};
pub use policy::RetryPolicy;
pub use store::{InMemoryKeyValueStore, KeyValueStore, StoreError};
