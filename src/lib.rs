#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Inventory Core
//!
//! Resilience and orchestration layer for a multi-platform infrastructure inventory
//! collector.
//!
//! ## Overview
//!
//! Platform adapters (cloud providers, on-premises scanners) are independent,
//! unreliable and rate limited. This crate turns many concurrent, partially failing
//! adapter calls into one consistent, deduplicated inventory.
//!
//! ## Module Organization
//!
//! - [`adapters`] - Adapter trait and the opaque request/response shapes
//! - [`resilience`] - Error classification, backoff, circuit breakers and the resilient caller
//! - [`orchestration`] - Parallel collection runs with admission and resource gating
//! - [`aggregation`] - Asset deduplication and cross-platform correlation
//! - [`telemetry`] - Performance metrics, trends and tuning recommendations
//! - [`config`] - Layered configuration
//! - [`error`] - Crate error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inventory_core::adapters::{CollectionRequest, StaticAdapterRegistry};
//! use inventory_core::config::InventoryConfig;
//! use inventory_core::orchestration::Orchestrator;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = StaticAdapterRegistry::new();
//! let orchestrator = Orchestrator::from_config(InventoryConfig::default(), Arc::new(registry));
//!
//! let mut requests = HashMap::new();
//! requests.insert("aws".to_string(), CollectionRequest::new("aws"));
//!
//! let result = orchestrator.orchestrate(requests).await;
//! println!("{} unique assets", result.unique_resources);
//! # }
//! ```

pub mod adapters;
pub mod aggregation;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod resilience;
pub mod telemetry;

pub use adapters::{
    AdapterMetadata, AdapterResolver, CancellationSignal, CollectionRequest, CollectionResponse,
    PlatformAdapter, StaticAdapterRegistry,
};
pub use aggregation::{AggregatedInventory, ResultAggregator, UnifiedAsset};
pub use config::{ConfigManager, InventoryConfig};
pub use constants::{AdapterExecutionStatus, OrchestrationStatus};
pub use error::{InventoryError, Result};
pub use orchestration::{AdapterExecutionResult, OrchestrationResult, Orchestrator};
pub use resilience::{
    wrap_with_resilience, AdapterFault, CircuitBreakerStore, ResilienceError, ResilientAdapter,
    ResilientCaller, RetryPolicy,
};
pub use telemetry::{PerformanceDashboard, PerformanceMonitor};
