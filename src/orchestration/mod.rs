//! # Orchestration Engine
//!
//! Parallel, resource-aware collection across platform adapters.
//!
//! ## Core Components
//!
//! - **Orchestrator**: run lifecycle, run registry, status and cancellation
//! - **ParallelOrchestrator**: admission gate, resource gating and per-task deadlines
//! - **ResourceMonitor / SystemResourceSampler**: process memory, CPU and disk sampling
//! - **RunTracker**: live per-run progress shared between tasks and observers

pub mod orchestrator;
pub mod parallel;
pub mod resources;
pub mod types;

pub use orchestrator::Orchestrator;
pub use parallel::ParallelOrchestrator;
pub use resources::{
    evaluate_admission, AdmissionDecision, ResourceMonitor, ResourceProbe, ResourceSnapshot,
    ResourceUsageSummary, SystemResourceSampler,
};
pub use types::{
    AdapterExecutionResult, CollectionTask, OrchestrationResult, OrchestrationSummary,
    RunTracker,
};
