//! # Orchestrator
//!
//! Top-level entry point for a collection run. Resolves adapters, runs them through
//! the [`ParallelOrchestrator`], brackets the run with a [`ResourceMonitor`],
//! aggregates successful results off the async runtime and owns the run lifecycle:
//!
//! ```text
//! pending → running → completed | partial_success | failed | cancelled
//! ```
//!
//! In-flight runs live in a registry keyed by run id so `status` and `cancel` can
//! observe them; a run is evicted as soon as its result is final. Concurrent runs
//! share one admission gate sized by `max_parallel_adapters`.

use super::parallel::ParallelOrchestrator;
use super::resources::{ResourceMonitor, ResourceProbe, SystemResourceSampler};
use super::types::{
    AdapterExecutionResult, CollectionTask, OrchestrationResult, OrchestrationSummary,
    RunTracker,
};
use crate::adapters::{AdapterResolver, CollectionRequest, PlatformAdapter};
use crate::aggregation::{AggregatedInventory, ResultAggregator};
use crate::config::InventoryConfig;
use crate::constants::{events, OrchestrationStatus};
use crate::error::{InventoryError, Result};
use crate::logging::log_orchestration_operation;
use crate::resilience::{CircuitBreakerStore, KeyValueStore, ResilientAdapter, ResilientCaller};
use crate::telemetry::{MetricKind, PerformanceDashboard, PerformanceMonitor};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const UNRESOLVED_ADAPTER: &str = "unresolved";

/// Collection run coordinator
pub struct Orchestrator {
    config: InventoryConfig,
    resolver: Arc<dyn AdapterResolver>,
    probe: Arc<dyn ResourceProbe>,
    resilience: Option<Arc<ResilientCaller>>,
    telemetry: Option<Arc<PerformanceMonitor>>,
    aggregator: Arc<ResultAggregator>,
    admission_gate: Arc<Semaphore>,
    cpu_workers: Arc<Semaphore>,
    runs: DashMap<Uuid, Arc<RunTracker>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("active_runs", &self.runs.len())
            .field("resilience", &self.resilience.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(config: InventoryConfig, resolver: Arc<dyn AdapterResolver>) -> Self {
        let aggregator = Arc::new(ResultAggregator::new(config.aggregation.clone()));
        let admission_gate = Arc::new(Semaphore::new(
            config.orchestration.max_parallel_adapters.max(1),
        ));
        let cpu_workers = Arc::new(Semaphore::new(config.orchestration.cpu_workers.max(1)));
        Self {
            config,
            resolver,
            probe: Arc::new(SystemResourceSampler::new()),
            resilience: None,
            telemetry: None,
            aggregator,
            admission_gate,
            cpu_workers,
            runs: DashMap::new(),
        }
    }

    /// Orchestrator with resilience and telemetry built from `config`
    pub fn from_config(config: InventoryConfig, resolver: Arc<dyn AdapterResolver>) -> Self {
        let monitor = Arc::new(PerformanceMonitor::new(config.telemetry.clone()));
        Self::new(config, resolver)
            .with_configured_resilience(None)
            .with_telemetry(monitor)
    }

    /// Replace the process resource probe
    pub fn with_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Route every adapter call through `caller`
    pub fn with_resilience(mut self, caller: Arc<ResilientCaller>) -> Self {
        self.resilience = Some(caller);
        self
    }

    /// Route adapter calls through a caller built from the `[resilience]` section.
    ///
    /// Breaker state stays in-process unless `shared` is given, in which case it is
    /// persisted there with the configured state TTL.
    pub fn with_configured_resilience(self, shared: Option<Arc<dyn KeyValueStore>>) -> Self {
        let breakers = match shared {
            Some(store) => CircuitBreakerStore::with_shared_store(
                store,
                self.config.resilience.breaker_state_ttl(),
            ),
            None => CircuitBreakerStore::in_process(),
        };
        let caller = ResilientCaller::from_config(&self.config.resilience, Arc::new(breakers));
        self.with_resilience(Arc::new(caller))
    }

    pub fn with_telemetry(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.telemetry = Some(monitor);
        self
    }

    pub fn resilience(&self) -> Option<&Arc<ResilientCaller>> {
        self.resilience.as_ref()
    }

    pub fn telemetry(&self) -> Option<&Arc<PerformanceMonitor>> {
        self.telemetry.as_ref()
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Resolve adapters for `requests` (label → request) and run them.
    ///
    /// A request's `platform` selects the adapter; an empty platform falls back to
    /// the label. Labels without an adapter produce failed results.
    pub async fn orchestrate(
        &self,
        requests: HashMap<String, CollectionRequest>,
    ) -> OrchestrationResult {
        let mut labels: Vec<String> = requests.keys().cloned().collect();
        labels.sort();

        let mut tasks = Vec::with_capacity(labels.len());
        let mut unresolved = Vec::new();
        let mut requests = requests;
        for label in labels {
            let Some(mut request) = requests.remove(&label) else {
                continue;
            };
            if request.platform.is_empty() {
                request.platform = label.clone();
            }

            match self.resolver.resolve(&request.platform) {
                Some(adapter) => {
                    let adapter = self.instrument_adapter(adapter, &label);
                    tasks.push(CollectionTask::new(adapter, request, label));
                }
                None => {
                    warn!(target = %label, platform = %request.platform, "No adapter registered for platform");
                    let error = InventoryError::AdapterError(format!(
                        "No adapter registered for platform '{}'",
                        request.platform
                    ));
                    unresolved.push(AdapterExecutionResult::failed(
                        UNRESOLVED_ADAPTER,
                        "",
                        label,
                        error.to_string(),
                    ));
                }
            }
        }

        self.run(tasks, unresolved).await
    }

    /// Run pre-built tasks
    pub async fn orchestrate_tasks(&self, tasks: Vec<CollectionTask>) -> OrchestrationResult {
        self.run(tasks, Vec::new()).await
    }

    fn instrument_adapter(
        &self,
        adapter: Arc<dyn PlatformAdapter>,
        target: &str,
    ) -> Arc<dyn PlatformAdapter> {
        match &self.resilience {
            Some(caller) => {
                let mut wrapped = ResilientAdapter::new(adapter, caller.clone(), target, None);
                if let Some(monitor) = &self.telemetry {
                    wrapped = wrapped.with_telemetry(monitor.clone());
                }
                Arc::new(wrapped)
            }
            None => adapter,
        }
    }

    #[instrument(skip_all, fields(task_count = tasks.len() + settled.len()))]
    async fn run(
        &self,
        tasks: Vec<CollectionTask>,
        settled: Vec<AdapterExecutionResult>,
    ) -> OrchestrationResult {
        let id = Uuid::new_v4();
        let total_adapters = tasks.len() + settled.len();
        let tracker = Arc::new(RunTracker::new(id, total_adapters));
        for result in &settled {
            tracker.record(result);
        }
        self.runs.insert(id, tracker.clone());
        tracker.set_status(OrchestrationStatus::Running);

        log_orchestration_operation(
            events::ORCHESTRATION_STARTED,
            &id.to_string(),
            "running",
            Some(total_adapters),
            None,
        );

        let monitor = ResourceMonitor::start(
            self.probe.clone(),
            self.config.orchestration.resource_sample_interval(),
        );

        let mut parallel =
            ParallelOrchestrator::new(self.config.orchestration.clone(), self.probe.clone())
                .with_gate(self.admission_gate.clone());
        if let Some(telemetry) = &self.telemetry {
            parallel = parallel.with_telemetry(telemetry.clone());
        }

        let mut adapter_results = parallel.execute(tasks, tracker.clone()).await;
        adapter_results.extend(settled);

        let resource_usage = monitor.stop(self.probe.as_ref()).await;
        let aggregated_data = self.aggregate(&adapter_results).await;

        let successful_adapters = adapter_results.iter().filter(|r| r.success()).count();
        let failed_adapters = total_adapters - successful_adapters;
        let status = if tracker.cancel_requested() {
            OrchestrationStatus::Cancelled
        } else {
            OrchestrationStatus::from_counts(successful_adapters, failed_adapters)
        };
        let error_summary = error_summary(&adapter_results, &aggregated_data);

        let result = OrchestrationResult {
            id,
            status,
            start_time: tracker.start_time(),
            end_time: Some(Utc::now()),
            total_adapters,
            successful_adapters,
            failed_adapters,
            total_resources: aggregated_data.total_assets,
            unique_resources: aggregated_data.unique_assets,
            duplicate_resources: aggregated_data.duplicate_count,
            adapter_results,
            aggregated_data,
            resource_usage,
            error_summary,
        };

        tracker.set_status(status);
        self.runs.remove(&id);

        log_orchestration_operation(
            events::ORCHESTRATION_FINISHED,
            &id.to_string(),
            &status.to_string(),
            Some(total_adapters),
            result.error_summary.as_deref(),
        );
        info!(
            orchestration_id = %id,
            status = %status,
            successful = successful_adapters,
            failed = failed_adapters,
            unique_resources = result.unique_resources,
            duration_ms = result.duration_ms(),
            "Orchestration run finished"
        );

        result
    }

    /// Similarity scoring is CPU-bound: run it on the blocking pool, gated by the
    /// configured worker count
    async fn aggregate(&self, results: &[AdapterExecutionResult]) -> AggregatedInventory {
        match self.try_aggregate(results).await {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(error = %e, "Aggregation failed, returning raw platform data");
                AggregatedInventory::degraded(e.to_string(), results)
            }
        }
    }

    async fn try_aggregate(
        &self,
        results: &[AdapterExecutionResult],
    ) -> Result<AggregatedInventory> {
        let permit = self.cpu_workers.clone().acquire_owned().await.map_err(|e| {
            InventoryError::AggregationError(format!("worker pool unavailable: {e}"))
        })?;

        let aggregator = self.aggregator.clone();
        let owned = results.to_vec();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            aggregator.aggregate(&owned)
        })
        .await
        .map_err(|e| InventoryError::AggregationError(e.to_string()))
    }

    /// Live view of a run still in progress
    pub fn status(&self, orchestration_id: Uuid) -> Result<OrchestrationSummary> {
        self.runs
            .get(&orchestration_id)
            .map(|tracker| tracker.summary())
            .ok_or_else(|| InventoryError::OrchestrationNotFound(orchestration_id.to_string()))
    }

    /// Request soft cancellation. Unstarted tasks are skipped and adapters observing
    /// the signal may stop early; calls already running are not interrupted.
    pub fn cancel(&self, orchestration_id: Uuid) -> bool {
        let Some(tracker) = self
            .runs
            .get(&orchestration_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return false;
        };

        if tracker.request_cancel() {
            tracker.set_status(OrchestrationStatus::Cancelled);
            log_orchestration_operation(
                events::ORCHESTRATION_CANCEL_REQUESTED,
                &orchestration_id.to_string(),
                "cancelled",
                None,
                None,
            );
        }
        true
    }

    pub fn active_runs(&self) -> Vec<OrchestrationSummary> {
        let mut runs: Vec<OrchestrationSummary> =
            self.runs.iter().map(|entry| entry.value().summary()).collect();
        runs.sort_by_key(|summary| summary.start_time);
        runs
    }

    pub fn dashboard(&self) -> Option<PerformanceDashboard> {
        self.telemetry.as_ref().map(|monitor| monitor.dashboard())
    }

    /// Forward a metric to the attached monitor, if any
    pub fn record_metric(
        &self,
        kind: MetricKind,
        value: f64,
        unit: &str,
        adapter: &str,
        target: &str,
        operation: &str,
    ) {
        if let Some(monitor) = &self.telemetry {
            monitor.record_metric(kind, value, unit, adapter, target, operation);
        }
    }
}

fn error_summary(
    results: &[AdapterExecutionResult],
    inventory: &AggregatedInventory,
) -> Option<String> {
    let mut parts: Vec<String> = results
        .iter()
        .filter(|r| !r.success())
        .map(|r| {
            format!(
                "{} ({}): {}",
                r.target,
                r.status,
                r.error.as_deref().unwrap_or("unsuccessful response")
            )
        })
        .collect();

    if let Some(error) = &inventory.error {
        parts.push(format!("aggregation: {error}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
