//! # Parallel Orchestrator
//!
//! Runs one collection task per adapter concurrently while bounding the number of
//! in-flight calls and the process resources they may consume.
//!
//! ## Per-task lifecycle
//!
//! 1. Wait for a slot on the admission gate (or for the run to be cancelled)
//! 2. Sample process resources: memory/disk breaches fail the task, high CPU pauses it
//! 3. Call the adapter under the per-task deadline
//! 4. Convert every outcome (success, fault, timeout, panic) into an
//!    [`AdapterExecutionResult`]
//!
//! A task never aborts its siblings, and every task settles before [`execute`]
//! returns.
//!
//! [`execute`]: ParallelOrchestrator::execute

use super::resources::{evaluate_admission, AdmissionDecision, ResourceProbe};
use super::types::{AdapterExecutionResult, CollectionTask, RunTracker};
use crate::config::OrchestrationConfig;
use crate::constants::{events, AdapterExecutionStatus, TASK_TIMEOUT_MESSAGE};
use crate::logging::log_adapter_operation;
use crate::telemetry::PerformanceMonitor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

const TASK_OPERATION: &str = "orchestrated_collection";

/// Bounded-concurrency executor for collection tasks
#[derive(Clone)]
pub struct ParallelOrchestrator {
    config: OrchestrationConfig,
    gate: Arc<Semaphore>,
    probe: Arc<dyn ResourceProbe>,
    telemetry: Option<Arc<PerformanceMonitor>>,
}

impl std::fmt::Debug for ParallelOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelOrchestrator")
            .field("max_parallel_adapters", &self.config.max_parallel_adapters)
            .field("available_slots", &self.gate.available_permits())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl ParallelOrchestrator {
    pub fn new(config: OrchestrationConfig, probe: Arc<dyn ResourceProbe>) -> Self {
        let gate = Arc::new(Semaphore::new(config.max_parallel_adapters.max(1)));
        Self {
            config,
            gate,
            probe,
            telemetry: None,
        }
    }

    /// Admit tasks through `gate` instead of a private one, so several executors
    /// share one concurrency bound
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = gate;
        self
    }

    /// Record timeouts and admission rejections, which never reach the adapter's own
    /// instrumentation
    pub fn with_telemetry(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.telemetry = Some(monitor);
        self
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Free admission slots right now
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// Run every task to a terminal status. Results follow task order.
    #[instrument(skip(self, tasks, tracker), fields(orchestration_id = %tracker.id(), task_count = tasks.len()))]
    pub async fn execute(
        &self,
        tasks: Vec<CollectionTask>,
        tracker: Arc<RunTracker>,
    ) -> Vec<AdapterExecutionResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        debug!(
            max_parallel = self.config.max_parallel_adapters,
            "Starting parallel collection"
        );

        let mut handles = Vec::with_capacity(tasks.len());
        let mut identities = Vec::with_capacity(tasks.len());
        for task in tasks {
            let metadata = task.adapter.metadata();
            identities.push((
                metadata.name.clone(),
                metadata.version.clone(),
                task.target.clone(),
            ));

            let orchestrator = self.clone();
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                let result = orchestrator.run_task(task, &tracker).await;
                tracker.record(&result);
                result
            }));
        }

        let joined = futures::future::join_all(handles).await;

        let results: Vec<AdapterExecutionResult> = joined
            .into_iter()
            .zip(identities)
            .map(|(joined, (name, version, target))| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(adapter = %name, target = %target, error = %e, "Adapter task panicked");
                    let result = AdapterExecutionResult::failed(
                        name,
                        version,
                        target,
                        format!("Adapter task panicked: {e}"),
                    );
                    tracker.record(&result);
                    result
                }
            })
            .collect();

        info!(
            executed = results.len(),
            successful = results.iter().filter(|r| r.success()).count(),
            timed_out = results
                .iter()
                .filter(|r| r.status == AdapterExecutionStatus::Timeout)
                .count(),
            "Parallel collection completed"
        );

        results
    }

    async fn admit(&self, tracker: &RunTracker) -> Option<OwnedSemaphorePermit> {
        let mut signal = tracker.signal();
        tokio::select! {
            biased;
            _ = signal.cancelled() => None,
            permit = self.gate.clone().acquire_owned() => {
                // closed gate means the orchestrator is shutting down
                permit.ok().filter(|_| !tracker.cancel_requested())
            }
        }
    }

    async fn run_task(&self, task: CollectionTask, tracker: &RunTracker) -> AdapterExecutionResult {
        let metadata = task.adapter.metadata().clone();
        let mut result =
            AdapterExecutionResult::pending(&metadata.name, &metadata.version, &task.target);

        let Some(_permit) = self.admit(tracker).await else {
            result.finish(
                AdapterExecutionStatus::Cancelled,
                None,
                Some("Run cancelled before the task started".to_string()),
            );
            log_adapter_operation(
                events::ADAPTER_FINISHED,
                &metadata.name,
                &task.target,
                "cancelled",
                None,
                None,
            );
            return result;
        };

        let snapshot = self.probe.sample().await;
        match evaluate_admission(&snapshot, &self.config.limits) {
            AdmissionDecision::Accept => {}
            AdmissionDecision::Throttle { delay } => {
                debug!(
                    target = %task.target,
                    cpu_percent = snapshot.cpu_percent,
                    delay_ms = delay.as_millis() as u64,
                    "CPU above limit, delaying task start"
                );
                tokio::time::sleep(delay).await;
            }
            AdmissionDecision::Reject { reason } => {
                warn!(
                    adapter = %metadata.name,
                    target = %task.target,
                    memory_mb = snapshot.memory_mb,
                    free_disk_gb = snapshot.free_disk_gb,
                    "Task rejected by resource limits"
                );
                log_adapter_operation(
                    events::ADAPTER_REJECTED,
                    &metadata.name,
                    &task.target,
                    "failed",
                    None,
                    Some(&reason),
                );
                self.record_unreported(&metadata.name, &task.target, Duration::ZERO);
                result.finish(AdapterExecutionStatus::Failed, None, Some(reason));
                return result;
            }
        }

        result.status = AdapterExecutionStatus::Running;
        log_adapter_operation(
            events::ADAPTER_STARTED,
            &metadata.name,
            &task.target,
            "running",
            None,
            None,
        );

        let started = Instant::now();
        let deadline = self.config.task_timeout();
        let call = task
            .adapter
            .collect_with_signal(task.request, tracker.signal());

        match timeout(deadline, call).await {
            Ok(Ok(response)) => {
                let status = if response.success {
                    AdapterExecutionStatus::Completed
                } else {
                    AdapterExecutionStatus::Failed
                };
                result.finish(status, Some(response), None);
            }
            Ok(Err(fault)) => {
                result.finish(AdapterExecutionStatus::Failed, None, Some(fault.to_string()));
            }
            Err(_) => {
                warn!(
                    adapter = %metadata.name,
                    target = %task.target,
                    timeout_seconds = deadline.as_secs(),
                    "Adapter call timed out"
                );
                self.record_unreported(&metadata.name, &task.target, started.elapsed());
                result.finish(
                    AdapterExecutionStatus::Timeout,
                    None,
                    Some(format!("{TASK_TIMEOUT_MESSAGE} ({}s)", deadline.as_secs())),
                );
            }
        }

        log_adapter_operation(
            events::ADAPTER_FINISHED,
            &metadata.name,
            &task.target,
            &result.status.to_string(),
            Some(started.elapsed().as_millis() as u64),
            result.error.as_deref(),
        );

        result
    }

    fn record_unreported(&self, adapter: &str, target: &str, elapsed: Duration) {
        if let Some(monitor) = &self.telemetry {
            monitor.record_operation(adapter, target, TASK_OPERATION, elapsed, false, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterMetadata, CollectionRequest, CollectionResponse, PlatformAdapter};
    use crate::orchestration::resources::ResourceSnapshot;
    use crate::resilience::AdapterFault;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FixedProbe(ResourceSnapshot);

    #[async_trait]
    impl ResourceProbe for FixedProbe {
        async fn sample(&self) -> ResourceSnapshot {
            self.0.clone()
        }
    }

    fn idle_probe() -> Arc<dyn ResourceProbe> {
        Arc::new(FixedProbe(ResourceSnapshot::new(128.0, 1.0, Some(100.0))))
    }

    struct SlowAdapter {
        metadata: AdapterMetadata,
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PlatformAdapter for SlowAdapter {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn validate_credentials(&self) -> Result<bool, AdapterFault> {
            Ok(true)
        }

        async fn test_connectivity(&self) -> Result<bool, AdapterFault> {
            Ok(true)
        }

        async fn collect_data(
            &self,
            _request: CollectionRequest,
        ) -> Result<CollectionResponse, AdapterFault> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(CollectionResponse::success(serde_json::json!([]), 0))
        }

        async fn get_available_resources(&self) -> Result<Vec<String>, AdapterFault> {
            Ok(Vec::new())
        }

        async fn transform_data(
            &self,
            raw_data: serde_json::Value,
        ) -> Result<serde_json::Value, AdapterFault> {
            Ok(raw_data)
        }
    }

    fn slow_tasks(
        count: usize,
        delay: Duration,
    ) -> (Vec<CollectionTask>, Arc<AtomicUsize>) {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks = (0..count)
            .map(|i| {
                let platform = format!("platform-{i}");
                let adapter: Arc<dyn PlatformAdapter> = Arc::new(SlowAdapter {
                    metadata: AdapterMetadata::new(format!("slow-{i}"), "1.0.0", &platform),
                    delay,
                    running: running.clone(),
                    peak: peak.clone(),
                });
                CollectionTask::new(adapter, CollectionRequest::new(&platform), platform)
            })
            .collect();
        (tasks, peak)
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_gate_bounds_concurrency() {
        let config = OrchestrationConfig {
            max_parallel_adapters: 2,
            ..Default::default()
        };
        let orchestrator = ParallelOrchestrator::new(config, idle_probe());
        let (tasks, peak) = slow_tasks(6, Duration::from_millis(100));
        let tracker = Arc::new(RunTracker::new(Uuid::new_v4(), 6));

        let results = orchestrator.execute(tasks, tracker.clone()).await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(AdapterExecutionResult::success));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.summary().completed_adapters, 6);
        assert_eq!(orchestrator.available_slots(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_isolated() {
        let config = OrchestrationConfig {
            task_timeout_seconds: 1,
            ..Default::default()
        };
        let orchestrator = ParallelOrchestrator::new(config, idle_probe());
        let (mut tasks, _) = slow_tasks(1, Duration::from_secs(3600));
        let (fast, _) = slow_tasks(2, Duration::from_millis(10));
        tasks.extend(fast);
        let tracker = Arc::new(RunTracker::new(Uuid::new_v4(), 3));

        let results = orchestrator.execute(tasks, tracker).await;

        assert_eq!(results[0].status, AdapterExecutionStatus::Timeout);
        assert!(results[1].success());
        assert!(results[2].success());
        assert!(results[1].duration_ms().unwrap_or_default() < 1000);
    }

    #[tokio::test]
    async fn test_memory_breach_rejects_without_calling() {
        let probe: Arc<dyn ResourceProbe> =
            Arc::new(FixedProbe(ResourceSnapshot::new(1_000_000.0, 1.0, Some(100.0))));
        let monitor = Arc::new(PerformanceMonitor::default());
        let orchestrator = ParallelOrchestrator::new(OrchestrationConfig::default(), probe)
            .with_telemetry(monitor.clone());
        let (tasks, peak) = slow_tasks(1, Duration::from_millis(1));

        let results = orchestrator
            .execute(tasks, Arc::new(RunTracker::new(Uuid::new_v4(), 1)))
            .await;

        assert_eq!(results[0].status, AdapterExecutionStatus::Failed);
        assert!(results[0]
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with(crate::constants::RESOURCE_LIMITS_EXCEEDED)));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
        assert!(monitor.total_metrics() > 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_unstarted_tasks() {
        let orchestrator =
            ParallelOrchestrator::new(OrchestrationConfig::default(), idle_probe());
        let (tasks, peak) = slow_tasks(3, Duration::from_millis(1));
        let tracker = Arc::new(RunTracker::new(Uuid::new_v4(), 3));
        tracker.request_cancel();

        let results = orchestrator.execute(tasks, tracker).await;

        assert!(results
            .iter()
            .all(|r| r.status == AdapterExecutionStatus::Cancelled));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
    }
}
