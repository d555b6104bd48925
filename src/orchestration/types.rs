//! Orchestration data model: tasks, per-adapter results, run results and live run
//! tracking.

use super::resources::ResourceUsageSummary;
use crate::adapters::{CollectionRequest, CollectionResponse, PlatformAdapter};
use crate::aggregation::AggregatedInventory;
use crate::constants::{AdapterExecutionStatus, OrchestrationStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// One adapter invocation scheduled within a run
#[derive(Clone)]
pub struct CollectionTask {
    pub adapter: Arc<dyn PlatformAdapter>,
    pub request: CollectionRequest,
    /// Label identifying the task within the run (usually the platform name)
    pub target: String,
}

impl CollectionTask {
    pub fn new(
        adapter: Arc<dyn PlatformAdapter>,
        request: CollectionRequest,
        target: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            request,
            target: target.into(),
        }
    }
}

impl std::fmt::Debug for CollectionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTask")
            .field("adapter", &self.adapter)
            .field("target", &self.target)
            .field("platform", &self.request.platform)
            .finish()
    }
}

/// Outcome of one collection task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterExecutionResult {
    pub adapter_name: String,
    pub adapter_version: String,
    pub target: String,
    pub status: AdapterExecutionStatus,
    pub response: Option<CollectionResponse>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub resource_count: usize,
}

impl AdapterExecutionResult {
    pub fn pending(
        adapter_name: impl Into<String>,
        adapter_version: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            adapter_version: adapter_version.into(),
            target: target.into(),
            status: AdapterExecutionStatus::Pending,
            response: None,
            error: None,
            start_time: Utc::now(),
            end_time: None,
            resource_count: 0,
        }
    }

    /// Result for a task that never produced a response
    pub fn failed(
        adapter_name: impl Into<String>,
        adapter_version: impl Into<String>,
        target: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::pending(adapter_name, adapter_version, target);
        result.finish(AdapterExecutionStatus::Failed, None, Some(error.into()));
        result
    }

    /// Settle the result with its terminal status
    pub fn finish(
        &mut self,
        status: AdapterExecutionStatus,
        response: Option<CollectionResponse>,
        error: Option<String>,
    ) {
        self.resource_count = response.as_ref().map_or(0, |r| r.resource_count);
        self.error = error.or_else(|| {
            response
                .as_ref()
                .filter(|r| !r.success)
                .and_then(|r| r.error_message.clone())
        });
        self.response = response;
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    /// Completed with a successful response
    pub fn success(&self) -> bool {
        self.status == AdapterExecutionStatus::Completed
            && self.response.as_ref().is_some_and(|r| r.success)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

/// Final record of an orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub id: Uuid,
    pub status: OrchestrationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub adapter_results: Vec<AdapterExecutionResult>,
    pub total_adapters: usize,
    pub successful_adapters: usize,
    pub failed_adapters: usize,
    pub total_resources: usize,
    pub unique_resources: usize,
    pub duplicate_resources: usize,
    pub aggregated_data: AggregatedInventory,
    pub resource_usage: ResourceUsageSummary,
    pub error_summary: Option<String>,
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        self.status == OrchestrationStatus::Completed
    }

    pub fn result_for(&self, target: &str) -> Option<&AdapterExecutionResult> {
        self.adapter_results.iter().find(|r| r.target == target)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

/// Status view of a run still in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationSummary {
    pub id: Uuid,
    pub status: OrchestrationStatus,
    pub start_time: DateTime<Utc>,
    pub total_adapters: usize,
    pub completed_adapters: usize,
    pub successful_adapters: usize,
    pub failed_adapters: usize,
    pub cancel_requested: bool,
}

/// Live progress of one run, shared between the registry and its tasks
#[derive(Debug)]
pub struct RunTracker {
    id: Uuid,
    start_time: DateTime<Utc>,
    total_adapters: usize,
    status: Mutex<OrchestrationStatus>,
    completed: AtomicUsize,
    successful: AtomicUsize,
    failed: AtomicUsize,
    cancel: watch::Sender<bool>,
}

impl RunTracker {
    pub fn new(id: Uuid, total_adapters: usize) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            id,
            start_time: Utc::now(),
            total_adapters,
            status: Mutex::new(OrchestrationStatus::Pending),
            completed: AtomicUsize::new(0),
            successful: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn status(&self) -> OrchestrationStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: OrchestrationStatus) {
        *self.status.lock() = status;
    }

    /// Count a settled task
    pub fn record(&self, result: &AdapterExecutionResult) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if result.success() {
            self.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Signal handed to adapters; fires once cancellation is requested
    pub fn signal(&self) -> crate::adapters::CancellationSignal {
        crate::adapters::CancellationSignal::from_receiver(self.cancel.subscribe())
    }

    /// Request cooperative cancellation; returns false if already requested
    pub fn request_cancel(&self) -> bool {
        let newly = !*self.cancel.borrow();
        self.cancel.send_replace(true);
        newly
    }

    pub fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn summary(&self) -> OrchestrationSummary {
        OrchestrationSummary {
            id: self.id,
            status: self.status(),
            start_time: self.start_time,
            total_adapters: self.total_adapters,
            completed_adapters: self.completed.load(Ordering::SeqCst),
            successful_adapters: self.successful.load(Ordering::SeqCst),
            failed_adapters: self.failed.load(Ordering::SeqCst),
            cancel_requested: self.cancel_requested(),
        }
    }
}
