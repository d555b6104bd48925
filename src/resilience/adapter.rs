//! Resilience decorator for platform adapters.
//!
//! [`ResilientAdapter`] routes collection calls through a shared [`ResilientCaller`]
//! and, when a [`PerformanceMonitor`] is attached, records telemetry immediately
//! before and after each resilient call.

use super::{AdapterFault, AdapterKey, ResilientCaller, RetryPolicy};
use crate::adapters::{
    AdapterMetadata, CancellationSignal, CollectionRequest, CollectionResponse, PlatformAdapter,
};
use crate::telemetry::{MetricKind, PerformanceMonitor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const COLLECT_OPERATION: &str = "collect_data";
const UNSUCCESSFUL_RESPONSE_MESSAGE: &str = "Adapter reported an unsuccessful collection";

/// Adapter wrapper adding retry, circuit breaking and call telemetry
pub struct ResilientAdapter {
    inner: Arc<dyn PlatformAdapter>,
    caller: Arc<ResilientCaller>,
    key: AdapterKey,
    policy: Option<RetryPolicy>,
    monitor: Option<Arc<PerformanceMonitor>>,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for ResilientAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientAdapter")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("telemetry", &self.monitor.is_some())
            .finish()
    }
}

impl ResilientAdapter {
    pub fn new(
        inner: Arc<dyn PlatformAdapter>,
        caller: Arc<ResilientCaller>,
        target: impl Into<String>,
        policy: Option<RetryPolicy>,
    ) -> Self {
        let key = AdapterKey::new(inner.metadata().name.clone(), target);
        Self {
            inner,
            caller,
            key,
            policy,
            monitor: None,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_telemetry(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn adapter_key(&self) -> &AdapterKey {
        &self.key
    }

    pub fn inner(&self) -> &Arc<dyn PlatformAdapter> {
        &self.inner
    }

    fn before_call(&self) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(monitor) = &self.monitor {
            monitor.record_metric(
                MetricKind::Concurrency,
                in_flight as f64,
                "calls",
                &self.key.adapter,
                &self.key.target,
                COLLECT_OPERATION,
            );
        }
    }

    fn after_call(&self, started: Instant, result: &Result<CollectionResponse, AdapterFault>) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(monitor) = &self.monitor {
            let (success, resource_count) = match result {
                Ok(response) => (response.success, response.resource_count),
                Err(_) => (false, 0),
            };
            monitor.record_operation(
                &self.key.adapter,
                &self.key.target,
                COLLECT_OPERATION,
                started.elapsed(),
                success,
                resource_count,
            );
        }
    }

    async fn resilient_collect(
        &self,
        request: CollectionRequest,
        signal: Option<CancellationSignal>,
    ) -> Result<CollectionResponse, AdapterFault> {
        self.before_call();
        let started = Instant::now();

        let result = self
            .caller
            .call(&self.key, self.policy.as_ref(), || {
                let inner = self.inner.clone();
                let request = request.clone();
                let signal = signal.clone();
                async move {
                    let response = match signal {
                        Some(signal) => inner.collect_with_signal(request, signal).await,
                        None => inner.collect_data(request).await,
                    }?;
                    if response.success {
                        Ok(response)
                    } else {
                        Err(unsuccessful_response_fault(response))
                    }
                }
            })
            .await
            .map_err(AdapterFault::from);

        self.after_call(started, &result);
        result
    }
}

#[async_trait]
impl PlatformAdapter for ResilientAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        self.inner.metadata()
    }

    async fn validate_credentials(&self) -> Result<bool, AdapterFault> {
        self.inner.validate_credentials().await
    }

    async fn test_connectivity(&self) -> Result<bool, AdapterFault> {
        self.inner.test_connectivity().await
    }

    async fn collect_data(
        &self,
        request: CollectionRequest,
    ) -> Result<CollectionResponse, AdapterFault> {
        self.resilient_collect(request, None).await
    }

    async fn get_available_resources(&self) -> Result<Vec<String>, AdapterFault> {
        self.inner.get_available_resources().await
    }

    async fn transform_data(
        &self,
        raw_data: serde_json::Value,
    ) -> Result<serde_json::Value, AdapterFault> {
        self.inner.transform_data(raw_data).await
    }

    async fn collect_with_signal(
        &self,
        request: CollectionRequest,
        signal: CancellationSignal,
    ) -> Result<CollectionResponse, AdapterFault> {
        self.resilient_collect(request, Some(signal)).await
    }
}

/// In-band failures are classified like any other fault so they count against the
/// breaker and the retry budget.
fn unsuccessful_response_fault(response: CollectionResponse) -> AdapterFault {
    AdapterFault::Other(
        response
            .error_message
            .unwrap_or_else(|| UNSUCCESSFUL_RESPONSE_MESSAGE.to_string()),
    )
}

/// Wrap `adapter` so collection calls for `target` go through `caller`
pub fn wrap_with_resilience(
    adapter: Arc<dyn PlatformAdapter>,
    caller: Arc<ResilientCaller>,
    target: impl Into<String>,
    policy: Option<RetryPolicy>,
) -> ResilientAdapter {
    ResilientAdapter::new(adapter, caller, target, policy)
}
