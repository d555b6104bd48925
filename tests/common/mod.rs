//! Shared fixtures for integration tests: scripted adapters and a fixed resource probe.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use inventory_core::adapters::{
    AdapterMetadata, CancellationSignal, CollectionRequest, CollectionResponse, PlatformAdapter,
};
use inventory_core::orchestration::{ResourceProbe, ResourceSnapshot};
use inventory_core::resilience::AdapterFault;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a [`ScriptedAdapter`] does on each collection call
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return these assets as a successful response
    Assets(Value),
    /// Fail with this fault
    Fault(AdapterFault),
    /// Return a response flagged unsuccessful with this message
    Unsuccessful(String),
    /// Sleep, then return these assets
    Slow(Duration, Value),
    /// Never return
    Hang,
    /// Panic inside the call
    Panic,
    /// Wait for the run's cancellation signal
    AwaitCancel,
}

/// Adapter whose calls follow a script; the last behavior repeats
pub struct ScriptedAdapter {
    metadata: AdapterMetadata,
    script: parking_lot::Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(platform: &str, behavior: Behavior) -> Self {
        Self::scripted(platform, Vec::new(), behavior)
    }

    pub fn scripted(platform: &str, first: Vec<Behavior>, then: Behavior) -> Self {
        Self {
            metadata: AdapterMetadata::new(format!("{platform}-collector"), "1.0.0", platform),
            script: parking_lot::Mutex::new(first.into()),
            fallback: then,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn shared(platform: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self::new(platform, behavior))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn perform(&self, mut signal: CancellationSignal) -> Result<CollectionResponse, AdapterFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let outcome = match behavior {
            Behavior::Assets(assets) => Ok(response(assets)),
            Behavior::Fault(fault) => Err(fault),
            Behavior::Unsuccessful(message) => Ok(CollectionResponse::failure(message)),
            Behavior::Slow(delay, assets) => {
                tokio::time::sleep(delay).await;
                Ok(response(assets))
            }
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("collector crashed"),
            Behavior::AwaitCancel => {
                signal.cancelled().await;
                Err(AdapterFault::Other("collection cancelled".into()))
            }
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

fn response(assets: Value) -> CollectionResponse {
    let count = assets.as_array().map_or(0, Vec::len);
    CollectionResponse::success(assets, count)
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
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
        self.perform(CancellationSignal::never()).await
    }

    async fn get_available_resources(&self) -> Result<Vec<String>, AdapterFault> {
        Ok(vec!["servers".to_string()])
    }

    async fn transform_data(&self, raw_data: Value) -> Result<Value, AdapterFault> {
        Ok(raw_data)
    }

    async fn collect_with_signal(
        &self,
        _request: CollectionRequest,
        signal: CancellationSignal,
    ) -> Result<CollectionResponse, AdapterFault> {
        self.perform(signal).await
    }
}

/// Probe that always reports the same reading
pub struct FixedProbe(pub ResourceSnapshot);

impl FixedProbe {
    pub fn idle() -> Arc<Self> {
        Arc::new(Self(ResourceSnapshot::new(128.0, 2.0, Some(250.0))))
    }
}

#[async_trait]
impl ResourceProbe for FixedProbe {
    async fn sample(&self) -> ResourceSnapshot {
        self.0.clone()
    }
}

/// One asset record per name, each on its own IP
pub fn servers(platform: &str, names: &[&str]) -> Value {
    Value::Array(
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::json!({
                    "name": format!("{platform}-{name}"),
                    "ip_address": format!("10.{}.0.{}", platform.len(), i + 1),
                })
            })
            .collect(),
    )
}
