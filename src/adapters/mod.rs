//! # Adapter Boundary
//!
//! The collectors themselves (cloud provider and on-premises scanners) live outside
//! this crate. This module defines the only shapes the orchestration layer exchanges
//! with them: an opaque [`CollectionRequest`], an opaque [`CollectionResponse`], the
//! [`PlatformAdapter`] trait, and a resolver used to look adapters up by platform.

use crate::resilience::AdapterFault;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Request handed to an adapter's collection call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    /// Platform the request targets (e.g. "aws", "azure", "on_premises")
    pub platform: String,
    /// Resource types to collect; empty means everything the adapter supports
    pub target_resources: Vec<String>,
    pub configuration: HashMap<String, serde_json::Value>,
    pub credentials: HashMap<String, String>,
}

impl CollectionRequest {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Default::default()
        }
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.target_resources = resources;
        self
    }
}

/// Response returned by an adapter's collection call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub success: bool,
    pub data: serde_json::Value,
    pub resource_count: usize,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub duration_ms: u64,
}

impl CollectionResponse {
    pub fn success(data: serde_json::Value, resource_count: usize) -> Self {
        Self {
            success: true,
            data,
            resource_count,
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Identity of an adapter implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub name: String,
    pub version: String,
    pub platform: String,
}

impl AdapterMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: platform.into(),
        }
    }
}

/// Advisory cancellation signal shared with running adapter calls.
///
/// Cancellation is cooperative: adapters may poll or await the signal, but nothing
/// forces an in-flight call to stop.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Create a signal plus the sender that triggers it
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (sender, receiver) = watch::channel(false);
        (sender, Self { receiver })
    }

    pub fn from_receiver(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_sender, signal) = Self::channel();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation has been requested. Never resolves if the sender is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        while self.receiver.changed().await.is_ok() {
            if *self.receiver.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Interface exposed by every platform collector
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn metadata(&self) -> &AdapterMetadata;

    async fn validate_credentials(&self) -> Result<bool, AdapterFault>;

    async fn test_connectivity(&self) -> Result<bool, AdapterFault>;

    async fn collect_data(
        &self,
        request: CollectionRequest,
    ) -> Result<CollectionResponse, AdapterFault>;

    async fn get_available_resources(&self) -> Result<Vec<String>, AdapterFault>;

    async fn transform_data(
        &self,
        raw_data: serde_json::Value,
    ) -> Result<serde_json::Value, AdapterFault>;

    /// Collection variant that receives the run's cancellation signal. Adapters that
    /// can stop early override this; the default ignores the signal.
    async fn collect_with_signal(
        &self,
        request: CollectionRequest,
        _signal: CancellationSignal,
    ) -> Result<CollectionResponse, AdapterFault> {
        self.collect_data(request).await
    }
}

impl fmt::Debug for dyn PlatformAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.metadata();
        write!(
            f,
            "PlatformAdapter({}@{} for {})",
            metadata.name, metadata.version, metadata.platform
        )
    }
}

/// Looks up the adapter responsible for a platform
pub trait AdapterResolver: Send + Sync {
    fn resolve(&self, platform: &str) -> Option<Arc<dyn PlatformAdapter>>;
}

/// Fixed platform → adapter mapping
#[derive(Default, Clone)]
pub struct StaticAdapterRegistry {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
}

impl StaticAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its metadata platform name
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        let platform = adapter.metadata().platform.clone();
        self.adapters.insert(platform, adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.adapters.keys().cloned().collect();
        platforms.sort();
        platforms
    }
}

impl AdapterResolver for StaticAdapterRegistry {
    fn resolve(&self, platform: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform).cloned()
    }
}
