//! Shipped configuration file and components built from it.

mod common;

use common::{servers, Behavior, FixedProbe, ScriptedAdapter};
use inventory_core::adapters::{CollectionRequest, StaticAdapterRegistry};
use inventory_core::config::ConfigManager;
use inventory_core::orchestration::Orchestrator;
use inventory_core::resilience::{InMemoryKeyValueStore, RetryStrategy};
use inventory_core::telemetry::PerformanceMonitor;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const SHIPPED_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/inventory-core.toml");

#[test]
fn test_shipped_config_matches_defaults() -> anyhow::Result<()> {
    let manager =
        ConfigManager::load_with_environment(Path::new(SHIPPED_CONFIG), Some(HashMap::new()))?;
    let config = manager.config();

    assert!(manager.source_path().is_some());
    assert_eq!(config.resilience.strategy, RetryStrategy::Exponential);
    assert_eq!(config.resilience.breaker_failure_threshold, 5);
    assert_eq!(config.orchestration.limits.cpu_backoff_ms, 500);
    assert_eq!(config.telemetry.trend_sample_size, 10);
    Ok(())
}

#[test]
fn test_components_built_from_loaded_config() -> anyhow::Result<()> {
    let manager =
        ConfigManager::load_with_environment(Path::new(SHIPPED_CONFIG), Some(HashMap::new()))?;
    let config = manager.config().clone();

    let shared = Arc::new(InMemoryKeyValueStore::new());
    let monitor = Arc::new(PerformanceMonitor::new(config.telemetry.clone()));

    let registry = StaticAdapterRegistry::new()
        .with_adapter(ScriptedAdapter::shared("aws", Behavior::Assets(servers("aws", &["a"]))));
    let orchestrator = Orchestrator::new(config, Arc::new(registry))
        .with_probe(FixedProbe::idle())
        .with_configured_resilience(Some(shared.clone()))
        .with_telemetry(monitor);

    let requests = HashMap::from([("aws".to_string(), CollectionRequest::new("aws"))]);
    let result = tokio_test::block_on(orchestrator.orchestrate(requests));

    assert!(result.is_success());
    let caller = orchestrator.resilience().expect("resilience configured");
    assert_eq!(caller.breakers().known_keys(), vec!["aws-collector:aws".to_string()]);
    assert_eq!(shared.len(), 1);
    Ok(())
}
