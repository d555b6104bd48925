//! # Result Aggregator
//!
//! Merges the asset lists returned by successful adapters into one deduplicated
//! inventory and reports cross-platform correlations.
//!
//! ## Pipeline
//!
//! 1. **Extract**: pull asset records out of each successful response payload
//! 2. **Group**: seed a group with the first ungrouped asset and pull in every later
//!    ungrouped asset whose similarity to the seed reaches the threshold
//! 3. **Merge**: one [`UnifiedAsset`] per group, the rest recorded as duplicates
//! 4. **Correlate**: shared IPs and shared `(service, port)` across platforms
//!
//! Output depends only on the input order of results and assets.

use super::similarity::{similarity_score, AssetIdentity};
use crate::config::AggregationConfig;
use crate::constants::correlation_types;
use crate::orchestration::AdapterExecutionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

const CONFIDENCE_PER_SOURCE: f64 = 0.25;

/// Asset record as reported by one adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAsset {
    pub platform: String,
    pub adapter: String,
    /// Collection key the asset was found under, when the payload was keyed by type
    pub resource_type: Option<String>,
    pub identity: AssetIdentity,
    pub payload: Value,
}

/// One real-world resource, possibly reported by several platforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAsset {
    pub id: String,
    /// Platform of every merged source, in first-seen order
    pub merged_from_platforms: Vec<String>,
    pub identity: AssetIdentity,
    pub resource_type: Option<String>,
    /// Fields of the first source
    pub attributes: Value,
    /// Raw payloads per platform
    pub platform_data: BTreeMap<String, Vec<Value>>,
    pub merge_confidence: f64,
    pub source_asset_count: usize,
}

impl UnifiedAsset {
    /// Platforms without repeats
    pub fn platforms(&self) -> BTreeSet<&str> {
        self.merged_from_platforms.iter().map(String::as_str).collect()
    }

    pub fn primary_platform(&self) -> &str {
        self.merged_from_platforms
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// A source asset folded into a unified asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub unified_asset_id: String,
    pub platform: String,
    pub adapter: String,
    pub identity: AssetIdentity,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub correlation_type: String,
    /// Shared value: the IP address, or `service:port`
    pub key: String,
    pub platforms: Vec<String>,
    pub asset_ids: Vec<String>,
}

/// Dependency entry reported by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub platform: String,
    pub source: Option<String>,
    pub target: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformSummary {
    pub adapter: String,
    pub asset_count: usize,
    pub reported_resource_count: usize,
}

/// Unified inventory produced from one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedInventory {
    pub assets: Vec<UnifiedAsset>,
    pub dependencies: Vec<DependencyRecord>,
    pub duplicates: Vec<DuplicateRecord>,
    pub correlations: Vec<Correlation>,
    pub platform_summary: BTreeMap<String, PlatformSummary>,
    pub raw_platform_data: BTreeMap<String, Value>,
    pub total_assets: usize,
    pub unique_assets: usize,
    pub duplicate_count: usize,
    /// Set when aggregation could not complete; the other fields are best effort
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregatedInventory {
    /// Best-effort payload carrying the raw per-adapter data and the failure reason
    pub fn degraded(error: impl Into<String>, results: &[AdapterExecutionResult]) -> Self {
        Self {
            raw_platform_data: raw_platform_data(results),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Unified assets reported by `platform`
    pub fn assets_for(&self, platform: &str) -> Vec<&UnifiedAsset> {
        self.assets
            .iter()
            .filter(|asset| asset.merged_from_platforms.iter().any(|p| p == platform))
            .collect()
    }
}

fn raw_platform_data(results: &[AdapterExecutionResult]) -> BTreeMap<String, Value> {
    results
        .iter()
        .filter(|result| result.success())
        .filter_map(|result| {
            result
                .response
                .as_ref()
                .map(|response| (result.target.clone(), response.data.clone()))
        })
        .collect()
}

/// Deduplicating, correlating aggregator
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    config: AggregationConfig,
}

impl ResultAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.config.similarity_threshold
    }

    /// Aggregate successful results; failed and timed-out results are ignored
    pub fn aggregate(&self, results: &[AdapterExecutionResult]) -> AggregatedInventory {
        let mut inventory = AggregatedInventory {
            raw_platform_data: raw_platform_data(results),
            ..Default::default()
        };

        let mut sources = Vec::new();
        for result in results.iter().filter(|r| r.success()) {
            let Some(response) = result.response.as_ref() else {
                continue;
            };

            let extracted = extract_assets(&result.target, &result.adapter_name, &response.data);
            inventory.platform_summary.insert(
                result.target.clone(),
                PlatformSummary {
                    adapter: result.adapter_name.clone(),
                    asset_count: extracted.len(),
                    reported_resource_count: response.resource_count,
                },
            );
            inventory
                .dependencies
                .extend(extract_dependencies(&result.target, &response.data));
            sources.extend(extracted);
        }

        inventory.total_assets = sources.len();
        let (assets, duplicates) = self.deduplicate(sources);
        inventory.unique_assets = assets.len();
        inventory.duplicate_count = duplicates.len();

        if self.config.enable_correlation {
            inventory.correlations = correlate(&assets);
        }

        debug!(
            total_assets = inventory.total_assets,
            unique_assets = inventory.unique_assets,
            duplicates = inventory.duplicate_count,
            correlations = inventory.correlations.len(),
            "Aggregation complete"
        );

        inventory.assets = assets;
        inventory.duplicates = duplicates;
        inventory
    }

    /// Group similar assets and merge each group
    pub fn deduplicate(&self, sources: Vec<SourceAsset>) -> (Vec<UnifiedAsset>, Vec<DuplicateRecord>) {
        let threshold = self.config.similarity_threshold;
        let mut grouped = vec![false; sources.len()];
        let mut groups: Vec<Vec<(usize, f64)>> = Vec::new();

        for seed in 0..sources.len() {
            if grouped[seed] {
                continue;
            }
            grouped[seed] = true;
            let mut group = vec![(seed, 1.0)];

            for candidate in (seed + 1)..sources.len() {
                if grouped[candidate] {
                    continue;
                }
                let score = similarity_score(&sources[seed].identity, &sources[candidate].identity);
                if score >= threshold {
                    grouped[candidate] = true;
                    group.push((candidate, score));
                }
            }
            groups.push(group);
        }

        let mut assets = Vec::with_capacity(groups.len());
        let mut duplicates = Vec::new();
        let mut issued_ids = HashSet::with_capacity(groups.len());

        for (ordinal, group) in groups.iter().enumerate() {
            let first = &sources[group[0].0];
            let id = unified_asset_id(
                &mut issued_ids,
                first.identity.unique_id.as_deref(),
                ordinal + 1,
            );

            let mut platform_data: BTreeMap<String, Vec<Value>> = BTreeMap::new();
            let mut merged_from_platforms = Vec::with_capacity(group.len());
            for (index, _) in group {
                let source = &sources[*index];
                merged_from_platforms.push(source.platform.clone());
                platform_data
                    .entry(source.platform.clone())
                    .or_default()
                    .push(source.payload.clone());
            }

            for (index, score) in group.iter().skip(1) {
                let source = &sources[*index];
                duplicates.push(DuplicateRecord {
                    unified_asset_id: id.clone(),
                    platform: source.platform.clone(),
                    adapter: source.adapter.clone(),
                    identity: source.identity.clone(),
                    similarity: *score,
                });
            }

            assets.push(UnifiedAsset {
                id,
                merged_from_platforms,
                identity: first.identity.clone(),
                resource_type: first.resource_type.clone(),
                attributes: first.payload.clone(),
                platform_data,
                merge_confidence: (group.len() as f64 * CONFIDENCE_PER_SOURCE).min(1.0),
                source_asset_count: group.len(),
            });
        }

        (assets, duplicates)
    }
}

/// Id for the `ordinal`-th unified asset: the seed's source id when still free,
/// otherwise suffixed with the ordinal until unique.
fn unified_asset_id(
    issued: &mut HashSet<String>,
    source_id: Option<&str>,
    ordinal: usize,
) -> String {
    let base = source_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("asset-{ordinal:05}"));

    let mut id = base.clone();
    let mut attempt = 0;
    while issued.contains(&id) {
        id = if attempt == 0 {
            format!("{base}-{ordinal}")
        } else {
            format!("{base}-{ordinal}-{attempt}")
        };
        attempt += 1;
    }
    issued.insert(id.clone());
    id
}

/// Asset records inside one adapter payload.
///
/// Accepts a bare array, an object with an `assets` or `resources` array, or an
/// object of arrays keyed by resource type.
pub fn extract_assets(platform: &str, adapter: &str, data: &Value) -> Vec<SourceAsset> {
    let make = |payload: &Value, resource_type: Option<&str>| SourceAsset {
        platform: platform.to_string(),
        adapter: adapter.to_string(),
        resource_type: resource_type.map(str::to_string),
        identity: AssetIdentity::from_value(payload),
        payload: payload.clone(),
    };

    match data {
        Value::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| make(item, None))
            .collect(),
        Value::Object(map) => {
            for key in ["assets", "resources"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items
                        .iter()
                        .filter(|item| item.is_object())
                        .map(|item| make(item, None))
                        .collect();
                }
            }

            map.iter()
                .filter(|(key, _)| key.as_str() != "dependencies")
                .filter_map(|(key, value)| value.as_array().map(|items| (key, items)))
                .flat_map(|(key, items)| {
                    items
                        .iter()
                        .filter(|item| item.is_object())
                        .map(move |item| make(item, Some(key.as_str())))
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn extract_dependencies(platform: &str, data: &Value) -> Vec<DependencyRecord> {
    let text = |value: &Value, field: &str| {
        value.get(field).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    data.get("dependencies")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| DependencyRecord {
                    platform: platform.to_string(),
                    source: text(item, "source"),
                    target: text(item, "target"),
                    payload: item.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Network and service correlations over deduplicated assets
pub fn correlate(assets: &[UnifiedAsset]) -> Vec<Correlation> {
    let mut correlations = Vec::new();

    for (i, left) in assets.iter().enumerate() {
        let Some(ip) = left.identity.ip.as_deref() else {
            continue;
        };
        for right in &assets[i + 1..] {
            if right.identity.ip.as_deref() != Some(ip) {
                continue;
            }
            let (left_platform, right_platform) = (left.primary_platform(), right.primary_platform());
            if left_platform == right_platform {
                continue;
            }
            correlations.push(Correlation {
                correlation_type: correlation_types::SAME_IP_ADDRESS.to_string(),
                key: ip.to_string(),
                platforms: vec![left_platform.to_string(), right_platform.to_string()],
                asset_ids: vec![left.id.clone(), right.id.clone()],
            });
        }
    }

    let mut services: BTreeMap<(String, u64), Vec<&UnifiedAsset>> = BTreeMap::new();
    for asset in assets {
        if let (Some(service), Some(port)) = (&asset.identity.service, asset.identity.port) {
            services
                .entry((service.to_lowercase(), port))
                .or_default()
                .push(asset);
        }
    }

    for ((service, port), members) in services {
        let platforms: BTreeSet<&str> = members
            .iter()
            .flat_map(|asset| asset.merged_from_platforms.iter().map(String::as_str))
            .collect();
        if platforms.len() > 1 {
            correlations.push(Correlation {
                correlation_type: correlation_types::COMMON_SERVICE.to_string(),
                key: format!("{service}:{port}"),
                platforms: platforms.into_iter().map(str::to_string).collect(),
                asset_ids: members.iter().map(|asset| asset.id.clone()).collect(),
            });
        }
    }

    correlations
}
