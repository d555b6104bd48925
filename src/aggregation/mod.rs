//! # Result Aggregation
//!
//! Turns the per-adapter collection payloads of a run into one deduplicated,
//! correlated inventory.

pub mod aggregator;
pub mod similarity;

pub use aggregator::{
    correlate, extract_assets, AggregatedInventory, Correlation, DependencyRecord,
    DuplicateRecord, PlatformSummary, ResultAggregator, SourceAsset, UnifiedAsset,
};
pub use similarity::{similarity_score, AssetIdentity};
