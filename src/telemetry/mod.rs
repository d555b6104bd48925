//! # Performance Telemetry
//!
//! Observational metrics for adapter calls and orchestration runs, with threshold
//! alerts, trend analysis and optimization recommendations.
//!
//! ## Usage
//!
//! ```rust
//! use inventory_core::config::TelemetryConfig;
//! use inventory_core::telemetry::{MetricKind, PerformanceMonitor};
//!
//! let monitor = PerformanceMonitor::new(TelemetryConfig::default());
//! monitor.record_metric(MetricKind::Latency, 120.0, "ms", "aws-collector", "aws", "collect_data");
//!
//! let snapshot = monitor.snapshot("aws-collector", "aws");
//! assert_eq!(snapshot.average(MetricKind::Latency), Some(120.0));
//! ```

pub mod analysis;
pub mod metrics;
pub mod monitor;
pub mod recommendations;

pub use analysis::{PerformanceSnapshot, TrendAnalysis, TrendDirection};
pub use metrics::{MetricKind, PerformanceMetric, SeriesKey};
pub use monitor::{DashboardHealth, PerformanceDashboard, PerformanceMonitor, ThresholdAlert};
pub use recommendations::{OptimizationRecommendation, RecommendationLevel};
