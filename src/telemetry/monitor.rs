//! # Performance Monitor
//!
//! Records metrics from any layer, checks thresholds on every write and answers
//! snapshot, trend, recommendation and dashboard queries. Purely observational.

use super::analysis::{analyze_trend, PerformanceSnapshot, TrendAnalysis};
use super::metrics::{mean, percentile, MetricKind, MetricSeries, PerformanceMetric, SeriesKey};
use super::recommendations::{recommend, AdvisorInputs, OptimizationRecommendation};
use crate::config::TelemetryConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Threshold breach observed while recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAlert {
    pub timestamp: DateTime<Utc>,
    pub adapter: String,
    pub target: String,
    pub kind: MetricKind,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardHealth {
    Healthy,
    Degraded,
    Critical,
}

/// Aggregate health and metrics view for monitoring surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceDashboard {
    pub generated_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub health: DashboardHealth,
    pub total_metrics: usize,
    pub series_count: usize,
    pub snapshots: Vec<PerformanceSnapshot>,
    pub recent_alerts: Vec<ThresholdAlert>,
    pub recommendation_count: usize,
    pub top_recommendations: Vec<OptimizationRecommendation>,
}

const DASHBOARD_TOP_RECOMMENDATIONS: usize = 5;

/// Thread-safe metric store and advisor
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: TelemetryConfig,
    series: DashMap<SeriesKey, MetricSeries>,
    alerts: Mutex<VecDeque<ThresholdAlert>>,
    started_at: Instant,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

impl PerformanceMonitor {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            series: DashMap::new(),
            alerts: Mutex::new(VecDeque::new()),
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Store a metric and check it against the configured thresholds
    pub fn record(&self, metric: PerformanceMetric) {
        self.check_thresholds(&metric);

        let key = SeriesKey::new(metric.adapter.clone(), metric.target.clone(), metric.kind);
        let capacity = self.config.max_samples_per_series;
        self.series
            .entry(key)
            .or_insert_with(|| MetricSeries::new(capacity))
            .push(metric);
    }

    pub fn record_metric(
        &self,
        kind: MetricKind,
        value: f64,
        unit: &str,
        adapter: &str,
        target: &str,
        operation: &str,
    ) {
        self.record(PerformanceMetric::new(kind, value, unit, adapter, target, operation));
    }

    /// Record latency, error rate, data volume and throughput for one finished call
    pub fn record_operation(
        &self,
        adapter: &str,
        target: &str,
        operation: &str,
        duration: Duration,
        success: bool,
        items: usize,
    ) {
        let latency_ms = duration.as_secs_f64() * 1000.0;
        self.record_metric(MetricKind::Latency, latency_ms, "ms", adapter, target, operation);
        self.record_metric(
            MetricKind::ErrorRate,
            if success { 0.0 } else { 1.0 },
            "ratio",
            adapter,
            target,
            operation,
        );

        if success {
            self.record_metric(
                MetricKind::DataVolume,
                items as f64,
                "items",
                adapter,
                target,
                operation,
            );
            let seconds = duration.as_secs_f64();
            if seconds > 0.0 {
                self.record_metric(
                    MetricKind::Throughput,
                    items as f64 / seconds,
                    "items/s",
                    adapter,
                    target,
                    operation,
                );
            }
        }

        debug!(
            adapter = %adapter,
            target = %target,
            operation = %operation,
            latency_ms = latency_ms,
            success = success,
            items = items,
            "Recorded operation metrics"
        );
    }

    fn check_thresholds(&self, metric: &PerformanceMetric) {
        let breach = match metric.kind {
            MetricKind::Latency if metric.value > self.config.max_latency_ms => {
                Some((self.config.max_latency_ms, "latency above ceiling"))
            }
            MetricKind::ErrorRate if metric.value > self.config.max_error_rate => {
                Some((self.config.max_error_rate, "error rate above ceiling"))
            }
            MetricKind::Throughput if metric.value < self.config.min_throughput => {
                Some((self.config.min_throughput, "throughput below floor"))
            }
            _ => None,
        };

        let Some((threshold, message)) = breach else {
            return;
        };

        warn!(
            adapter = %metric.adapter,
            target = %metric.target,
            metric = %metric.kind,
            value = metric.value,
            threshold = threshold,
            "Performance threshold breached: {}",
            message
        );

        let mut alerts = self.alerts.lock();
        alerts.push_back(ThresholdAlert {
            timestamp: metric.timestamp,
            adapter: metric.adapter.clone(),
            target: metric.target.clone(),
            kind: metric.kind,
            value: metric.value,
            threshold,
            message: message.to_string(),
        });
        while alerts.len() > self.config.max_recent_alerts.max(1) {
            alerts.pop_front();
        }
    }

    fn values_since(&self, adapter: &str, target: &str, kind: MetricKind, since: DateTime<Utc>) -> Vec<f64> {
        self.series
            .get(&SeriesKey::new(adapter, target, kind))
            .map(|series| series.values_since(since))
            .unwrap_or_default()
    }

    fn window_start(window: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(window)
            .ok()
            .and_then(|delta| Utc::now().checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Average of each metric kind over the snapshot window
    pub fn snapshot(&self, adapter: &str, target: &str) -> PerformanceSnapshot {
        let since = Self::window_start(self.config.snapshot_window());
        let mut averages = BTreeMap::new();
        let mut sample_counts = BTreeMap::new();

        for kind in MetricKind::ALL {
            let values = self.values_since(adapter, target, kind, since);
            if let Some(avg) = mean(&values) {
                averages.insert(kind, avg);
                sample_counts.insert(kind, values.len());
            }
        }

        PerformanceSnapshot {
            adapter: adapter.to_string(),
            target: target.to_string(),
            timestamp: Utc::now(),
            window_seconds: self.config.snapshot_window_seconds,
            averages,
            sample_counts,
        }
    }

    /// Trend of one metric kind across the lookback window
    pub fn analyze_trend(&self, adapter: &str, target: &str, kind: MetricKind) -> TrendAnalysis {
        let since = Self::window_start(self.config.trend_lookback());
        let values = self.values_since(adapter, target, kind, since);
        analyze_trend(kind, &values, self.config.trend_sample_size)
    }

    /// Tuning advice for one adapter/target pair, highest priority first
    pub fn recommend(&self, adapter: &str, target: &str) -> Vec<OptimizationRecommendation> {
        let since = Self::window_start(self.config.trend_lookback());
        let latencies = self.values_since(adapter, target, MetricKind::Latency, since);

        let inputs = AdvisorInputs {
            latency: Some(analyze_trend(
                MetricKind::Latency,
                &latencies,
                self.config.trend_sample_size,
            )),
            error_rate: Some(self.analyze_trend(adapter, target, MetricKind::ErrorRate)),
            throughput: Some(self.analyze_trend(adapter, target, MetricKind::Throughput)),
            mean_latency_ms: mean(&latencies),
            p95_latency_ms: percentile(&latencies, 0.95),
        };

        recommend(&inputs, &self.config)
    }

    /// Adapter/target pairs with at least one series
    pub fn tracked_pairs(&self) -> Vec<(String, String)> {
        let pairs: BTreeSet<(String, String)> = self
            .series
            .iter()
            .map(|entry| (entry.key().adapter.clone(), entry.key().target.clone()))
            .collect();
        pairs.into_iter().collect()
    }

    pub fn recent_alerts(&self) -> Vec<ThresholdAlert> {
        self.alerts.lock().iter().cloned().collect()
    }

    pub fn total_metrics(&self) -> usize {
        self.series.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn dashboard(&self) -> PerformanceDashboard {
        let pairs = self.tracked_pairs();
        let snapshots: Vec<PerformanceSnapshot> = pairs
            .iter()
            .map(|(adapter, target)| self.snapshot(adapter, target))
            .collect();

        let mut recommendations: Vec<OptimizationRecommendation> = pairs
            .iter()
            .flat_map(|(adapter, target)| self.recommend(adapter, target))
            .collect();
        recommendations.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

        let recent_alerts = self.recent_alerts();
        let window_start = Self::window_start(self.config.snapshot_window());
        let health = Self::classify_health(
            recent_alerts
                .iter()
                .filter(|alert| alert.timestamp >= window_start),
        );

        PerformanceDashboard {
            generated_at: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            health,
            total_metrics: self.total_metrics(),
            series_count: self.series.len(),
            snapshots,
            recent_alerts,
            recommendation_count: recommendations.len(),
            top_recommendations: recommendations
                .into_iter()
                .take(DASHBOARD_TOP_RECOMMENDATIONS)
                .collect(),
        }
    }

    fn classify_health<'a>(alerts: impl Iterator<Item = &'a ThresholdAlert>) -> DashboardHealth {
        let mut health = DashboardHealth::Healthy;
        for alert in alerts {
            if alert.kind == MetricKind::ErrorRate {
                return DashboardHealth::Critical;
            }
            health = DashboardHealth::Degraded;
        }
        health
    }

    pub fn clear(&self) {
        self.series.clear();
        self.alerts.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(TelemetryConfig::default())
    }

    #[test]
    fn test_snapshot_averages_recent_window_only() {
        let monitor = monitor();
        let stale = Utc::now() - chrono::Duration::minutes(10);
        monitor.record(
            PerformanceMetric::new(MetricKind::Latency, 9000.0, "ms", "aws-collector", "aws", "collect")
                .at(stale),
        );
        monitor.record_metric(MetricKind::Latency, 100.0, "ms", "aws-collector", "aws", "collect");
        monitor.record_metric(MetricKind::Latency, 300.0, "ms", "aws-collector", "aws", "collect");

        let snapshot = monitor.snapshot("aws-collector", "aws");
        assert_eq!(snapshot.average(MetricKind::Latency), Some(200.0));
        assert_eq!(snapshot.sample_counts[&MetricKind::Latency], 2);
        assert!(snapshot.average(MetricKind::Throughput).is_none());
    }

    #[test]
    fn test_threshold_breaches_are_alerted() {
        let monitor = monitor();
        monitor.record_metric(MetricKind::Latency, 6000.0, "ms", "gcp-collector", "gcp", "collect");
        monitor.record_metric(MetricKind::Throughput, 0.2, "items/s", "gcp-collector", "gcp", "collect");
        monitor.record_metric(MetricKind::Latency, 10.0, "ms", "gcp-collector", "gcp", "collect");

        let alerts = monitor.recent_alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, MetricKind::Latency);
        assert_eq!(monitor.dashboard().health, DashboardHealth::Degraded);
    }

    #[test]
    fn test_alert_list_is_bounded() {
        let monitor = PerformanceMonitor::new(TelemetryConfig {
            max_recent_alerts: 3,
            ..Default::default()
        });
        for _ in 0..10 {
            monitor.record_metric(MetricKind::ErrorRate, 1.0, "ratio", "a", "t", "collect");
        }
        assert_eq!(monitor.recent_alerts().len(), 3);
        assert_eq!(monitor.dashboard().health, DashboardHealth::Critical);
    }

    #[test]
    fn test_record_operation_emits_call_metrics() {
        let monitor = monitor();
        monitor.record_operation("aws-collector", "aws", "collect", Duration::from_secs(2), true, 50);

        let snapshot = monitor.snapshot("aws-collector", "aws");
        assert_eq!(snapshot.average(MetricKind::Latency), Some(2000.0));
        assert_eq!(snapshot.average(MetricKind::ErrorRate), Some(0.0));
        assert_eq!(snapshot.average(MetricKind::DataVolume), Some(50.0));
        assert_eq!(snapshot.average(MetricKind::Throughput), Some(25.0));
    }

    #[test]
    fn test_empty_dashboard_is_healthy() {
        let dashboard = monitor().dashboard();
        assert_eq!(dashboard.health, DashboardHealth::Healthy);
        assert_eq!(dashboard.total_metrics, 0);
        assert!(dashboard.snapshots.is_empty());
    }
}
