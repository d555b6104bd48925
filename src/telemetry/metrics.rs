//! # Performance Metrics
//!
//! Metric data points and the capped, time-ordered series they are stored in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of a recorded metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Latency,
    Throughput,
    ErrorRate,
    CacheHitRate,
    Concurrency,
    DataVolume,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Latency,
        MetricKind::Throughput,
        MetricKind::ErrorRate,
        MetricKind::CacheHitRate,
        MetricKind::Concurrency,
        MetricKind::DataVolume,
    ];

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricKind::Latency => "ms",
            MetricKind::Throughput => "items/s",
            MetricKind::ErrorRate | MetricKind::CacheHitRate => "ratio",
            MetricKind::Concurrency => "calls",
            MetricKind::DataVolume => "items",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricKind::Latency => "latency",
            MetricKind::Throughput => "throughput",
            MetricKind::ErrorRate => "error_rate",
            MetricKind::CacheHitRate => "cache_hit_rate",
            MetricKind::Concurrency => "concurrency",
            MetricKind::DataVolume => "data_volume",
        };
        write!(f, "{name}")
    }
}

/// Individual metric data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub timestamp: DateTime<Utc>,
    pub kind: MetricKind,
    pub value: f64,
    pub unit: String,
    pub adapter: String,
    pub target: String,
    pub operation: String,
}

impl PerformanceMetric {
    pub fn new(
        kind: MetricKind,
        value: f64,
        unit: impl Into<String>,
        adapter: impl Into<String>,
        target: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            value,
            unit: unit.into(),
            adapter: adapter.into(),
            target: target.into(),
            operation: operation.into(),
        }
    }

    /// Override the recording time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Series identity: one metric kind for one adapter/target pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub adapter: String,
    pub target: String,
    pub kind: MetricKind,
}

impl SeriesKey {
    pub fn new(adapter: impl Into<String>, target: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            adapter: adapter.into(),
            target: target.into(),
            kind,
        }
    }
}

/// Capped series kept in timestamp order
#[derive(Debug, Clone)]
pub struct MetricSeries {
    samples: VecDeque<PerformanceMetric>,
    capacity: usize,
}

impl MetricSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert a sample, evicting the oldest once over capacity
    pub fn push(&mut self, metric: PerformanceMetric) {
        let in_order = self
            .samples
            .back()
            .map_or(true, |last| last.timestamp <= metric.timestamp);

        if in_order {
            self.samples.push_back(metric);
        } else {
            let position = self
                .samples
                .partition_point(|sample| sample.timestamp <= metric.timestamp);
            self.samples.insert(position, metric);
        }

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values recorded at or after `since`, oldest first
    pub fn values_since(&self, since: DateTime<Utc>) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|sample| sample.timestamp >= since)
            .map(|sample| sample.value)
            .collect()
    }

    pub fn latest(&self) -> Option<&PerformanceMetric> {
        self.samples.back()
    }
}

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Nearest-rank percentile (`quantile` in 0.0..=1.0)
pub fn percentile(values: &[f64], quantile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((sorted.len() as f64) * quantile.clamp(0.0, 1.0)).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latency(value: f64, timestamp: DateTime<Utc>) -> PerformanceMetric {
        PerformanceMetric::new(MetricKind::Latency, value, "ms", "aws-collector", "aws", "collect")
            .at(timestamp)
    }

    #[test]
    fn test_series_is_capped() {
        let mut series = MetricSeries::new(3);
        let now = Utc::now();
        for i in 0..5 {
            series.push(latency(i as f64, now + chrono::Duration::seconds(i)));
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.values_since(now), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_out_of_order_samples_are_sorted() {
        let mut series = MetricSeries::new(10);
        let now = Utc::now();
        series.push(latency(1.0, now));
        series.push(latency(3.0, now + chrono::Duration::seconds(10)));
        series.push(latency(2.0, now + chrono::Duration::seconds(5)));

        assert_eq!(series.values_since(now), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.latest().map(|m| m.value), Some(3.0));
    }

    #[test]
    fn test_mean_and_percentile() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(mean(&values), Some(50.5));
        assert_eq!(percentile(&values, 0.95), Some(95.0));
        assert_eq!(percentile(&values, 0.5), Some(50.0));
        assert_eq!(percentile(&values, 1.0), Some(100.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&[7.0], 0.95), Some(7.0));
        assert_eq!(percentile(&[], 0.95), None);
        assert_eq!(mean(&[]), None);
    }
}
