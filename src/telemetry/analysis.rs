//! Snapshot and trend analysis over recorded series.

use super::metrics::{mean, MetricKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative change beyond which a trend is no longer stable
pub const TREND_CHANGE_THRESHOLD: f64 = 0.10;

/// Recent averages for one adapter/target pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub adapter: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub window_seconds: u64,
    /// Mean value per metric kind over the window
    pub averages: BTreeMap<MetricKind, f64>,
    pub sample_counts: BTreeMap<MetricKind, usize>,
}

impl PerformanceSnapshot {
    pub fn average(&self, kind: MetricKind) -> Option<f64> {
        self.averages.get(&kind).copied()
    }

    pub fn total_samples(&self) -> usize {
        self.sample_counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Outcome of comparing the newest samples with the oldest ones in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub kind: MetricKind,
    pub direction: TrendDirection,
    /// Mean of the earliest samples
    pub baseline_mean: f64,
    /// Mean of the most recent samples
    pub recent_mean: f64,
    /// Relative change from baseline to recent, as a percentage
    pub change_percent: f64,
    pub sample_count: usize,
}

impl TrendAnalysis {
    pub fn is_increasing(&self) -> bool {
        self.direction == TrendDirection::Increasing
    }

    pub fn is_decreasing(&self) -> bool {
        self.direction == TrendDirection::Decreasing
    }

    pub fn has_data(&self) -> bool {
        self.direction != TrendDirection::InsufficientData
    }
}

/// Compare the mean of the last `sample_size` values against the first `sample_size`.
///
/// `values` must be oldest first. Fewer than two values yields `InsufficientData`.
pub fn analyze_trend(kind: MetricKind, values: &[f64], sample_size: usize) -> TrendAnalysis {
    let sample_size = sample_size.max(1);
    let count = values.len();

    if count < 2 {
        let only = values.first().copied().unwrap_or(0.0);
        return TrendAnalysis {
            kind,
            direction: TrendDirection::InsufficientData,
            baseline_mean: only,
            recent_mean: only,
            change_percent: 0.0,
            sample_count: count,
        };
    }

    let window = sample_size.min(count);
    let baseline_mean = mean(&values[..window]).unwrap_or(0.0);
    let recent_mean = mean(&values[count - window..]).unwrap_or(0.0);

    let change = if baseline_mean.abs() > f64::EPSILON {
        (recent_mean - baseline_mean) / baseline_mean.abs()
    } else if recent_mean > 0.0 {
        1.0
    } else if recent_mean < 0.0 {
        -1.0
    } else {
        0.0
    };

    let direction = if change > TREND_CHANGE_THRESHOLD {
        TrendDirection::Increasing
    } else if change < -TREND_CHANGE_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    TrendAnalysis {
        kind,
        direction,
        baseline_mean,
        recent_mean,
        change_percent: change * 100.0,
        sample_count: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_series_is_increasing() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + i as f64 / 19.0)).collect();
        let trend = analyze_trend(MetricKind::Latency, &values, 10);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(trend.recent_mean > trend.baseline_mean);
        assert_eq!(trend.sample_count, 20);
    }

    #[test]
    fn test_falling_series_is_decreasing() {
        let values: Vec<f64> = (0..20).map(|i| 200.0 - i as f64 * 5.0).collect();
        let trend = analyze_trend(MetricKind::Throughput, &values, 10);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_small_changes_are_stable() {
        let values = vec![100.0, 102.0, 98.0, 101.0, 104.0, 99.0];
        let trend = analyze_trend(MetricKind::Latency, &values, 3);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_single_sample_is_insufficient() {
        let trend = analyze_trend(MetricKind::Latency, &[42.0], 10);
        assert_eq!(trend.direction, TrendDirection::InsufficientData);
        assert!(!trend.has_data());
    }

    #[test]
    fn test_zero_baseline_rising_is_increasing() {
        let trend = analyze_trend(MetricKind::ErrorRate, &[0.0, 0.0, 1.0, 1.0], 2);
        assert!(trend.is_increasing());
    }
}
