//! # Optimization Advisor
//!
//! Turns trends and percentiles into tuning advice. Rules are independent and additive;
//! the advisor never changes adapter configuration itself. Each recommendation carries
//! numeric parameter deltas an adapter manager may choose to apply.

use super::analysis::TrendAnalysis;
use crate::config::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RecommendationLevel {
    fn weight(&self) -> f64 {
        match self {
            RecommendationLevel::Low => 0.25,
            RecommendationLevel::Medium => 0.5,
            RecommendationLevel::High => 0.75,
            RecommendationLevel::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for RecommendationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationLevel::Low => write!(f, "low"),
            RecommendationLevel::Medium => write!(f, "medium"),
            RecommendationLevel::High => write!(f, "high"),
            RecommendationLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub level: RecommendationLevel,
    pub title: String,
    pub description: String,
    pub expected_improvement: String,
    pub parameters: HashMap<String, serde_json::Value>,
    /// Ordering key, higher first; level weight scaled by how far past the threshold
    pub priority_score: f64,
}

/// Everything the advisor looks at for one adapter/target pair
#[derive(Debug, Clone, Default)]
pub struct AdvisorInputs {
    pub latency: Option<TrendAnalysis>,
    pub error_rate: Option<TrendAnalysis>,
    pub throughput: Option<TrendAnalysis>,
    pub mean_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
}

fn priority(level: RecommendationLevel, overshoot: f64) -> f64 {
    let impact = overshoot.clamp(0.0, 1.0);
    level.weight() * (0.5 + 0.5 * impact)
}

fn relative_overshoot(value: f64, limit: f64) -> f64 {
    if limit.abs() <= f64::EPSILON {
        1.0
    } else {
        ((value - limit) / limit).abs()
    }
}

/// Apply every rule and return matches, highest priority first
pub fn recommend(inputs: &AdvisorInputs, thresholds: &TelemetryConfig) -> Vec<OptimizationRecommendation> {
    let mut recommendations = Vec::new();

    if let Some(latency) = inputs.latency.as_ref().filter(|t| t.has_data()) {
        let over_ceiling = latency.recent_mean > thresholds.max_latency_ms;
        if latency.is_increasing() || over_ceiling {
            let overshoot = if over_ceiling {
                relative_overshoot(latency.recent_mean, thresholds.max_latency_ms)
            } else {
                latency.change_percent / 100.0
            };
            recommendations.push(OptimizationRecommendation {
                level: RecommendationLevel::High,
                title: "Reduce adapter call latency".to_string(),
                description: format!(
                    "Latency is {} ({:.0} ms recent vs {:.0} ms baseline, ceiling {:.0} ms). \
                     Batch resource requests and reuse pooled connections.",
                    latency.direction,
                    latency.recent_mean,
                    latency.baseline_mean,
                    thresholds.max_latency_ms
                ),
                expected_improvement: "20-40% lower per-call latency".to_string(),
                parameters: HashMap::from([
                    ("batch_size_multiplier".to_string(), serde_json::json!(2)),
                    ("enable_connection_pooling".to_string(), serde_json::json!(true)),
                    ("recent_latency_ms".to_string(), serde_json::json!(latency.recent_mean)),
                ]),
                priority_score: priority(RecommendationLevel::High, overshoot),
            });
        }
    }

    if let Some(errors) = inputs.error_rate.as_ref().filter(|t| t.has_data()) {
        if errors.recent_mean > thresholds.max_error_rate {
            recommendations.push(OptimizationRecommendation {
                level: RecommendationLevel::Critical,
                title: "Adjust retry policy".to_string(),
                description: format!(
                    "Error rate {:.1}% exceeds the {:.1}% ceiling. Increase retry spacing and \
                     review circuit breaker thresholds for this adapter.",
                    errors.recent_mean * 100.0,
                    thresholds.max_error_rate * 100.0
                ),
                expected_improvement: "Fewer failed collections and less pressure on the platform"
                    .to_string(),
                parameters: HashMap::from([
                    ("max_retries_delta".to_string(), serde_json::json!(1)),
                    ("base_delay_multiplier".to_string(), serde_json::json!(1.5)),
                    ("recent_error_rate".to_string(), serde_json::json!(errors.recent_mean)),
                ]),
                priority_score: priority(
                    RecommendationLevel::Critical,
                    relative_overshoot(errors.recent_mean, thresholds.max_error_rate),
                ),
            });
        }
    }

    if let Some(throughput) = inputs.throughput.as_ref().filter(|t| t.has_data()) {
        let under_floor = throughput.recent_mean < thresholds.min_throughput;
        if under_floor || throughput.is_decreasing() {
            let overshoot = if under_floor {
                relative_overshoot(throughput.recent_mean, thresholds.min_throughput)
            } else {
                (throughput.change_percent / 100.0).abs()
            };
            recommendations.push(OptimizationRecommendation {
                level: RecommendationLevel::Medium,
                title: "Increase collection concurrency".to_string(),
                description: format!(
                    "Throughput is {} at {:.2} items/s (floor {:.2}). Allow more parallel \
                     requests for this adapter.",
                    throughput.direction, throughput.recent_mean, thresholds.min_throughput
                ),
                expected_improvement: "Higher items collected per second".to_string(),
                parameters: HashMap::from([(
                    "max_parallel_delta".to_string(),
                    serde_json::json!(2),
                )]),
                priority_score: priority(RecommendationLevel::Medium, overshoot),
            });
        }
    }

    if let (Some(mean_ms), Some(p95_ms)) = (inputs.mean_latency_ms, inputs.p95_latency_ms) {
        if mean_ms > 0.0 && p95_ms > 2.0 * mean_ms {
            recommendations.push(OptimizationRecommendation {
                level: RecommendationLevel::Medium,
                title: "Investigate latency outliers".to_string(),
                description: format!(
                    "p95 latency {p95_ms:.0} ms is more than double the mean {mean_ms:.0} ms. \
                     Tighten timeouts and look for slow outlier requests."
                ),
                expected_improvement: "More predictable call duration".to_string(),
                parameters: HashMap::from([
                    ("timeout_ms".to_string(), serde_json::json!((p95_ms * 1.5).round())),
                    ("p95_latency_ms".to_string(), serde_json::json!(p95_ms)),
                ]),
                priority_score: priority(
                    RecommendationLevel::Medium,
                    relative_overshoot(p95_ms, 2.0 * mean_ms),
                ),
            });
        }
    }

    recommendations.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| b.level.cmp(&a.level))
    });
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::analysis::analyze_trend;
    use crate::telemetry::MetricKind;

    #[test]
    fn test_no_inputs_no_recommendations() {
        assert!(recommend(&AdvisorInputs::default(), &TelemetryConfig::default()).is_empty());
    }

    #[test]
    fn test_rising_latency_yields_high_recommendation() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 10.0).collect();
        let inputs = AdvisorInputs {
            latency: Some(analyze_trend(MetricKind::Latency, &values, 10)),
            ..Default::default()
        };

        let recommendations = recommend(&inputs, &TelemetryConfig::default());
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].level, RecommendationLevel::High);
        assert!(recommendations[0].parameters.contains_key("batch_size_multiplier"));
    }

    #[test]
    fn test_error_rate_over_ceiling_is_critical_and_first() {
        let latency: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 10.0).collect();
        let inputs = AdvisorInputs {
            latency: Some(analyze_trend(MetricKind::Latency, &latency, 10)),
            error_rate: Some(analyze_trend(MetricKind::ErrorRate, &[0.2, 0.3, 0.4], 10)),
            ..Default::default()
        };

        let recommendations = recommend(&inputs, &TelemetryConfig::default());
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].level, RecommendationLevel::Critical);
    }

    #[test]
    fn test_low_throughput_and_outliers_are_medium() {
        let inputs = AdvisorInputs {
            throughput: Some(analyze_trend(MetricKind::Throughput, &[0.4, 0.5, 0.5], 10)),
            mean_latency_ms: Some(100.0),
            p95_latency_ms: Some(450.0),
            ..Default::default()
        };

        let recommendations = recommend(&inputs, &TelemetryConfig::default());
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations
            .iter()
            .all(|r| r.level == RecommendationLevel::Medium));
    }
}
