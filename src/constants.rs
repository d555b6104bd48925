//! # System Constants
//!
//! Status enums and well-known strings shared by the orchestration, aggregation and
//! logging layers.

use serde::{Deserialize, Serialize};

/// Lifecycle events written by the structured logging helpers
pub mod events {
    pub const ORCHESTRATION_STARTED: &str = "orchestration.started";
    pub const ORCHESTRATION_FINISHED: &str = "orchestration.finished";
    pub const ORCHESTRATION_CANCEL_REQUESTED: &str = "orchestration.cancel_requested";

    pub const ADAPTER_STARTED: &str = "adapter.started";
    pub const ADAPTER_FINISHED: &str = "adapter.finished";
    pub const ADAPTER_REJECTED: &str = "adapter.rejected";
}

/// Correlation type names reported by the aggregator
pub mod correlation_types {
    pub const SAME_IP_ADDRESS: &str = "same_ip_address";
    pub const COMMON_SERVICE: &str = "common_service";
}

/// Error text recorded when admission control refuses a task
pub const RESOURCE_LIMITS_EXCEEDED: &str = "Resource limits exceeded";

/// Error text recorded when a task exceeds its deadline
pub const TASK_TIMEOUT_MESSAGE: &str = "Adapter call exceeded its timeout";

/// Per-adapter task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl AdapterExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            AdapterExecutionStatus::Pending | AdapterExecutionStatus::Running
        )
    }
}

impl std::fmt::Display for AdapterExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterExecutionStatus::Pending => write!(f, "pending"),
            AdapterExecutionStatus::Running => write!(f, "running"),
            AdapterExecutionStatus::Completed => write!(f, "completed"),
            AdapterExecutionStatus::Failed => write!(f, "failed"),
            AdapterExecutionStatus::Timeout => write!(f, "timeout"),
            AdapterExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Orchestration run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    PartialSuccess,
}

impl OrchestrationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            OrchestrationStatus::Pending | OrchestrationStatus::Running
        )
    }

    /// Final status from settled task counts
    pub fn from_counts(successful: usize, failed: usize) -> Self {
        if successful == 0 {
            OrchestrationStatus::Failed
        } else if failed == 0 {
            OrchestrationStatus::Completed
        } else {
            OrchestrationStatus::PartialSuccess
        }
    }
}

impl std::fmt::Display for OrchestrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestrationStatus::Pending => write!(f, "pending"),
            OrchestrationStatus::Running => write!(f, "running"),
            OrchestrationStatus::Completed => write!(f, "completed"),
            OrchestrationStatus::Failed => write!(f, "failed"),
            OrchestrationStatus::Cancelled => write!(f, "cancelled"),
            OrchestrationStatus::PartialSuccess => write!(f, "partial_success"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(OrchestrationStatus::from_counts(0, 3), OrchestrationStatus::Failed);
        assert_eq!(OrchestrationStatus::from_counts(0, 0), OrchestrationStatus::Failed);
        assert_eq!(OrchestrationStatus::from_counts(3, 0), OrchestrationStatus::Completed);
        assert_eq!(
            OrchestrationStatus::from_counts(3, 2),
            OrchestrationStatus::PartialSuccess
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrchestrationStatus::PartialSuccess).unwrap(),
            "\"partial_success\""
        );
        assert_eq!(AdapterExecutionStatus::Timeout.to_string(), "timeout");
        assert!(!AdapterExecutionStatus::Running.is_terminal());
    }
}
