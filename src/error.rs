//! Error types for the inventory core.
//!

use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InventoryError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Resilience error: {0}")]
    ResilienceError(String),
    #[error("Adapter error: {0}")]
    AdapterError(String),
    #[error("Aggregation error: {0}")]
    AggregationError(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Orchestration {0} not found")]
    OrchestrationNotFound(String),
}

impl From<serde_json::Error> for InventoryError {
    fn from(error: serde_json::Error) -> Self {
        InventoryError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for InventoryError {
    fn from(error: ConfigurationError) -> Self {
        InventoryError::ConfigurationError(error.to_string())
    }
}

impl From<crate::resilience::ResilienceError> for InventoryError {
    fn from(error: crate::resilience::ResilienceError) -> Self {
        InventoryError::ResilienceError(error.to_string())
    }
}

impl From<crate::resilience::StoreError> for InventoryError {
    fn from(error: crate::resilience::StoreError) -> Self {
        InventoryError::StoreError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
