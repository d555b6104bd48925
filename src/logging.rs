//! # Structured Logging Module
//!
//! Environment-aware structured logging: a human-readable console layer plus an
//! optional JSON file layer for post-run analysis of orchestration runs.

use chrono::Utc;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Set `INVENTORY_LOG_DIR` to additionally write JSON logs to that directory.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let pid = process::id();

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        let file_layer = std::env::var("INVENTORY_LOG_DIR").ok().map(|dir| {
            let log_dir = PathBuf::from(dir);
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            let appender = tracing_appender::rolling::never(&log_dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(build_filter(&log_level))
        });

        // try_init: a host application may already own the global subscriber
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("INVENTORY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for orchestration run lifecycle events
pub fn log_orchestration_operation(
    operation: &str,
    orchestration_id: &str,
    status: &str,
    total_adapters: Option<usize>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        orchestration_id = %orchestration_id,
        status = %status,
        total_adapters = total_adapters,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ORCHESTRATION_OPERATION"
    );
}

/// Log structured data for a single adapter execution
pub fn log_adapter_operation(
    operation: &str,
    adapter: &str,
    target: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        adapter = %adapter,
        target = %target,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ADAPTER_OPERATION"
    );
}

/// Log circuit breaker state transitions
pub fn log_breaker_transition(adapter_key: &str, from: &str, to: &str, failure_count: u32) {
    tracing::warn!(
        adapter_key = %adapter_key,
        from = %from,
        to = %to,
        failure_count = failure_count,
        timestamp = %Utc::now().to_rfc3339(),
        "CIRCUIT_BREAKER_TRANSITION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
