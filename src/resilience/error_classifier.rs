//! # Adapter Error Classification
//!
//! Maps an adapter failure onto a static [`ErrorPattern`] that decides severity,
//! retry strategy, retry budget, backoff bounds and whether the failure counts
//! towards tripping the circuit breaker.
//!
//! ## Overview
//!
//! Adapters report failures as an [`AdapterFault`], a small sum type of known fault
//! categories plus a free-form `Other` fallback. Classification is a pure function:
//!
//! 1. Typed faults match the pattern that lists their [`FaultType`].
//! 2. Otherwise the lower-cased message is scanned for each pattern's keywords.
//! 3. The first matching pattern wins; unmatched faults get the `unknown` pattern.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  AdapterFault   │────▶│ ErrorClassifier │────▶│  ErrorPattern   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use inventory_core::resilience::{
//!     AdapterFault, ErrorClassifier, ErrorKind, RetryStrategy, StandardErrorClassifier,
//! };
//!
//! let classifier = StandardErrorClassifier::new();
//! let pattern = classifier.classify(&AdapterFault::Other("HTTP 429 Too Many Requests".into()));
//!
//! assert_eq!(pattern.kind, ErrorKind::RateLimiting);
//! assert_eq!(pattern.retry_strategy, RetryStrategy::Exponential);
//! ```

use super::ResilienceError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Error kinds recognised by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NetworkConnectivity,
    RateLimiting,
    ServiceUnavailable,
    Timeout,
    DataValidation,
    Configuration,
    ResourceExhausted,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NetworkConnectivity => "network_connectivity",
            ErrorKind::RateLimiting => "rate_limiting",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::DataValidation => "data_validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Severity used for reporting and alerting only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "low"),
            ErrorSeverity::Medium => write!(f, "medium"),
            ErrorSeverity::High => write!(f, "high"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Retry strategy recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// No retry recommended
    NoRetry,

    /// Constant `base` delay
    Fixed,

    /// `base * 2^attempt`
    Exponential,

    /// `base * (attempt + 1)`
    Linear,

    /// `base + U(0, base)`
    RandomJitter,
}

/// Tag of a typed [`AdapterFault`], used for type-first matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    Authentication,
    Authorization,
    Connection,
    RateLimited,
    ServiceUnavailable,
    Timeout,
    Validation,
    Configuration,
    ResourceExhausted,
}

/// Failure reported by an adapter call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterFault {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Authorization failed: {0}")]
    Authorization(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Invalid data: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("{0}")]
    Other(String),
    /// Retry budget or breaker rejection surfaced through a wrapped adapter
    #[error(transparent)]
    Resilience(#[from] ResilienceError),
}

impl AdapterFault {
    /// Type tag for typed variants; `None` for `Other`
    pub fn fault_type(&self) -> Option<FaultType> {
        match self {
            AdapterFault::Authentication(_) => Some(FaultType::Authentication),
            AdapterFault::Authorization(_) => Some(FaultType::Authorization),
            AdapterFault::Connection(_) => Some(FaultType::Connection),
            AdapterFault::RateLimited(_) => Some(FaultType::RateLimited),
            AdapterFault::ServiceUnavailable(_) => Some(FaultType::ServiceUnavailable),
            AdapterFault::Timeout(_) => Some(FaultType::Timeout),
            AdapterFault::Validation(_) => Some(FaultType::Validation),
            AdapterFault::Configuration(_) => Some(FaultType::Configuration),
            AdapterFault::ResourceExhausted(_) => Some(FaultType::ResourceExhausted),
            AdapterFault::Other(_) | AdapterFault::Resilience(_) => None,
        }
    }

    pub fn message(&self) -> Cow<'_, str> {
        match self {
            AdapterFault::Authentication(msg)
            | AdapterFault::Authorization(msg)
            | AdapterFault::Connection(msg)
            | AdapterFault::RateLimited(msg)
            | AdapterFault::ServiceUnavailable(msg)
            | AdapterFault::Timeout(msg)
            | AdapterFault::Validation(msg)
            | AdapterFault::Configuration(msg)
            | AdapterFault::ResourceExhausted(msg)
            | AdapterFault::Other(msg) => Cow::Borrowed(msg),
            AdapterFault::Resilience(ResilienceError::MaxRetriesExceeded { last_error, .. }) => {
                Cow::Borrowed(last_error)
            }
            AdapterFault::Resilience(error) => Cow::Owned(error.to_string()),
        }
    }
}

impl From<std::io::Error> for AdapterFault {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let message = error.to_string();
        match error.kind() {
            Io::TimedOut => AdapterFault::Timeout(message),
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::AddrNotAvailable
            | Io::BrokenPipe => AdapterFault::Connection(message),
            Io::PermissionDenied => AdapterFault::Authorization(message),
            Io::InvalidData | Io::InvalidInput => AdapterFault::Validation(message),
            Io::OutOfMemory => AdapterFault::ResourceExhausted(message),
            _ => AdapterFault::Other(message),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AdapterFault {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        AdapterFault::Timeout(error.to_string())
    }
}

impl From<serde_json::Error> for AdapterFault {
    fn from(error: serde_json::Error) -> Self {
        AdapterFault::Validation(error.to_string())
    }
}

/// Static classification template
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPattern {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub retry_strategy: RetryStrategy,
    pub max_retries: u32,
    /// Pattern-specific backoff bounds; `None` falls back to the retry policy
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub should_trip_breaker: bool,
    pub fault_types: &'static [FaultType],
    pub keywords: &'static [&'static str],
}

impl ErrorPattern {
    fn matches_type(&self, fault_type: FaultType) -> bool {
        self.fault_types.contains(&fault_type)
    }

    fn matches_message(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    /// Classify a fault into its handling pattern
    fn classify(&self, fault: &AdapterFault) -> ErrorPattern;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

static DEFAULT_PATTERNS: OnceLock<Vec<ErrorPattern>> = OnceLock::new();

/// The built-in taxonomy, in match order
pub fn default_patterns() -> &'static [ErrorPattern] {
    DEFAULT_PATTERNS.get_or_init(|| {
        vec![
            ErrorPattern {
                kind: ErrorKind::Authentication,
                severity: ErrorSeverity::Critical,
                retry_strategy: RetryStrategy::NoRetry,
                max_retries: 0,
                base_delay: None,
                max_delay: None,
                should_trip_breaker: false,
                fault_types: &[FaultType::Authentication],
                keywords: &[
                    "authentication",
                    "unauthenticated",
                    "unauthorized",
                    "invalid credentials",
                    "invalid token",
                    "expired token",
                    "401",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::Authorization,
                severity: ErrorSeverity::High,
                retry_strategy: RetryStrategy::NoRetry,
                max_retries: 0,
                base_delay: None,
                max_delay: None,
                should_trip_breaker: false,
                fault_types: &[FaultType::Authorization],
                keywords: &[
                    "forbidden",
                    "access denied",
                    "permission denied",
                    "not authorized",
                    "insufficient permissions",
                    "403",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::NetworkConnectivity,
                severity: ErrorSeverity::Medium,
                retry_strategy: RetryStrategy::Exponential,
                max_retries: 5,
                base_delay: Some(Duration::from_secs(1)),
                max_delay: Some(Duration::from_secs(30)),
                should_trip_breaker: false,
                fault_types: &[FaultType::Connection],
                keywords: &[
                    "connection refused",
                    "connection reset",
                    "connection error",
                    "network",
                    "unreachable",
                    "dns",
                    "name resolution",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::RateLimiting,
                severity: ErrorSeverity::Medium,
                retry_strategy: RetryStrategy::Exponential,
                max_retries: 3,
                base_delay: Some(Duration::from_secs(5)),
                max_delay: Some(Duration::from_secs(300)),
                should_trip_breaker: false,
                fault_types: &[FaultType::RateLimited],
                keywords: &[
                    "rate limit",
                    "rate exceeded",
                    "throttl",
                    "too many requests",
                    "quota exceeded",
                    "429",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::ServiceUnavailable,
                severity: ErrorSeverity::High,
                retry_strategy: RetryStrategy::Exponential,
                max_retries: 3,
                base_delay: Some(Duration::from_secs(2)),
                max_delay: Some(Duration::from_secs(60)),
                should_trip_breaker: true,
                fault_types: &[FaultType::ServiceUnavailable],
                keywords: &[
                    "service unavailable",
                    "temporarily unavailable",
                    "bad gateway",
                    "internal server error",
                    "maintenance",
                    "502",
                    "503",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::Timeout,
                severity: ErrorSeverity::Medium,
                retry_strategy: RetryStrategy::Linear,
                max_retries: 3,
                base_delay: Some(Duration::from_secs(2)),
                max_delay: Some(Duration::from_secs(30)),
                should_trip_breaker: false,
                fault_types: &[FaultType::Timeout],
                keywords: &["timeout", "timed out", "deadline exceeded", "504"],
            },
            ErrorPattern {
                kind: ErrorKind::DataValidation,
                severity: ErrorSeverity::Low,
                retry_strategy: RetryStrategy::NoRetry,
                max_retries: 0,
                base_delay: None,
                max_delay: None,
                should_trip_breaker: false,
                fault_types: &[FaultType::Validation],
                keywords: &["validation", "invalid format", "malformed", "schema", "parse error"],
            },
            ErrorPattern {
                kind: ErrorKind::Configuration,
                severity: ErrorSeverity::Critical,
                retry_strategy: RetryStrategy::NoRetry,
                max_retries: 0,
                base_delay: None,
                max_delay: None,
                should_trip_breaker: false,
                fault_types: &[FaultType::Configuration],
                keywords: &[
                    "configuration",
                    "misconfigured",
                    "missing required",
                    "not configured",
                    "invalid region",
                ],
            },
            ErrorPattern {
                kind: ErrorKind::ResourceExhausted,
                severity: ErrorSeverity::High,
                retry_strategy: RetryStrategy::Exponential,
                max_retries: 2,
                base_delay: Some(Duration::from_secs(10)),
                max_delay: Some(Duration::from_secs(120)),
                should_trip_breaker: true,
                fault_types: &[FaultType::ResourceExhausted],
                keywords: &[
                    "resource exhausted",
                    "out of memory",
                    "no space left",
                    "disk full",
                    "limit exceeded",
                    "capacity",
                ],
            },
        ]
    })
}

/// Pattern applied to faults nothing else matches.
///
/// Its `retry_strategy` records the table default only: the retry loop takes the
/// strategy for unknown faults from the caller's [`RetryPolicy`], whose default is
/// also exponential.
///
/// [`RetryPolicy`]: super::RetryPolicy
pub fn unknown_pattern() -> ErrorPattern {
    ErrorPattern {
        kind: ErrorKind::Unknown,
        severity: ErrorSeverity::Medium,
        retry_strategy: RetryStrategy::Exponential,
        max_retries: 2,
        base_delay: Some(Duration::from_secs(1)),
        max_delay: Some(Duration::from_secs(30)),
        should_trip_breaker: false,
        fault_types: &[],
        keywords: &[],
    }
}

/// Standard classifier over the built-in taxonomy
#[derive(Debug, Clone)]
pub struct StandardErrorClassifier {
    patterns: &'static [ErrorPattern],
}

impl Default for StandardErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }

    pub fn patterns(&self) -> &[ErrorPattern] {
        self.patterns
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, fault: &AdapterFault) -> ErrorPattern {
        if let Some(fault_type) = fault.fault_type() {
            if let Some(pattern) = self.patterns.iter().find(|p| p.matches_type(fault_type)) {
                return pattern.clone();
            }
        }

        let lowered = fault.message().to_lowercase();
        self.patterns
            .iter()
            .find(|p| p.matches_message(&lowered))
            .cloned()
            .unwrap_or_else(unknown_pattern)
    }

    fn classifier_name(&self) -> &'static str {
        "standard"
    }
}
