//! Resilient caller, circuit breaker and resilient adapter behavior across module
//! boundaries.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{Behavior, ScriptedAdapter};
use inventory_core::adapters::{CollectionRequest, PlatformAdapter};
use inventory_core::config::ResilienceConfig;
use inventory_core::resilience::{
    wrap_with_resilience, AdapterFault, AdapterKey, CircuitBreakerStore, CircuitState, ErrorKind,
    ErrorSeverity, InMemoryKeyValueStore, ResilienceError, ResilientCaller, RetryPolicy,
};
use inventory_core::telemetry::{MetricKind, PerformanceMonitor};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn key() -> AdapterKey {
    AdapterKey::new("azure-collector", "azure")
}

fn single_attempt_policy(threshold: u32) -> RetryPolicy {
    RetryPolicy {
        breaker_threshold: threshold,
        breaker_cooldown: Duration::from_secs(30),
        ..RetryPolicy::deterministic(0)
    }
}

#[tokio::test(start_paused = true)]
async fn test_every_no_retry_kind_makes_exactly_one_attempt() {
    let faults = [
        AdapterFault::Authentication("expired token".into()),
        AdapterFault::Authorization("forbidden".into()),
        AdapterFault::Validation("bad payload".into()),
        AdapterFault::Configuration("missing region".into()),
    ];

    for fault in faults {
        let caller = ResilientCaller::new(RetryPolicy::deterministic(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = caller
            .call(&key(), None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                let fault = fault.clone();
                async move { Err(fault) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1, "fault {fault:?}");
        assert!(matches!(
            result,
            Err(ResilienceError::MaxRetriesExceeded { attempts: 1, .. })
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_on_threshold_and_blocks_without_attempts() {
    let caller = ResilientCaller::new(single_attempt_policy(3));
    let calls = AtomicU32::new(0);

    let failing = || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(AdapterFault::ServiceUnavailable("503".into())) }
    };

    for _ in 0..3 {
        let result = caller.call(&key(), None, failing).await;
        assert!(matches!(result, Err(ResilienceError::MaxRetriesExceeded { .. })));
    }
    let state = caller
        .breakers()
        .breaker_state(&key().to_string())
        .await
        .unwrap();
    assert_eq!(state.circuit_state(), CircuitState::Open);
    assert_eq!(state.failure_count, 3);

    let before = calls.load(Ordering::SeqCst);
    let result = caller.call(&key(), None, failing).await;
    assert!(matches!(
        result,
        Err(ResilienceError::CircuitBreakerOpen { next_attempt_time: Some(_), .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_non_tripping_failures_never_open_the_breaker() {
    let caller = ResilientCaller::new(single_attempt_policy(2));

    for _ in 0..5 {
        let _ = caller
            .call(&key(), None, || async {
                Err::<(), _>(AdapterFault::Validation("schema mismatch".into()))
            })
            .await;
    }

    let state = caller
        .breakers()
        .breaker_state(&key().to_string())
        .await
        .unwrap();
    assert_eq!(state.circuit_state(), CircuitState::Closed);
    assert_eq!(state.failure_count, 0);
}

#[tokio::test]
async fn test_breaker_deadline_is_failure_time_plus_cooldown() {
    let store = CircuitBreakerStore::in_process();
    let cooldown = Duration::from_secs(45);
    let now = Utc::now();

    let first = store.record_failure_at("k", true, 2, cooldown, now).await;
    assert!(!first.is_open);

    let second = store
        .record_failure_at("k", true, 2, cooldown, now + ChronoDuration::seconds(1))
        .await;
    assert!(second.is_open);
    assert_eq!(
        second.next_attempt_time,
        Some(now + ChronoDuration::seconds(46))
    );
}

#[tokio::test]
async fn test_half_open_trial_success_closes_and_resets() {
    let store = CircuitBreakerStore::in_process();
    let cooldown = Duration::from_secs(10);
    let opened_at = Utc::now() - ChronoDuration::seconds(60);
    store.record_failure_at("k", true, 1, cooldown, opened_at).await;

    store.try_acquire("k", cooldown).await.unwrap();
    assert_eq!(
        store.breaker_state("k").await.unwrap().circuit_state(),
        CircuitState::HalfOpen
    );
    // the trial lease keeps others out
    assert!(store.try_acquire("k", cooldown).await.is_err());

    store.record_success("k").await;
    let state = store.breaker_state("k").await.unwrap();
    assert_eq!(state.circuit_state(), CircuitState::Closed);
    assert_eq!(state.failure_count, 0);
    assert_eq!(state.consecutive_successes, 1);
}

#[tokio::test]
async fn test_success_while_closed_resets_failure_count() {
    let store = CircuitBreakerStore::in_process();
    store
        .record_failure("k", true, 5, Duration::from_secs(10))
        .await;
    store
        .record_failure("k", true, 5, Duration::from_secs(10))
        .await;
    store.record_success("k").await;

    let state = store.breaker_state("k").await.unwrap();
    assert!(!state.is_open);
    assert_eq!(state.failure_count, 0);
}

#[tokio::test]
async fn test_breaker_state_is_shared_through_the_store() {
    let shared = Arc::new(InMemoryKeyValueStore::new());
    let process_a = CircuitBreakerStore::with_shared_store(shared.clone(), Duration::from_secs(60));
    let process_b = CircuitBreakerStore::with_shared_store(shared.clone(), Duration::from_secs(60));

    process_a
        .record_failure("aws-collector:aws", true, 1, Duration::from_secs(300))
        .await;

    assert!(matches!(
        process_b
            .try_acquire("aws-collector:aws", Duration::from_secs(300))
            .await,
        Err(ResilienceError::CircuitBreakerOpen { .. })
    ));
    assert_eq!(shared.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_statistics_track_every_attempt() {
    let caller = ResilientCaller::from_config(
        &ResilienceConfig {
            jitter: false,
            ..Default::default()
        },
        Arc::new(CircuitBreakerStore::in_process()),
    );

    let _ = caller
        .call(&key(), None, || async {
            Err::<(), _>(AdapterFault::Timeout("read timed out".into()))
        })
        .await;
    let _ = caller
        .call(&key(), None, || async {
            Err::<(), _>(AdapterFault::Authentication("bad secret".into()))
        })
        .await;

    let stats = caller.error_statistics();
    // timeout: one attempt plus three linear retries
    assert_eq!(stats.total_errors, 5);
    assert_eq!(stats.by_kind.get(&ErrorKind::Timeout), Some(&4));
    assert_eq!(stats.by_severity.get(&ErrorSeverity::Critical), Some(&1));
    assert_eq!(stats.recent_errors[0].kind, ErrorKind::Authentication);
}

#[tokio::test(start_paused = true)]
async fn test_wrapped_adapter_retries_and_records_telemetry() {
    let flaky = Arc::new(ScriptedAdapter::scripted(
        "gcp",
        vec![Behavior::Fault(AdapterFault::Connection("reset by peer".into()))],
        Behavior::Assets(common::servers("gcp", &["a", "b"])),
    ));
    let monitor = Arc::new(PerformanceMonitor::default());
    let caller = Arc::new(ResilientCaller::new(RetryPolicy::deterministic(3)));

    let adapter = wrap_with_resilience(flaky.clone(), caller.clone(), "gcp", None)
        .with_telemetry(monitor.clone());
    let response = adapter
        .collect_data(CollectionRequest::new("gcp"))
        .await
        .unwrap();

    assert_eq!(response.resource_count, 2);
    assert_eq!(flaky.calls(), 2);
    assert_eq!(adapter.adapter_key().to_string(), "gcp-collector:gcp");

    let snapshot = monitor.snapshot("gcp-collector", "gcp");
    assert_eq!(snapshot.average(MetricKind::ErrorRate), Some(0.0));
    assert_eq!(snapshot.average(MetricKind::Concurrency), Some(1.0));
}

#[tokio::test]
async fn test_wrapped_adapter_surfaces_open_breaker_as_fault() {
    let adapter_impl = ScriptedAdapter::shared(
        "aws",
        Behavior::Fault(AdapterFault::ResourceExhausted("quota".into())),
    );
    let caller = Arc::new(ResilientCaller::new(single_attempt_policy(1)));
    let adapter = wrap_with_resilience(adapter_impl.clone(), caller, "aws", None);

    let first = adapter.collect_data(CollectionRequest::new("aws")).await;
    assert!(matches!(
        first,
        Err(AdapterFault::Resilience(ResilienceError::MaxRetriesExceeded { .. }))
    ));

    let second = adapter.collect_data(CollectionRequest::new("aws")).await;
    assert!(matches!(
        second,
        Err(AdapterFault::Resilience(ResilienceError::CircuitBreakerOpen { .. }))
    ));
    assert_eq!(adapter_impl.calls(), 1);
}

#[tokio::test]
async fn test_unsuccessful_response_counts_as_breaker_failure() {
    let adapter_impl = ScriptedAdapter::shared(
        "aws",
        Behavior::Unsuccessful("503 service unavailable".into()),
    );
    let caller = Arc::new(ResilientCaller::new(single_attempt_policy(2)));
    let adapter = wrap_with_resilience(adapter_impl.clone(), caller.clone(), "aws", None);
    let breaker_key = adapter.adapter_key().to_string();

    let first = adapter.collect_data(CollectionRequest::new("aws")).await;
    assert!(matches!(
        first,
        Err(AdapterFault::Resilience(ResilienceError::MaxRetriesExceeded { .. }))
    ));
    let state = caller.breakers().breaker_state(&breaker_key).await.unwrap();
    assert_eq!(state.failure_count, 1);

    let _ = adapter.collect_data(CollectionRequest::new("aws")).await;
    let state = caller.breakers().breaker_state(&breaker_key).await.unwrap();
    assert_eq!(state.failure_count, 2);
    assert_eq!(state.circuit_state(), CircuitState::Open);

    let blocked = adapter.collect_data(CollectionRequest::new("aws")).await;
    assert!(matches!(
        blocked,
        Err(AdapterFault::Resilience(ResilienceError::CircuitBreakerOpen { .. }))
    ));
    assert_eq!(adapter_impl.calls(), 2);

    let stats = caller.error_statistics();
    assert_eq!(stats.total_errors, 2);
    assert_eq!(stats.by_kind.get(&ErrorKind::ServiceUnavailable), Some(&2));
}

#[tokio::test]
async fn test_unsuccessful_response_does_not_reset_failure_count() {
    let caller = Arc::new(ResilientCaller::new(single_attempt_policy(5)));
    let adapter_impl = ScriptedAdapter::shared(
        "azure",
        Behavior::Unsuccessful("connection timeout".into()),
    );
    let adapter = wrap_with_resilience(adapter_impl, caller.clone(), "azure", None);
    let breaker_key = adapter.adapter_key().to_string();

    let _ = caller
        .call(&AdapterKey::new("azure-collector", "azure"), None, || async {
            Err::<(), _>(AdapterFault::ServiceUnavailable("502 bad gateway".into()))
        })
        .await;
    let before = caller.breakers().breaker_state(&breaker_key).await.unwrap();
    assert_eq!(before.failure_count, 1);

    let result = adapter.collect_data(CollectionRequest::new("azure")).await;

    assert!(result.is_err());
    let after = caller.breakers().breaker_state(&breaker_key).await.unwrap();
    assert_eq!(after.failure_count, 1);
    assert_eq!(caller.error_statistics().by_kind.get(&ErrorKind::Timeout), Some(&1));
}
