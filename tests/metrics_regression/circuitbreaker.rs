//! Circuit breaker metrics regression tests

use super::helpers::*;
use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("test_cb")
            .failure_threshold(2)
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap(),
    );

    breaker.call(|| async { Ok::<_, std::io::Error>(()) }).await.unwrap();
    for _ in 0..2 {
        let _ = breaker
            .call(|| async { Err::<(), _>(std::io::Error::other("failure")) })
            .await;
    }
    // rejected while open
    let _ = breaker.call(|| async { Ok::<_, std::io::Error>(()) }).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_cb");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_recovery_transitions() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("recovering_cb")
            .failure_threshold(1)
            .success_threshold(1)
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let _ = breaker
        .call(|| async { Err::<(), _>(std::io::Error::other("failure")) })
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    breaker.call(|| async { Ok::<_, std::io::Error>(()) }).await.unwrap();

    assert_metric_has_label(
        "circuitbreaker_transitions_total",
        "circuitbreaker",
        "recovering_cb",
    );
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "HalfOpen");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "HalfOpen");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Closed");
}
