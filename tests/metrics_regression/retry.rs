//! Retry metrics regression tests

use super::helpers::*;
use callguard_retry::{RetryConfig, RetryStrategy};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn strategy(name: &str) -> RetryStrategy {
    RetryStrategy::new(
        RetryConfig::builder()
            .name(name)
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .retryable_error_patterns(["retryable"])
            .build()
            .unwrap(),
    )
}

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let retry = strategy("test_retry");
    let calls = AtomicUsize::new(0);
    let _ = retry
        .execute(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(std::io::Error::other("retryable failure"))
            } else {
                Ok(())
            }
        })
        .await;

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");
    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "result", "success");
}

#[tokio::test]
#[serial]
async fn retry_outcome_labels() {
    init_recorder();

    let retry = strategy("outcome_retry");
    let _ = retry
        .execute(|| async { Err::<(), _>(std::io::Error::other("retryable failure")) })
        .await;
    let _ = retry
        .execute(|| async { Err::<(), _>(std::io::Error::other("fatal failure")) })
        .await;

    assert_metric_has_label("retry_calls_total", "retry", "outcome_retry");
    assert_metric_has_label("retry_calls_total", "result", "exhausted");
    assert_metric_has_label("retry_calls_total", "result", "ignored");
}
