//! Bulkhead metrics regression tests

use super::helpers::*;
use callguard_bulkhead::{Bulkhead, BulkheadConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn bulkhead_metrics_exist() {
    init_recorder();

    let bulkhead = Bulkhead::new(
        BulkheadConfig::builder()
            .name("test_bulkhead")
            .max_concurrent(1)
            .max_queue(0)
            .build()
            .unwrap(),
    );

    bulkhead.call(|| async { Ok::<_, std::io::Error>(()) }).await.unwrap();
    let _ = bulkhead
        .call(|| async { Err::<(), _>(std::io::Error::other("failure")) })
        .await;

    let held = bulkhead.try_acquire().unwrap();
    assert!(bulkhead.try_acquire().is_err());
    drop(held);

    assert_counter_exists("bulkhead_calls_permitted_total");
    assert_metric_has_label("bulkhead_calls_permitted_total", "bulkhead", "test_bulkhead");
    assert_counter_exists("bulkhead_calls_rejected_total");
    assert_counter_exists("bulkhead_calls_finished_total");
    assert_counter_exists("bulkhead_calls_failed_total");
    assert_gauge_exists("bulkhead_concurrent_calls");
    assert_metric_has_label("bulkhead_concurrent_calls", "bulkhead", "test_bulkhead");
}

#[tokio::test]
#[serial]
async fn bulkhead_queue_timeout_metric() {
    init_recorder();

    let bulkhead = Bulkhead::new(
        BulkheadConfig::builder()
            .name("timeout_bulkhead")
            .max_concurrent(1)
            .queue_timeout(Duration::from_millis(10))
            .build()
            .unwrap(),
    );

    let _held = bulkhead.acquire().await.unwrap();
    assert!(bulkhead.acquire().await.is_err());

    assert_counter_exists("bulkhead_queue_timeouts_total");
    assert_metric_has_label(
        "bulkhead_queue_timeouts_total",
        "bulkhead",
        "timeout_bulkhead",
    );
}
