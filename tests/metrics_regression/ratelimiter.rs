//! Rate limiter metrics regression tests

use super::helpers::*;
use callguard_ratelimiter::{RateLimiter, RateLimiterConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn ratelimiter_metrics_exist() {
    init_recorder();

    let limiter = RateLimiter::new(
        RateLimiterConfig::builder()
            .name("test_ratelimiter")
            .max_requests(2)
            .window(Duration::from_secs(60))
            .build()
            .unwrap(),
    );

    for _ in 0..3 {
        let _ = limiter.try_acquire();
    }

    assert_counter_exists("ratelimiter_calls_total");
    assert_metric_has_label("ratelimiter_calls_total", "ratelimiter", "test_ratelimiter");
    assert_metric_has_label("ratelimiter_calls_total", "result", "permitted");
    assert_metric_has_label("ratelimiter_calls_total", "result", "rejected");
}
