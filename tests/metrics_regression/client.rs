//! Composed client metrics regression tests

use super::helpers::*;
use callguard::ResilientClient;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn client_call_results_are_labelled() {
    init_recorder();

    let client = ResilientClient::builder("test_client")
        .rate_limiter(|rl| rl.max_requests(2).window(Duration::from_secs(60)))
        .retry(|r| r.max_attempts(1))
        .build()
        .unwrap();

    client.execute(|| async { Ok::<_, std::io::Error>(()) }).await.unwrap();
    let _ = client
        .execute(|| async { Err::<(), _>(std::io::Error::other("failure")) })
        .await;
    let _ = client.execute(|| async { Ok::<_, std::io::Error>(()) }).await;

    assert_counter_exists("client_calls_total");
    assert_metric_has_label("client_calls_total", "client", "test_client");
    assert_metric_has_label("client_calls_total", "result", "success");
    assert_metric_has_label("client_calls_total", "result", "failure");
    assert_metric_has_label("client_calls_total", "result", "rate_limited");

    // every component carries the client's name
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_client");
    assert_metric_has_label("bulkhead_calls_permitted_total", "bulkhead", "test_client");
    assert_metric_has_label("ratelimiter_calls_total", "ratelimiter", "test_client");
}
