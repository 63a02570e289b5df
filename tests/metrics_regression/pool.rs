//! Connection pool metrics regression tests

use super::helpers::*;
use callguard_pool::{factory_fn, ConnectionPool, PoolConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn pool_metrics_exist() {
    init_recorder();

    let pool = ConnectionPool::new(
        factory_fn(|| async { Ok::<_, std::io::Error>(()) }),
        PoolConfig::builder()
            .name("test_pool")
            .connections(1)
            .build()
            .unwrap(),
    );

    drop(pool.checkout().await.unwrap());
    drop(pool.checkout().await.unwrap());

    assert_counter_exists("pool_connections_created_total");
    assert_metric_has_label("pool_connections_created_total", "pool", "test_pool");
    assert_counter_exists("pool_connections_reused_total");
    assert_gauge_exists("pool_connections_in_use");
    assert_metric_has_label("pool_connections_in_use", "pool", "test_pool");
}

#[tokio::test]
#[serial]
async fn pool_timeout_kinds() {
    init_recorder();

    let pool = ConnectionPool::new(
        factory_fn(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, std::io::Error>(())
        }),
        PoolConfig::builder()
            .name("slow_pool")
            .connect_timeout(Duration::from_millis(10))
            .body_timeout(Duration::from_millis(10))
            .build()
            .unwrap(),
    );

    assert!(pool.checkout().await.is_err());
    assert!(pool
        .with_body_timeout(tokio::time::sleep(Duration::from_secs(5)))
        .await
        .is_err());

    assert_counter_exists("pool_timeouts_total");
    assert_metric_has_label("pool_timeouts_total", "pool", "slow_pool");
    assert_metric_has_label("pool_timeouts_total", "kind", "connect");
    assert_metric_has_label("pool_timeouts_total", "kind", "body");
}
