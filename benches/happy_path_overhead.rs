use callguard::ResilientClient;
use callguard_bulkhead::{Bulkhead, BulkheadConfig};
use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
use callguard_pool::{factory_fn, ConnectionPool, PoolConfig};
use callguard_ratelimiter::{RateLimiter, RateLimiterConfig};
use callguard_retry::{RetryConfig, RetryStrategy};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use tower::{service_fn, Layer, Service, ServiceExt};

#[derive(Clone, Debug)]
struct TestError;

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test error")
    }
}

impl std::error::Error for TestError {}

async fn operation(value: u64) -> Result<u64, TestError> {
    Ok(value)
}

fn unlimited() -> RateLimiterConfig {
    RateLimiterConfig::builder()
        .max_requests(1_000_000_000)
        .window(Duration::from_secs(1))
        .build()
        .unwrap()
}

fn bench_baseline(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("baseline_no_protection", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(operation(black_box(42)).await) });
    });
}

fn bench_circuit_breaker(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().build().unwrap());

    c.bench_function("circuitbreaker_closed", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(breaker.call(|| operation(black_box(42))).await)
        });
    });
}

fn bench_circuit_breaker_layer(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let layer = CircuitBreakerLayer::new(CircuitBreakerConfig::builder().build().unwrap());

    c.bench_function("circuitbreaker_layer_closed", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut service = layer.layer(service_fn(operation));
            let response = service
                .ready()
                .await
                .unwrap()
                .call(black_box(42))
                .await;
            black_box(response)
        });
    });
}

fn bench_bulkhead(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let bulkhead = Bulkhead::new(
        BulkheadConfig::builder()
            .max_concurrent(100)
            .build()
            .unwrap(),
    );

    c.bench_function("bulkhead_slots_available", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(bulkhead.call(|| operation(black_box(42))).await)
        });
    });
}

fn bench_rate_limiter(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let limiter = RateLimiter::new(unlimited());

    c.bench_function("ratelimiter_tokens_available", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(limiter.call(|| operation(black_box(42))).await)
        });
    });
}

fn bench_retry(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let retry = RetryStrategy::new(RetryConfig::builder().max_attempts(3).build().unwrap());

    c.bench_function("retry_no_retries_needed", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(retry.execute(|| operation(black_box(42))).await)
        });
    });
}

fn bench_pool_checkout(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pool = ConnectionPool::new(
        factory_fn(|| async { Ok::<_, std::io::Error>(()) }),
        PoolConfig::builder().build().unwrap(),
    );

    c.bench_function("pool_checkout_reused", |b| {
        b.to_async(&runtime).iter(|| async {
            let connection = pool.checkout().await.unwrap();
            black_box(connection.is_reused())
        });
    });
}

fn bench_full_client(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let client = ResilientClient::builder("bench")
        .rate_limiter(|rl| rl.max_requests(1_000_000_000))
        .build()
        .unwrap();

    c.bench_function("client_all_components", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(client.execute(|| operation(black_box(42))).await)
        });
    });
}

criterion_group!(
    benches,
    bench_baseline,
    bench_circuit_breaker,
    bench_circuit_breaker_layer,
    bench_bulkhead,
    bench_rate_limiter,
    bench_retry,
    bench_pool_checkout,
    bench_full_client
);
criterion_main!(benches);
