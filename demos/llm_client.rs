//! Resilient client for a flaky LLM provider
//!
//! Calls a simulated provider through `ResilientClient` and shows each way a
//! call can be turned away: retries absorbing transient failures, the
//! circuit opening after repeated failures, and the rate limiter refusing a
//! burst.
//!
//! Run with: cargo run --example llm_client

use callguard::pool::{factory_fn, ConnectionPool, PoolConfig, PoolError};
use callguard::{ResilienceError, ResilientClient};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
enum ProviderError {
    /// 503 from the provider
    Overloaded,
    /// 400 from the provider
    BadPrompt,
    /// Could not get a connection
    Transport(PoolError),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Overloaded => write!(f, "503 overloaded"),
            ProviderError::BadPrompt => write!(f, "400 bad prompt"),
            ProviderError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<PoolError> for ProviderError {
    fn from(e: PoolError) -> Self {
        ProviderError::Transport(e)
    }
}

/// Simulated HTTP connection to the provider.
struct Connection {
    id: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_target(false)
        .init();

    let client = ResilientClient::builder("llm-provider")
        .rate_limiter(|rl| rl.max_requests(50).window(Duration::from_secs(60)).burst_size(8))
        .bulkhead(|b| b.max_concurrent(4).max_queue(8))
        .circuit_breaker(|cb| {
            cb.failure_threshold(3)
                .timeout(Duration::from_secs(2))
                .on_state_transition(|from, to| {
                    println!("  [breaker] {} -> {}", from.as_str(), to.as_str());
                })
        })
        .retry(|r| {
            r.max_attempts(3)
                .initial_delay(Duration::from_millis(50))
                .retryable_error_patterns(["503", "timed out"])
                .on_retry(|attempt, delay| {
                    println!("  [retry] attempt {} failed, waiting {:?}", attempt + 1, delay);
                })
        })
        .build()
        .expect("valid client configuration");

    let opened = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&opened);
    let pool = ConnectionPool::new(
        factory_fn(move || {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, std::io::Error>(Connection { id }) }
        }),
        PoolConfig::builder()
            .name("llm-provider")
            .connections(4)
            .build()
            .expect("valid pool configuration"),
    );
    let client = client.with_pool(pool);

    println!("1. Transient 503 absorbed by retry");
    let failures = AtomicU32::new(0);
    let result = client
        .execute_with_connection(|conn| {
            let failed_before = failures.fetch_add(1, Ordering::SeqCst);
            async move {
                if failed_before < 2 {
                    Err(ProviderError::Overloaded)
                } else {
                    Ok(format!("completion via connection {}", conn.id))
                }
            }
        })
        .await;
    println!("  result: {:?}\n", result.map_err(|e| e.to_string()));

    println!("2. Repeated bad prompts open the circuit");
    for i in 0..4 {
        let result = client
            .execute(|| async { Err::<String, _>(ProviderError::BadPrompt) })
            .await;
        match result {
            Err(ResilienceError::CircuitOpen { name }) => {
                println!("  call {}: rejected, circuit '{}' is open", i + 1, name)
            }
            Err(e) => println!("  call {}: failed: {}", i + 1, e),
            Ok(_) => println!("  call {}: ok", i + 1),
        }
    }
    println!("  metrics: {:?}\n", client.metrics().circuit_breaker);

    println!("3. Circuit recovers after its timeout");
    tokio::time::sleep(Duration::from_secs(2)).await;
    let result = client
        .execute(|| async { Ok::<_, ProviderError>("probe ok") })
        .await;
    println!("  result: {:?}\n", result.map_err(|e| e.to_string()));

    println!("4. Burst beyond the rate limit");
    let mut limited = 0;
    for _ in 0..10 {
        let result = client
            .execute(|| async { Ok::<_, ProviderError>(()) })
            .await;
        if let Err(ResilienceError::RateLimitExceeded { retry_after, .. }) = result {
            limited += 1;
            println!("  rate limited, retry after {:?}", retry_after);
        }
    }
    println!("  {} of 10 calls rate limited", limited);

    let pool = client.pool().metrics();
    println!(
        "\nPool: {} created, {} reused, {} idle",
        pool.created_total, pool.reused_total, pool.idle
    );
}
