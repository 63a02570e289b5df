//! Resilience stack for outbound calls to unreliable services.
//!
//! `callguard` composes four admission and recovery components around one
//! asynchronous operation, in a fixed order:
//!
//! 1. **Rate limiter**: token bucket, rejects at once when empty
//! 2. **Bulkhead**: caps concurrent calls, with a bounded FIFO queue
//! 3. **Circuit breaker**: fast-fails calls to a resource that keeps failing
//! 4. **Retry**: exponential backoff with additive jitter
//!
//! A [`ConnectionPool`](pool::ConnectionPool) can sit underneath for calls
//! that need a transport handle.
//!
//! Every component is also published as its own crate and re-exported here
//! as a module.
//!
//! # Example
//!
//! ```rust
//! use callguard::{ResilienceError, ResilientClient};
//! use std::time::Duration;
//!
//! # #[derive(Debug)]
//! # struct ApiError;
//! # impl std::fmt::Display for ApiError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("api") }
//! # }
//! # impl std::error::Error for ApiError {}
//! # async fn call_api() -> Result<String, ApiError> { Ok(String::new()) }
//! # async fn example() {
//! let client = ResilientClient::builder("payments-api")
//!     .circuit_breaker(|cb| cb.failure_threshold(3))
//!     .bulkhead(|b| b.max_concurrent(16).queue_timeout(Duration::from_secs(5)))
//!     .retry(|r| r.max_attempts(3).retryable_error_patterns(["timeout", "503"]))
//!     .build()
//!     .unwrap();
//!
//! match client.execute(call_api).await {
//!     Ok(body) => println!("{body}"),
//!     Err(ResilienceError::CircuitOpen { .. }) => println!("using cached balance"),
//!     Err(e) => println!("payment call failed: {e}"),
//! }
//! # }
//! ```

mod client;
mod registry;
pub mod settings;

pub use callguard_bulkhead as bulkhead;
pub use callguard_circuitbreaker as circuitbreaker;
pub use callguard_core as core;
pub use callguard_pool as pool;
pub use callguard_ratelimiter as ratelimiter;
pub use callguard_retry as retry;

pub use callguard_core::{ConfigError, ResilienceError};
pub use client::{ClientMetrics, PooledClient, ResilientClient, ResilientClientBuilder};
pub use registry::ClientRegistry;
pub use settings::ResilienceSettings;
