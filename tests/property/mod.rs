//! Property-based tests for callguard components.
//!
//! Run with: cargo test --test property_tests

pub mod bulkhead;
pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;

/// A current-thread runtime with a paused clock, so timing properties run
/// instantly and deterministically.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
