//! Plain-data settings for a whole stack, loadable from configuration files.
//!
//! Durations are whole milliseconds. With the `serde` feature the settings
//! deserialize from camelCase keys, and every missing key falls back to the
//! component default:
//!
//! ```json
//! {
//!   "circuitBreaker": { "failureThreshold": 3, "timeoutMs": 30000 },
//!   "rateLimiter": { "maxRequests": 50, "windowMs": 60000, "burstSize": 60 },
//!   "retry": { "maxAttempts": 4, "retryableErrorPatterns": ["timeout", "503"] }
//! }
//! ```

use crate::client::ResilientClientBuilder;
use callguard_core::ConfigError;
use callguard_pool::PoolConfig;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct CircuitBreakerSettings {
    /// Failures within the monitoring period that open the circuit.
    pub failure_threshold: usize,
    /// Consecutive successful probes that close a half-open circuit.
    pub success_threshold: usize,
    /// Milliseconds the circuit stays open before a probe.
    pub timeout_ms: u64,
    /// Trailing window, in milliseconds, over which failures are counted.
    pub monitoring_period_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            monitoring_period_ms: 120_000,
        }
    }
}

/// Bulkhead settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct BulkheadSettings {
    /// Calls allowed to run at once.
    pub max_concurrent: usize,
    /// Callers allowed to wait for a slot.
    pub max_queue: usize,
    /// Milliseconds a queued caller waits before giving up.
    pub queue_timeout_ms: u64,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue: 100,
            queue_timeout_ms: 30_000,
        }
    }
}

/// Rate limiter settings. `burst_size` defaults to `max_requests`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct RateLimiterSettings {
    /// Requests admitted per window.
    pub max_requests: usize,
    /// Refill window in milliseconds.
    pub window_ms: u64,
    /// Bucket capacity.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub burst_size: Option<usize>,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            max_requests: 50,
            window_ms: 1_000,
            burst_size: None,
        }
    }
}

/// Retry settings. Without `retryable_error_patterns` every error is
/// retryable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the base delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the base delay, in `[0, 1]`.
    pub jitter_factor: f64,
    /// Case-insensitive substrings that mark an error retryable.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub retryable_error_patterns: Option<Vec<String>>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            retryable_error_patterns: None,
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PoolSettings {
    /// Maximum open connections.
    pub connections: usize,
    /// Milliseconds allowed to establish a connection.
    pub connect_timeout_ms: u64,
    /// Milliseconds allowed to read a response body.
    pub body_timeout_ms: u64,
    /// Milliseconds an idle connection stays reusable.
    pub keep_alive_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            connections: 10,
            connect_timeout_ms: 10_000,
            body_timeout_ms: 300_000,
            keep_alive_timeout_ms: 4_000,
        }
    }
}

/// Settings for every component of a stack.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ResilienceSettings {
    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerSettings,
    /// Bulkhead settings.
    pub bulkhead: BulkheadSettings,
    /// Rate limiter settings.
    pub rate_limiter: RateLimiterSettings,
    /// Retry settings.
    pub retry: RetrySettings,
    /// Connection pool settings.
    pub pool: PoolSettings,
}

impl ResilienceSettings {
    /// Returns a client builder for `name` preloaded with these settings.
    ///
    /// Nothing is validated until [`ResilientClientBuilder::build`].
    pub fn client_builder(&self, name: impl Into<String>) -> ResilientClientBuilder {
        let cb = self.circuit_breaker.clone();
        let bh = self.bulkhead.clone();
        let rl = self.rate_limiter.clone();
        let retry = self.retry.clone();

        ResilientClientBuilder::new(name)
            .circuit_breaker(|b| {
                b.failure_threshold(cb.failure_threshold)
                    .success_threshold(cb.success_threshold)
                    .timeout(Duration::from_millis(cb.timeout_ms))
                    .monitoring_period(Duration::from_millis(cb.monitoring_period_ms))
            })
            .bulkhead(|b| {
                b.max_concurrent(bh.max_concurrent)
                    .max_queue(bh.max_queue)
                    .queue_timeout(Duration::from_millis(bh.queue_timeout_ms))
            })
            .rate_limiter(|b| {
                let b = b
                    .max_requests(rl.max_requests)
                    .window(Duration::from_millis(rl.window_ms));
                match rl.burst_size {
                    Some(burst) => b.burst_size(burst),
                    None => b,
                }
            })
            .retry(|b| {
                let b = b
                    .max_attempts(retry.max_attempts)
                    .initial_delay(Duration::from_millis(retry.initial_delay_ms))
                    .max_delay(Duration::from_millis(retry.max_delay_ms))
                    .backoff_multiplier(retry.backoff_multiplier)
                    .jitter_factor(retry.jitter_factor);
                match retry.retryable_error_patterns {
                    Some(patterns) => b.retryable_error_patterns(patterns),
                    None => b,
                }
            })
    }

    /// Builds the pool configuration for `name`.
    pub fn pool_config(&self, name: impl Into<String>) -> Result<PoolConfig, ConfigError> {
        PoolConfig::builder()
            .name(name)
            .connections(self.pool.connections)
            .connect_timeout(Duration::from_millis(self.pool.connect_timeout_ms))
            .body_timeout(Duration::from_millis(self.pool.body_timeout_ms))
            .keep_alive_timeout(Duration::from_millis(self.pool.keep_alive_timeout_ms))
            .build()
    }
}
