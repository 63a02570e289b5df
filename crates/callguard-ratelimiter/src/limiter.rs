use crate::config::RateLimiterConfig;
use crate::error::RateLimitExceededError;
use crate::events::RateLimiterEvent;
use callguard_core::ResilienceError;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Point-in-time snapshot of a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterMetrics {
    /// Tokens currently in the bucket (fractional).
    pub available_tokens: f64,
    /// Bucket capacity.
    pub max_tokens: usize,
    /// Tokens added per second.
    pub refill_rate: f64,
}

/// Bucket state. Refilled lazily; no timer runs in the background.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    tokens: f64,
    capacity: f64,
    // tokens per second
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(capacity: usize, rate: f64) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token, or returns how long until one is available.
    pub(crate) fn try_take(&mut self) -> Result<f64, Duration> {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(self.tokens)
        } else {
            let nanos = ((1.0 - self.tokens) / self.rate * 1e9).ceil();
            Err(Duration::from_nanos(nanos as u64))
        }
    }

    pub(crate) fn available(&mut self) -> f64 {
        self.refill(Instant::now());
        self.tokens
    }
}

/// Token-bucket admission gate for one resource.
///
/// Cloning is cheap and clones share the bucket.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
    config: Arc<RateLimiterConfig>,
}

impl RateLimiter {
    /// Creates a limiter whose bucket starts full.
    pub fn new(config: RateLimiterConfig) -> Self {
        crate::layer::describe_metrics();

        let bucket = TokenBucket::new(config.burst_size, config.refill_rate());
        Self {
            bucket: Arc::new(Mutex::new(bucket)),
            config: Arc::new(config),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resource name of this limiter.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration this limiter was built from.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Takes a token if one is available. Never waits.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceededError> {
        let outcome = self.lock().try_take();
        let config = &self.config;

        match outcome {
            Ok(remaining) => {
                config.event_listeners.emit(&RateLimiterEvent::PermitAcquired {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    remaining: remaining as usize,
                });

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => config.name.clone(), "result" => "permitted").increment(1);

                #[cfg(feature = "tracing")]
                tracing::trace!(ratelimiter = %config.name, remaining, "rate limiter permit acquired");

                Ok(())
            }
            Err(retry_after) => {
                config.event_listeners.emit(&RateLimiterEvent::PermitRejected {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    retry_after,
                });

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => config.name.clone(), "result" => "rejected").increment(1);

                #[cfg(feature = "tracing")]
                tracing::debug!(ratelimiter = %config.name, ?retry_after, "rate limit exceeded");

                Err(RateLimitExceededError {
                    name: config.name.clone(),
                    retry_after,
                })
            }
        }
    }

    /// Runs `operation` if a token is available.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;
        operation().await.map_err(ResilienceError::Application)
    }

    /// Tokens currently in the bucket, after refilling.
    pub fn available_tokens(&self) -> f64 {
        self.lock().available()
    }

    /// Returns a snapshot of the bucket.
    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            available_tokens: self.available_tokens(),
            max_tokens: self.config.burst_size,
            refill_rate: self.config.refill_rate(),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.config.name)
            .field("bucket", &*self.lock())
            .finish()
    }
}
