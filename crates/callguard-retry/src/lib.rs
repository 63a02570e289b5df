//! Retry strategy for outbound calls.
//!
//! A [`RetryStrategy`] runs an operation up to `max_attempts` times. After a
//! failed attempt `i` (0-indexed) whose error the [`ErrorClassifier`] deems
//! retryable, it sleeps
//!
//! ```text
//! exponential = min(initial_delay * backoff_multiplier^i, max_delay)
//! delay       = exponential + exponential * jitter_factor * random[0, 1)
//! ```
//!
//! Jitter only ever lengthens the delay. Non-retryable errors are returned
//! at once; after the last attempt the last error is returned unchanged.
//!
//! # Example
//!
//! ```rust
//! use callguard_retry::{RetryConfig, RetryStrategy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let retry = RetryStrategy::new(
//!     RetryConfig::builder()
//!         .name("embeddings")
//!         .max_attempts(4)
//!         .initial_delay(Duration::from_millis(200))
//!         .retryable_error_patterns(["timeout", "503"])
//!         .build()
//!         .unwrap(),
//! );
//!
//! let body = retry
//!     .execute(|| async { Ok::<_, std::io::Error>("vector") })
//!     .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod classifier;
mod config;
mod events;

pub use classifier::ErrorClassifier;
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Runs an operation with retries. Holds no per-call state.
#[derive(Clone, Debug)]
pub struct RetryStrategy {
    config: Arc<RetryConfig>,
}

impl RetryStrategy {
    /// Creates a strategy from a validated configuration.
    pub fn new(config: RetryConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "retry_calls_total",
                "Total number of retried operations by final result"
            );
            describe_counter!(
                "retry_attempts_total",
                "Total number of retry attempts (excludes the first attempt)"
            );
        });

        Self {
            config: Arc::new(config),
        }
    }

    /// Configuration this strategy was built from.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns whether `error` should be retried.
    pub fn is_retryable<E>(&self, error: &E) -> bool
    where
        E: Error + 'static,
    {
        self.config.classifier.is_retryable(error)
    }

    /// Pre-jitter delay after the failed attempt `attempt` (0-indexed).
    pub fn base_delay(&self, attempt: usize) -> Duration {
        backoff::exponential(
            self.config.initial_delay,
            self.config.backoff_multiplier,
            self.config.max_delay,
            attempt,
        )
    }

    /// Delay actually slept after the failed attempt `attempt`, jitter
    /// included. Always at least [`base_delay`](Self::base_delay).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let sample = if self.config.jitter_factor > 0.0 {
            rand::random::<f64>()
        } else {
            0.0
        };
        backoff::with_jitter(self.base_delay(attempt), self.config.jitter_factor, sample)
    }

    /// Runs `operation`, retrying retryable failures.
    ///
    /// `operation` is invoked once per attempt and must build a fresh future
    /// each time. Dropping the returned future between attempts abandons the
    /// remaining attempts.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let config = &self.config;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    config.event_listeners.emit(&RetryEvent::Success {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt + 1,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success").increment(1);

                    return Ok(value);
                }
                Err(error) => {
                    if !self.is_retryable(&error) {
                        config.event_listeners.emit(&RetryEvent::IgnoredError {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::debug!(retry = %config.name, attempt, error = %error, "error is not retryable");

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "ignored").increment(1);

                        return Err(error);
                    }

                    if attempt + 1 >= config.max_attempts {
                        config.event_listeners.emit(&RetryEvent::Exhausted {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::warn!(retry = %config.name, attempts = attempt + 1, error = %error, "retries exhausted");

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted").increment(1);

                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    config.event_listeners.emit(&RetryEvent::Retry {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %config.name, attempt, ?delay, "retrying after failure");

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
