use callguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadConfigBuilder, BulkheadMetrics};
use callguard_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitMetrics,
};
use callguard_core::{ConfigError, ResilienceError};
use callguard_pool::{ConnectionFactory, ConnectionPool, PoolError, PooledConnection};
use callguard_ratelimiter::{
    RateLimiter, RateLimiterConfig, RateLimiterConfigBuilder, RateLimiterMetrics,
};
use callguard_retry::{RetryConfig, RetryConfigBuilder, RetryStrategy};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::error::Error;
use std::future::Future;

/// Read-only snapshot of every component guarding one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMetrics {
    /// Circuit breaker state and counters.
    pub circuit_breaker: CircuitMetrics,
    /// Bulkhead occupancy.
    pub bulkhead: BulkheadMetrics,
    /// Rate limiter bucket.
    pub rate_limiter: RateLimiterMetrics,
}

/// Rate limiter, bulkhead, circuit breaker and retry strategy guarding calls
/// to one named resource.
///
/// Every call passes the components in a fixed order:
///
/// ```text
/// RateLimiter -> Bulkhead -> CircuitBreaker -> RetryStrategy -> operation
/// ```
///
/// The breaker wraps the whole retry loop, so one logical call counts once
/// toward its thresholds however many attempts it took. Cloning is cheap and
/// clones share all state.
#[derive(Clone)]
pub struct ResilientClient {
    name: String,
    rate_limiter: RateLimiter,
    bulkhead: Bulkhead,
    circuit_breaker: CircuitBreaker,
    retry: RetryStrategy,
}

impl ResilientClient {
    /// Starts building a client for the resource `name`.
    pub fn builder(name: impl Into<String>) -> ResilientClientBuilder {
        ResilientClientBuilder::new(name)
    }

    /// Assembles a client from already-configured components.
    pub fn from_configs(
        name: impl Into<String>,
        rate_limiter: RateLimiterConfig,
        bulkhead: BulkheadConfig,
        circuit_breaker: CircuitBreakerConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            name: name.into(),
            rate_limiter: RateLimiter::new(rate_limiter),
            bulkhead: Bulkhead::new(bulkhead),
            circuit_breaker: CircuitBreaker::new(circuit_breaker),
            retry: RetryStrategy::new(retry),
        }
    }

    /// Resource name this client guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client's rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The client's bulkhead.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    /// The client's circuit breaker.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// The client's retry strategy.
    pub fn retry(&self) -> &RetryStrategy {
        &self.retry
    }

    /// Runs `operation` through the full stack.
    ///
    /// `operation` is invoked once per retry attempt. Admission rejections
    /// are returned before it is invoked at all and are never retried.
    ///
    /// ```rust
    /// use callguard::ResilientClient;
    ///
    /// # async fn example() {
    /// let client = ResilientClient::builder("search-api").build().unwrap();
    ///
    /// match client.execute(|| async { Ok::<_, std::io::Error>("results") }).await {
    ///     Ok(body) => println!("{body}"),
    ///     Err(e) if e.is_admission_rejection() => println!("serving cached results: {e}"),
    ///     Err(e) => println!("search failed: {e}"),
    /// }
    /// # }
    /// ```
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        if let Err(rejected) = self.rate_limiter.try_acquire() {
            self.record_outcome("rate_limited");
            return Err(rejected.into());
        }

        let result = self
            .bulkhead
            .call(|| self.circuit_breaker.call(|| self.retry.execute(operation)))
            .await
            .map_err(ResilienceError::flatten);

        #[cfg(feature = "tracing")]
        if let Err(error) = &result {
            if error.is_admission_rejection() {
                tracing::debug!(client = %self.name, error = %error, "call rejected");
            }
        }

        self.record_outcome(match &result {
            Ok(_) => "success",
            Err(ResilienceError::Application(_)) => "failure",
            Err(ResilienceError::CircuitOpen { .. }) => "circuit_open",
            Err(ResilienceError::BulkheadFull { .. }) => "bulkhead_full",
            Err(ResilienceError::BulkheadQueueTimeout { .. }) => "queue_timeout",
            Err(ResilienceError::RateLimitExceeded { .. }) => "rate_limited",
        });

        result
    }

    fn record_outcome(&self, _result: &'static str) {
        #[cfg(feature = "metrics")]
        counter!("client_calls_total", "client" => self.name.clone(), "result" => _result)
            .increment(1);
    }

    /// Attaches a connection pool, for calls that need a transport handle.
    pub fn with_pool<P: ConnectionFactory>(self, pool: ConnectionPool<P>) -> PooledClient<P> {
        PooledClient { client: self, pool }
    }

    /// Returns a snapshot of every component. Never mutates state.
    pub fn metrics(&self) -> ClientMetrics {
        ClientMetrics {
            circuit_breaker: self.circuit_breaker.metrics(),
            bulkhead: self.bulkhead.metrics(),
            rate_limiter: self.rate_limiter.metrics(),
        }
    }

    /// Forces the circuit breaker closed and clears its failure history.
    pub fn reset(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!(client = %self.name, "resetting circuit breaker");

        self.circuit_breaker.reset();
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("name", &self.name)
            .field("rate_limiter", &self.rate_limiter)
            .field("bulkhead", &self.bulkhead)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("retry", &self.retry)
            .finish()
    }
}

/// A [`ResilientClient`] with a [`ConnectionPool`] underneath.
pub struct PooledClient<P: ConnectionFactory> {
    client: ResilientClient,
    pool: ConnectionPool<P>,
}

impl<P: ConnectionFactory> Clone for PooledClient<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<P: ConnectionFactory> PooledClient<P> {
    /// The wrapped client.
    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// The attached pool.
    pub fn pool(&self) -> &ConnectionPool<P> {
        &self.pool
    }

    /// Runs `operation` through the full stack with a pooled connection.
    ///
    /// A connection is checked out inside the retry loop, once per attempt,
    /// so a rejected call never touches the pool. Checkout failures convert
    /// into `E` and are classified like any other operation error.
    pub async fn execute_with_connection<F, Fut, T, E>(
        &self,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn(PooledConnection<P>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + From<PoolError> + 'static,
    {
        let pool = &self.pool;
        let operation = &operation;
        self.client
            .execute(move || async move {
                let connection = pool.checkout().await?;
                operation(connection).await
            })
            .await
    }

    /// Same as [`ResilientClient::execute`]; the operation gets no connection.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        self.client.execute(operation).await
    }

    /// See [`ResilientClient::metrics`].
    pub fn metrics(&self) -> ClientMetrics {
        self.client.metrics()
    }

    /// See [`ResilientClient::reset`].
    pub fn reset(&self) {
        self.client.reset();
    }
}

impl<P: ConnectionFactory> std::fmt::Debug for PooledClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledClient")
            .field("client", &self.client)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Builder for [`ResilientClient`].
///
/// Each component starts from its own defaults, named after the resource.
///
/// ```rust
/// use callguard::ResilientClient;
/// use std::time::Duration;
///
/// let client = ResilientClient::builder("llm-provider")
///     .circuit_breaker(|cb| cb.failure_threshold(3).timeout(Duration::from_secs(30)))
///     .bulkhead(|b| b.max_concurrent(8).max_queue(32))
///     .rate_limiter(|rl| rl.max_requests(50).window(Duration::from_secs(60)).burst_size(60))
///     .retry(|r| r.max_attempts(4).retryable_error_patterns(["timeout", "429", "503"]))
///     .build()
///     .unwrap();
/// # let _ = client;
/// ```
pub struct ResilientClientBuilder {
    name: String,
    rate_limiter: RateLimiterConfigBuilder,
    bulkhead: BulkheadConfigBuilder,
    circuit_breaker: CircuitBreakerConfigBuilder,
    retry: RetryConfigBuilder,
}

impl ResilientClientBuilder {
    /// Creates a builder for the resource `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            rate_limiter: RateLimiterConfig::builder().name(name.clone()),
            bulkhead: BulkheadConfig::builder().name(name.clone()),
            circuit_breaker: CircuitBreakerConfig::builder().name(name.clone()),
            retry: RetryConfig::builder().name(name.clone()),
            name,
        }
    }

    /// Adjusts the rate limiter configuration.
    pub fn rate_limiter(
        mut self,
        f: impl FnOnce(RateLimiterConfigBuilder) -> RateLimiterConfigBuilder,
    ) -> Self {
        self.rate_limiter = f(self.rate_limiter);
        self
    }

    /// Adjusts the bulkhead configuration.
    pub fn bulkhead(
        mut self,
        f: impl FnOnce(BulkheadConfigBuilder) -> BulkheadConfigBuilder,
    ) -> Self {
        self.bulkhead = f(self.bulkhead);
        self
    }

    /// Adjusts the circuit breaker configuration.
    pub fn circuit_breaker(
        mut self,
        f: impl FnOnce(CircuitBreakerConfigBuilder) -> CircuitBreakerConfigBuilder,
    ) -> Self {
        self.circuit_breaker = f(self.circuit_breaker);
        self
    }

    /// Adjusts the retry configuration.
    pub fn retry(mut self, f: impl FnOnce(RetryConfigBuilder) -> RetryConfigBuilder) -> Self {
        self.retry = f(self.retry);
        self
    }

    /// Validates every component configuration and builds the client.
    pub fn build(self) -> Result<ResilientClient, ConfigError> {
        let rate_limiter = self.rate_limiter.build()?;
        let bulkhead = self.bulkhead.build()?;
        let circuit_breaker = self.circuit_breaker.build()?;
        let retry = self.retry.build()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(client = %self.name, "resilient client built");

        Ok(ResilientClient::from_configs(
            self.name,
            rate_limiter,
            bulkhead,
            circuit_breaker,
            retry,
        ))
    }
}

impl std::fmt::Debug for ResilientClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClientBuilder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
