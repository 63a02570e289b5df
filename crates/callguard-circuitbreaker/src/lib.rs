//! Per-resource circuit breaker for outbound calls.
//!
//! The breaker tracks failures of calls to one named resource and fast-fails
//! further calls once that resource is known to be unhealthy.
//!
//! - **Closed**: calls pass. Each failure is timestamped; when the number of
//!   failures inside the trailing `monitoring_period` reaches
//!   `failure_threshold`, the circuit opens.
//! - **Open**: calls are rejected with [`CircuitOpenError`] without running.
//!   Once `timeout` has elapsed since the circuit opened, the next call is
//!   admitted as a probe and the circuit becomes half-open.
//! - **HalfOpen**: one probe at a time. `success_threshold` consecutive
//!   successful probes close the circuit; any failure reopens it.
//!
//! # Examples
//!
//! ```rust
//! use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("inventory")
//!         .failure_threshold(3)
//!         .timeout(Duration::from_secs(30))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let result = breaker
//!     .call(|| async { Ok::<_, std::io::Error>("in stock") })
//!     .await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```
//!
//! Manual bookkeeping is available for callers that cannot hand over a
//! closure:
//!
//! ```rust
//! use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().build().unwrap());
//! if breaker.try_acquire().is_ok() {
//!     // ... perform the call ...
//!     breaker.record_success();
//! }
//! ```

use crate::circuit::Circuit;
use callguard_core::ResilienceError;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitOpenError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
mod config;
mod error;
mod events;
mod layer;

/// A circuit breaker guarding calls to one named resource.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        layer::describe_metrics();

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            inner: Arc::new(Inner {
                circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
                state_atomic,
                config,
            }),
        }
    }

    /// Resource name of this breaker.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Configuration this breaker was built from.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.inner
            .circuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks for permission to make one call.
    ///
    /// When this returns `Ok`, the caller must report the outcome with
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        self.admit().map(|_| ())
    }

    fn admit(&self) -> Result<u64, CircuitOpenError> {
        let config = &self.inner.config;

        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = %config.name, "checking circuit breaker admission");

        match self.lock().try_acquire(config) {
            Some(generation) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %config.name, "circuit breaker permitted call");
                Ok(generation)
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %config.name, "circuit breaker rejected call");
                Err(CircuitOpenError {
                    name: config.name.clone(),
                })
            }
        }
    }

    /// Records a successful call.
    ///
    /// The outcome is attributed to the current state. Calls made through
    /// [`call`](Self::call) are tracked from admission instead, so a slow call
    /// finishing after the circuit has moved on never decides a probe.
    pub fn record_success(&self) {
        let mut circuit = self.lock();
        let generation = circuit.generation();
        circuit.record_success(&self.inner.config, generation);
    }

    /// Records a failed call. Attributed to the current state, like
    /// [`record_success`](Self::record_success).
    pub fn record_failure(&self) {
        let mut circuit = self.lock();
        let generation = circuit.generation();
        circuit.record_failure(&self.inner.config, generation);
    }

    /// Runs `operation` if the circuit admits it, recording its outcome.
    ///
    /// Every `Err` returned by the operation counts as one failure. When the
    /// circuit rejects the call the operation is never invoked. An outcome
    /// arriving after the circuit has changed state updates the counters but
    /// never triggers a transition or frees the half-open probe slot.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admitted_in = self.admit()?;

        let mut guard = OutcomeGuard {
            breaker: self,
            admitted_in,
            recorded: false,
        };
        let result = operation().await;
        guard.recorded = true;

        let config = &self.inner.config;
        match &result {
            Ok(_) => self.lock().record_success(config, admitted_in),
            Err(_) => self.lock().record_failure(config, admitted_in),
        }

        result.map_err(ResilienceError::Application)
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.inner.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.lock().metrics(&self.inner.config)
    }

    /// Forces the circuit closed and clears its failure history.
    pub fn reset(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.inner.config.name, "circuit breaker reset");

        self.lock().reset(&self.inner.config);
    }

    /// Forces the circuit open, starting a fresh open period.
    pub fn force_open(&self) {
        self.lock().force_open(&self.inner.config);
    }

    /// Returns "healthy" when closed, "degraded" when half-open and
    /// "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.config.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Frees the half-open probe slot if the call future is dropped before its
/// outcome is recorded.
struct OutcomeGuard<'a> {
    breaker: &'a CircuitBreaker,
    admitted_in: u64,
    recorded: bool,
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.lock().abandon(self.admitted_in);
        }
    }
}
