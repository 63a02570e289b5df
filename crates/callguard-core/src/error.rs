//! The unified error type returned by a composed resilience stack.
//!
//! Each pattern crate has its own narrow error type (`CircuitOpenError`,
//! `BulkheadError`, `RateLimitExceededError`) and converts into
//! [`ResilienceError`] with a `From` impl, so a caller of the composed client
//! matches on one enum:
//!
//! ```rust
//! use callguard_core::ResilienceError;
//!
//! # #[derive(Debug)]
//! # struct ApiError;
//! # impl std::fmt::Display for ApiError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "api") }
//! # }
//! fn handle(error: ResilienceError<ApiError>) {
//!     match error {
//!         ResilienceError::CircuitOpen { name } => {
//!             eprintln!("{name} is unhealthy, serving cached data");
//!         }
//!         ResilienceError::BulkheadFull { .. } | ResilienceError::BulkheadQueueTimeout { .. } => {
//!             eprintln!("too many in-flight calls");
//!         }
//!         ResilienceError::RateLimitExceeded { retry_after, .. } => {
//!             eprintln!("slow down, retry after {retry_after:?}");
//!         }
//!         ResilienceError::Application(e) => eprintln!("call failed: {e}"),
//!     }
//! }
//! ```
//!
//! Admission rejections (everything except [`ResilienceError::Application`])
//! happen before the operation runs and are never retried by the stack.

use std::time::Duration;

/// Error returned by a composed resilience stack.
///
/// `E` is the operation's own error type. It is carried unchanged in
/// [`ResilienceError::Application`]; no layer rewrites or swallows it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResilienceError<E> {
    /// The circuit breaker is open and not yet eligible for a probe.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Resource name of the breaker.
        name: String,
    },

    /// The bulkhead queue was already at capacity.
    #[error("bulkhead '{name}' is full (queue capacity {max_queue})")]
    BulkheadFull {
        /// Resource name of the bulkhead.
        name: String,
        /// Configured queue capacity.
        max_queue: usize,
    },

    /// The call waited in the bulkhead queue past its timeout.
    #[error("bulkhead '{name}' queue wait timed out after {waited:?}")]
    BulkheadQueueTimeout {
        /// Resource name of the bulkhead.
        name: String,
        /// How long the call waited before giving up.
        waited: Duration,
    },

    /// The rate limiter had no tokens available.
    #[error("rate limit exceeded for '{name}', retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Resource name of the rate limiter.
        name: String,
        /// Time until the next token becomes available.
        retry_after: Duration,
    },

    /// The operation itself failed (after any retries).
    #[error("{0}")]
    Application(E),
}

impl<E> ResilienceError<E> {
    /// Returns `true` if the circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns `true` if the bulkhead queue was full.
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, ResilienceError::BulkheadFull { .. })
    }

    /// Returns `true` if the call timed out waiting in the bulkhead queue.
    pub fn is_queue_timeout(&self) -> bool {
        matches!(self, ResilienceError::BulkheadQueueTimeout { .. })
    }

    /// Returns `true` if the rate limiter rejected the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimitExceeded { .. })
    }

    /// Returns `true` if the operation itself failed.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Returns `true` for any rejection raised before the operation ran.
    pub fn is_admission_rejection(&self) -> bool {
        !self.is_application()
    }

    /// Extracts the operation's error, if this is an `Application` variant.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation's error using a function.
    ///
    /// ```
    /// use callguard_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("boom".to_string());
    /// let mapped: ResilienceError<usize> = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(4));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadFull { name, max_queue } => {
                ResilienceError::BulkheadFull { name, max_queue }
            }
            ResilienceError::BulkheadQueueTimeout { name, waited } => {
                ResilienceError::BulkheadQueueTimeout { name, waited }
            }
            ResilienceError::RateLimitExceeded { name, retry_after } => {
                ResilienceError::RateLimitExceeded { name, retry_after }
            }
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

impl<E> ResilienceError<ResilienceError<E>> {
    /// Collapses a rejection raised by an inner layer into the outer error.
    ///
    /// Stacking two components (a bulkhead around a breaker, say) yields a
    /// nested error; the inner rejection is surfaced as-is.
    pub fn flatten(self) -> ResilienceError<E> {
        match self {
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadFull { name, max_queue } => {
                ResilienceError::BulkheadFull { name, max_queue }
            }
            ResilienceError::BulkheadQueueTimeout { name, waited } => {
                ResilienceError::BulkheadQueueTimeout { name, waited }
            }
            ResilienceError::RateLimitExceeded { name, retry_after } => {
                ResilienceError::RateLimitExceeded { name, retry_after }
            }
            ResilienceError::Application(inner) => inner,
        }
    }
}
