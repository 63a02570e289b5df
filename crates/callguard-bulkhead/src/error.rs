//! Error types for the bulkhead.

use callguard_core::ResilienceError;
use std::time::Duration;

/// Errors raised when the bulkhead does not admit a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// All slots are busy and the waiting queue is at capacity.
    #[error("bulkhead '{name}' is full: waiting queue ({max_queue}) at capacity")]
    Full {
        /// Resource name of the bulkhead.
        name: String,
        /// Configured queue capacity.
        max_queue: usize,
    },
    /// The call waited in the queue longer than the configured timeout.
    #[error("bulkhead '{name}' queue wait timed out after {waited:?}")]
    QueueTimeout {
        /// Resource name of the bulkhead.
        name: String,
        /// How long the call waited.
        waited: Duration,
    },
}

impl<E> From<BulkheadError> for ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::Full { name, max_queue } => {
                ResilienceError::BulkheadFull { name, max_queue }
            }
            BulkheadError::QueueTimeout { name, waited } => {
                ResilienceError::BulkheadQueueTimeout { name, waited }
            }
        }
    }
}
