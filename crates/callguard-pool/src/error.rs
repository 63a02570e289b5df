use std::time::Duration;

/// Boxed error returned by a connection factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the connection pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Opening a new connection took longer than `connect_timeout`.
    #[error("connect timed out after {timeout:?}")]
    ConnectTimeout {
        /// The configured connect timeout.
        timeout: Duration,
    },
    /// The factory failed to open a connection.
    #[error("failed to open connection: {0}")]
    Connect(#[source] BoxError),
    /// Reading a response body took longer than `body_timeout`.
    #[error("body read timed out after {timeout:?}")]
    BodyTimeout {
        /// The configured body timeout.
        timeout: Duration,
    },
    /// The pool was closed.
    #[error("connection pool is closed")]
    Closed,
}

impl PoolError {
    /// Returns `true` for the two timeout variants.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PoolError::ConnectTimeout { .. } | PoolError::BodyTimeout { .. }
        )
    }
}
