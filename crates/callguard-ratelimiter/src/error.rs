use callguard_core::ResilienceError;
use std::time::Duration;

/// The bucket had no token for this call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded for '{name}', retry after {retry_after:?}")]
pub struct RateLimitExceededError {
    /// Resource name of the limiter.
    pub name: String,
    /// Time until one token is available again.
    pub retry_after: Duration,
}

impl<E> From<RateLimitExceededError> for ResilienceError<E> {
    fn from(err: RateLimitExceededError) -> Self {
        ResilienceError::RateLimitExceeded {
            name: err.name,
            retry_after: err.retry_after,
        }
    }
}
