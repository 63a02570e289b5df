use callguard_core::ResilienceError;

/// The circuit is open and not yet eligible for a probe call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker '{name}' is open; call not permitted")]
pub struct CircuitOpenError {
    /// Resource name of the breaker that rejected the call.
    pub name: String,
}

impl<E> From<CircuitOpenError> for ResilienceError<E> {
    fn from(err: CircuitOpenError) -> Self {
        ResilienceError::CircuitOpen { name: err.name }
    }
}
