use std::time::Duration;
use thiserror::Error;
use tower_resilience_core::ResilienceError;

/// Errors returned by the `CircuitBreaker` service.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; calls are not permitted.
    #[error("circuit is open; call not permitted for another {remaining_delay:?}")]
    OpenCircuit {
        /// How long until the circuit transitions to half-open and starts
        /// permitting trial calls again.
        remaining_delay: Duration,
    },

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// How long until the circuit transitions to half-open, if this error
    /// is an [`OpenCircuit`](CircuitBreakerError::OpenCircuit).
    pub fn remaining_delay(&self) -> Option<Duration> {
        match self {
            CircuitBreakerError::OpenCircuit { remaining_delay } => Some(*remaining_delay),
            CircuitBreakerError::Inner(_) => None,
        }
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(err: E) -> Self {
        CircuitBreakerError::Inner(err)
    }
}

// Conversion to ResilienceError for zero-boilerplate error handling.
impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { remaining_delay } => ResilienceError::CircuitOpen {
                name: None,
                remaining_delay: Some(remaining_delay),
            },
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
