//! Error types for the time limiter middleware.

use std::fmt;
use tower_resilience_core::ResilienceError;

/// Error type for the time limiter service.
#[derive(Debug, Clone)]
pub enum TimeLimiterError<E> {
    /// The inner call did not complete within the configured timeout.
    Timeout,

    /// Error from the inner service.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for TimeLimiterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLimiterError::Timeout => write!(f, "call timed out"),
            TimeLimiterError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeLimiterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeLimiterError::Timeout => None,
            TimeLimiterError::Inner(e) => Some(e),
        }
    }
}

impl<E> TimeLimiterError<E> {
    /// Returns `true` if this is a `Timeout` error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::Timeout)
    }

    /// Consumes this error, returning the wrapped inner error if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeLimiterError::Timeout => None,
            TimeLimiterError::Inner(e) => Some(e),
        }
    }
}

// Conversion to ResilienceError for zero-boilerplate error handling.
impl<E> From<TimeLimiterError<E>> for ResilienceError<E> {
    fn from(err: TimeLimiterError<E>) -> Self {
        match err {
            TimeLimiterError::Timeout => ResilienceError::DeadlineExceeded,
            TimeLimiterError::Inner(e) => ResilienceError::Application(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error: TimeLimiterError<&str> = TimeLimiterError::Timeout;
        assert_eq!(error.to_string(), "call timed out");
    }

    #[test]
    fn test_is_timeout() {
        let error: TimeLimiterError<&str> = TimeLimiterError::Timeout;
        assert!(error.is_timeout());

        let error = TimeLimiterError::Inner("boom");
        assert!(!error.is_timeout());
        assert_eq!(error.into_inner(), Some("boom"));
    }
}
