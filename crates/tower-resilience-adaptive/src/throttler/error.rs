//! Errors returned by the adaptive throttler.

use std::fmt;
use tower_resilience_core::ResilienceError;

/// Errors that can occur when a service is wrapped in
/// [`crate::throttler::AdaptiveThrottlerLayer`].
#[derive(Debug, Clone)]
pub enum ThrottlerError<E> {
    /// The call was rejected by the computed rejection probability.
    ThrottleExceeded,

    /// A shared [`Prioritizer`](tower_resilience_core::Prioritizer) rejected
    /// the call because its priority sat below the rejection threshold.
    PriorityRejected,

    /// Error from the inner service.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ThrottlerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottlerError::ThrottleExceeded => write!(f, "throttled by adaptive rejection probability"),
            ThrottlerError::PriorityRejected => write!(f, "rejected by shared prioritizer threshold"),
            ThrottlerError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottlerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThrottlerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> ThrottlerError<E> {
    /// Returns `true` if the call was throttled by the rejection probability.
    pub fn is_throttle_exceeded(&self) -> bool {
        matches!(self, ThrottlerError::ThrottleExceeded)
    }

    /// Returns `true` if the call was rejected by a shared prioritizer.
    pub fn is_priority_rejected(&self) -> bool {
        matches!(self, ThrottlerError::PriorityRejected)
    }
}

impl<E> From<ThrottlerError<E>> for ResilienceError<E> {
    fn from(err: ThrottlerError<E>) -> Self {
        match err {
            ThrottlerError::ThrottleExceeded | ThrottlerError::PriorityRejected => {
                ResilienceError::ThrottleExceeded
            }
            ThrottlerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err: ThrottlerError<std::io::Error> = ThrottlerError::ThrottleExceeded;
        assert_eq!(err.to_string(), "throttled by adaptive rejection probability");
    }
}
