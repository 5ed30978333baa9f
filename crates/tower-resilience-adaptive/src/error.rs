//! Errors returned by the adaptive concurrency limiter.

use std::fmt;
use tower_resilience_core::ResilienceError;

/// Errors that can occur when a service is wrapped in [`crate::AdaptiveLimiterLayer`].
#[derive(Debug, Clone)]
pub enum AdaptiveLimiterError<E> {
    /// The wait queue was already at `queue_factor * limit` when this call
    /// arrived, or `max_wait` elapsed before a slot opened up.
    LimitExceeded {
        /// The limiter's current concurrency limit.
        limit: usize,
    },

    /// A [`Prioritizer`](tower_resilience_core::Prioritizer) shared with this
    /// limiter rejected the call because its priority sat below the current
    /// rejection threshold.
    PriorityRejected,

    /// Error from the inner service.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for AdaptiveLimiterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdaptiveLimiterError::LimitExceeded { limit } => {
                write!(f, "adaptive concurrency limit exceeded (limit {})", limit)
            }
            AdaptiveLimiterError::PriorityRejected => {
                write!(f, "rejected by shared prioritizer threshold")
            }
            AdaptiveLimiterError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AdaptiveLimiterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdaptiveLimiterError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> AdaptiveLimiterError<E> {
    /// Returns `true` if the call was rejected for lack of concurrency budget.
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, AdaptiveLimiterError::LimitExceeded { .. })
    }

    /// Returns `true` if the call was rejected by a shared prioritizer.
    pub fn is_priority_rejected(&self) -> bool {
        matches!(self, AdaptiveLimiterError::PriorityRejected)
    }
}

impl<E> From<AdaptiveLimiterError<E>> for ResilienceError<E> {
    fn from(err: AdaptiveLimiterError<E>) -> Self {
        match err {
            AdaptiveLimiterError::LimitExceeded { limit } => ResilienceError::LimitExceeded { limit },
            AdaptiveLimiterError::PriorityRejected => ResilienceError::ThrottleExceeded,
            AdaptiveLimiterError::Inner(e) => ResilienceError::Application(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err: AdaptiveLimiterError<std::io::Error> = AdaptiveLimiterError::LimitExceeded { limit: 10 };
        assert_eq!(err.to_string(), "adaptive concurrency limit exceeded (limit 10)");
    }

    #[test]
    fn converts_to_resilience_error() {
        let err: AdaptiveLimiterError<std::io::Error> = AdaptiveLimiterError::PriorityRejected;
        let resilience: ResilienceError<std::io::Error> = err.into();
        assert!(resilience.is_throttle_exceeded());
    }
}
