use std::fmt;
use tower_resilience_core::ResilienceError;

/// Errors that can occur when using the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterError<E> {
    /// The rate limit was exceeded and no permit could be acquired within the timeout.
    RateLimitExceeded,

    /// Error from the inner service.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for RateLimiterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterError::RateLimitExceeded => write!(f, "rate limit exceeded"),
            RateLimiterError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RateLimiterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateLimiterError::RateLimitExceeded => None,
            RateLimiterError::Inner(e) => Some(e),
        }
    }
}

impl<E> RateLimiterError<E> {
    /// Returns `true` if this is a `RateLimitExceeded` error.
    pub fn is_rate_limit_exceeded(&self) -> bool {
        matches!(self, RateLimiterError::RateLimitExceeded)
    }
}

// Conversion to ResilienceError for zero-boilerplate error handling
impl<E> From<RateLimiterError<E>> for ResilienceError<E> {
    fn from(err: RateLimiterError<E>) -> Self {
        match err {
            RateLimiterError::RateLimitExceeded => ResilienceError::RateLimited { retry_after: None },
            RateLimiterError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
