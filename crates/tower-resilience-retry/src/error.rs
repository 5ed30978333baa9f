//! Error types for the retry middleware.

use std::fmt;
use tower_resilience_core::ResilienceError;

/// Error type for the retry service.
#[derive(Debug, Clone)]
pub enum RetryError<E> {
    /// Retries were exhausted, either because `maxAttempts` was reached or
    /// because the `maxDuration` wall-clock budget elapsed.
    ///
    /// Returned instead of the last inner error unless `return_last_failure`
    /// is set on the builder.
    RetriesExceeded {
        /// The error from the final attempt.
        last_error: E,
        /// Total number of attempts made (including the initial attempt).
        attempts: usize,
    },

    /// The abort predicate matched, forcing a terminal failure without
    /// consuming a retry attempt.
    Aborted(E),

    /// A retry was skipped because the retry budget was exhausted.
    BudgetExceeded(E),

    /// Error from the inner service, surfaced directly (non-retryable error,
    /// or `return_last_failure` was set).
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::RetriesExceeded {
                last_error,
                attempts,
            } => write!(f, "retries exceeded after {} attempts: {}", attempts, last_error),
            RetryError::Aborted(e) => write!(f, "retry aborted: {}", e),
            RetryError::BudgetExceeded(e) => write!(f, "retry budget exceeded: {}", e),
            RetryError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::RetriesExceeded { last_error, .. } => Some(last_error),
            RetryError::Aborted(e) => Some(e),
            RetryError::BudgetExceeded(e) => Some(e),
            RetryError::Inner(e) => Some(e),
        }
    }
}

impl<E> RetryError<E> {
    /// Returns `true` if this is a `RetriesExceeded` error.
    pub fn is_retries_exceeded(&self) -> bool {
        matches!(self, RetryError::RetriesExceeded { .. })
    }

    /// Returns `true` if the abort predicate forced this failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, RetryError::Aborted(_))
    }

    /// Returns `true` if the retry budget caused this failure.
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, RetryError::BudgetExceeded(_))
    }

    /// Returns a reference to the wrapped inner error.
    pub fn inner(&self) -> &E {
        match self {
            RetryError::RetriesExceeded { last_error, .. } => last_error,
            RetryError::Aborted(e) => e,
            RetryError::BudgetExceeded(e) => e,
            RetryError::Inner(e) => e,
        }
    }

    /// Consumes this error, returning the wrapped inner error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::RetriesExceeded { last_error, .. } => last_error,
            RetryError::Aborted(e) => e,
            RetryError::BudgetExceeded(e) => e,
            RetryError::Inner(e) => e,
        }
    }
}

// Conversion to ResilienceError for zero-boilerplate error handling.
impl<E> From<RetryError<E>> for ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::RetriesExceeded { attempts, .. } => {
                ResilienceError::RetriesExceeded { attempts }
            }
            RetryError::BudgetExceeded(_) => ResilienceError::BudgetExceeded,
            RetryError::Aborted(e) => ResilienceError::Application(e),
            RetryError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
