use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// Determines whether an error should be retried or aborted.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Policy for retry behavior: backoff, retriable classification, and abort.
///
/// An abort predicate, when it matches, forces a terminal failure even if the
/// error would otherwise be classified as retriable - it takes precedence over
/// the retry predicate.
pub struct RetryPolicy<E> {
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
    pub(crate) abort_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// Creates a new retry policy using the given backoff strategy.
    ///
    /// By default all errors are retried and nothing aborts early.
    pub fn new(interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            interval_fn,
            retry_predicate: None,
            abort_predicate: None,
        }
    }

    /// Checks if the given error should be retried.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Checks if the given error forces a terminal failure regardless of
    /// retriable classification.
    pub fn should_abort(&self, error: &E) -> bool {
        match &self.abort_predicate {
            Some(predicate) => predicate(error),
            None => false,
        }
    }

    /// Computes the delay before the next retry attempt.
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::FixedInterval;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
        fatal: bool,
    }

    #[test]
    fn retry_all_by_default() {
        let policy: RetryPolicy<TestError> =
            RetryPolicy::new(Arc::new(FixedInterval::new(Duration::from_secs(1))));

        let error = TestError {
            retryable: false,
            fatal: false,
        };
        assert!(policy.should_retry(&error));
        assert!(!policy.should_abort(&error));
    }

    #[test]
    fn retry_predicate_filters() {
        let mut policy: RetryPolicy<TestError> =
            RetryPolicy::new(Arc::new(FixedInterval::new(Duration::from_secs(1))));
        policy.retry_predicate = Some(Arc::new(|e: &TestError| e.retryable));

        assert!(policy.should_retry(&TestError {
            retryable: true,
            fatal: false
        }));
        assert!(!policy.should_retry(&TestError {
            retryable: false,
            fatal: false
        }));
    }

    #[test]
    fn abort_predicate_forces_terminal_failure() {
        let mut policy: RetryPolicy<TestError> =
            RetryPolicy::new(Arc::new(FixedInterval::new(Duration::from_secs(1))));
        policy.retry_predicate = Some(Arc::new(|_: &TestError| true));
        policy.abort_predicate = Some(Arc::new(|e: &TestError| e.fatal));

        let fatal = TestError {
            retryable: true,
            fatal: true,
        };
        assert!(policy.should_retry(&fatal));
        assert!(policy.should_abort(&fatal));
    }

    #[test]
    fn backoff_computation() {
        let policy: RetryPolicy<TestError> =
            RetryPolicy::new(Arc::new(FixedInterval::new(Duration::from_secs(2))));

        assert_eq!(policy.next_backoff(0), Duration::from_secs(2));
        assert_eq!(policy.next_backoff(1), Duration::from_secs(2));
    }
}
