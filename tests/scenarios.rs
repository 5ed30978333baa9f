//! End-to-end policy-stack scenarios.
//!
//! These mirror the pipeline's documented end-to-end behavior one policy
//! (or a small composed stack) at a time: an attempt counter plus the
//! outermost error/value the executor hands back. They complement each
//! crate's own unit tests, which exercise a single policy in isolation;
//! these exercise the same shapes a caller actually sees when policies are
//! stacked with `ServiceBuilder`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

use tower_resilience_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError};
use tower_resilience_hedge::HedgeLayer;
use tower_resilience_ratelimiter::{RateLimiterConfig, RateLimiterError};
use tower_resilience_retry::{RetryConfig, RetryError};
use tower_resilience_timelimiter::{TimeLimiterConfig, TimeLimiterError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectingError;

impl std::fmt::Display for ConnectingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connecting")
    }
}

impl std::error::Error for ConnectingError {}

/// S1: retry succeeds after two failures, attempts and executions both land
/// on 3 (nothing in this bare stack short-circuits an attempt before it
/// reaches the user operation).
#[tokio::test]
async fn retry_succeeds_after_two_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let svc = tower::service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= 2 {
                Err(ConnectingError)
            } else {
                Ok(true)
            }
        }
    });

    let layer = RetryConfig::<(), ConnectingError>::builder()
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(1))
        .build();
    let mut service = layer.layer(svc);

    let result = service.ready().await.unwrap().call(()).await;
    assert_eq!(result, Ok(true));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// S2: a timeout shorter than the inner sleep returns `Timeout` and the
/// inner call is never awaited past the deadline.
#[tokio::test]
async fn timeout_exceeded_returns_within_slack() {
    let svc = tower::service_fn(|_req: ()| async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok::<_, ConnectingError>(())
    });

    let layer = TimeLimiterConfig::<()>::builder()
        .timeout_duration(Duration::from_millis(100))
        .build();
    let mut service = layer.layer(svc);

    let start = std::time::Instant::now();
    let result = service.ready().await.unwrap().call(()).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(TimeLimiterError::Timeout)));
    assert!(
        elapsed < Duration::from_millis(400),
        "timeout should fire well before the inner sleep completes, took {elapsed:?}"
    );
}

/// S3: once the circuit opens, the third call is rejected without the
/// inner service ever being invoked, and the rejection carries a
/// `remaining_delay` bounded by the configured open-state delay.
#[tokio::test]
async fn circuit_opens_and_rejects_without_calling_inner() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let svc = tower::service_fn(move |would_succeed: bool| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            if would_succeed {
                Ok::<_, ConnectingError>(())
            } else {
                Err(ConnectingError)
            }
        }
    });

    let layer = CircuitBreakerConfig::<(), ConnectingError>::builder()
        .minimum_number_of_calls(2)
        .sliding_window_size(2)
        .failure_rate_threshold(0.5)
        .wait_duration_in_open(Duration::from_secs(10))
        .build();
    let mut service = layer.layer(svc);

    assert!(service.ready().await.unwrap().call(false).await.is_err());
    assert!(service.ready().await.unwrap().call(false).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Circuit is now open; a call that *would* succeed is still rejected
    // and the inner service is not invoked a third time.
    let result = service.ready().await.unwrap().call(true).await;
    match result {
        Err(CircuitBreakerError::OpenCircuit { remaining_delay }) => {
            assert!(remaining_delay > Duration::ZERO);
            assert!(remaining_delay <= Duration::from_secs(10));
        }
        other => panic!("expected OpenCircuit, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2, "inner must not be called while open");
}

/// S4: retry over a rate limiter whose period permits are exhausted after a
/// few inner calls. Every attempt, whether it reaches the limiter's inner
/// service or is rejected, counts toward `max_attempts`; only the permitted
/// ones reach the user operation.
#[tokio::test]
async fn retry_over_exhausted_rate_limiter_stops_calling_inner() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let svc = tower::service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ConnectingError)
        }
    });

    let limiter = RateLimiterConfig::builder()
        .limit_for_period(3)
        .refresh_period(Duration::from_secs(60))
        .timeout_duration(Duration::ZERO)
        .build();
    let limited = limiter.layer(svc);

    let retry = RetryConfig::<(), RateLimiterError<ConnectingError>>::builder()
        .max_attempts(7)
        .fixed_backoff(Duration::from_millis(1))
        .build();
    let mut service = retry.layer(limited);

    let result = service.ready().await.unwrap().call(()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3, "only the permitted attempts reach the user op");
    match result {
        Err(RetryError::RetriesExceeded { attempts, last_error }) => {
            assert_eq!(attempts, 7);
            assert!(matches!(last_error, RateLimiterError::RateLimitExceeded));
        }
        other => panic!("expected RetriesExceeded wrapping RateLimitExceeded, got {other:?}"),
    }
}

/// S6: cache hit - the first call is a miss that stores the value; the
/// second call with the same key returns the stored value without
/// re-invoking the inner service.
#[tokio::test]
async fn cache_hit_skips_inner_on_second_call() {
    use tower_resilience_cache::CacheConfig;

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let svc = tower::service_fn(move |req: String| {
        let c = Arc::clone(&c);
        async move {
            let n = c.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ConnectingError>(if n == 0 { "v1".to_string() } else { "v2".to_string() })
        }
    });

    let cache = CacheConfig::<String, String>::builder()
        .max_size(10)
        .key_extractor(|req: &String| req.clone())
        .build();
    let mut service = cache.layer(svc);

    let first = service.ready().await.unwrap().call("k".to_string()).await.unwrap();
    assert_eq!(first, "v1");

    let second = service.ready().await.unwrap().call("k".to_string()).await.unwrap();
    assert_eq!(second, "v1", "second call must observe the cached value, not a fresh v2");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "inner must only be called once");
}

/// S5: a hedge with a cancel predicate fires two backups at `delay`
/// intervals while the primary is still outstanding; the third attempt
/// (the second hedge) returns a value the predicate accepts immediately,
/// so it wins the race well before the slow primary/first-hedge would
/// have returned.
#[tokio::test]
async fn hedge_cancel_predicate_picks_the_fast_winning_attempt() {
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let launched = Arc::clone(&attempt_count);
    let svc = tower::service_fn(move |_req: ()| {
        let launched = Arc::clone(&launched);
        async move {
            let attempt = launched.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, ConnectingError>(attempt)
            } else {
                Ok::<_, ConnectingError>(3)
            }
        }
    });

    let layer = HedgeLayer::builder()
        .delay(Duration::from_millis(10))
        .max_hedged_attempts(3)
        .cancel_if(|result: &Result<usize, ConnectingError>| matches!(result, Ok(v) if *v == 3))
        .build();
    let mut service = layer.layer(svc);

    let start = std::time::Instant::now();
    let result = service.ready().await.unwrap().call(()).await;
    let elapsed = start.elapsed();

    assert_eq!(result.unwrap(), 3);
    assert!(
        elapsed < Duration::from_millis(90),
        "the winning hedge should return well before the 100ms slow attempts, took {elapsed:?}"
    );
    // Give the slow background attempts time to finish incrementing the
    // counter so the assertion below isn't racy.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        3,
        "primary plus both hedges must all have been launched"
    );
}

/// S7 (nested timeouts): an outer timeout shorter than an inner retry loop's
/// total budget fires first; the inner retry, observing the outer
/// cancellation on its next attempt, does not schedule another delay or
/// issue another inner call once the outer deadline has passed.
#[tokio::test]
async fn outer_timeout_bounds_an_inner_retry_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let svc = tower::service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(60)).await;
            Err::<(), _>(ConnectingError)
        }
    });

    let retry = RetryConfig::<(), ConnectingError>::builder()
        .max_attempts(50)
        .fixed_backoff(Duration::from_millis(10))
        .build();
    let retried = retry.layer(svc);

    let outer_timeout = TimeLimiterConfig::<()>::builder()
        .timeout_duration(Duration::from_millis(200))
        .build();
    let mut service = outer_timeout.layer(retried);

    let start = std::time::Instant::now();
    let result = service.ready().await.unwrap().call(()).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(TimeLimiterError::Timeout)));
    assert!(
        elapsed < Duration::from_millis(500),
        "the outer deadline should win well before all 50 retry attempts complete, took {elapsed:?}"
    );
    // Only a handful of attempts fit in the outer window; the retry loop
    // does not run to its own cap of 50.
    assert!(calls.load(Ordering::SeqCst) < 50);
}
