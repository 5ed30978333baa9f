//! Service implementation for adaptive concurrency limiting.

use crate::config::AdaptiveConfig;
use crate::error::AdaptiveLimiterError;
use crate::events::AdaptiveLimiterEvent;
use crate::ConcurrencyAlgorithm;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::Semaphore;
use tower_resilience_core::execution::ExecutionContext;
use tower_resilience_core::PrioritizedMember;
use tower_service::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Load probe registered with a shared [`tower_resilience_core::Prioritizer`]:
/// reports in-flight occupancy relative to the algorithm's current limit.
struct LoadProbe {
    in_flight: Arc<AtomicUsize>,
    current_limit: Arc<AtomicUsize>,
}

impl PrioritizedMember for LoadProbe {
    fn load(&self) -> f64 {
        let limit = self.current_limit.load(Ordering::Relaxed).max(1);
        self.in_flight.load(Ordering::Relaxed) as f64 / limit as f64
    }
}

/// A service that applies adaptive concurrency limiting.
///
/// This service dynamically adjusts the number of concurrent requests based
/// on observed latency and error rates. Once the algorithm's limit is
/// saturated, further calls queue (bounded by `queue_factor`, timed out by
/// `max_wait`) rather than being admitted unconditionally.
pub struct AdaptiveService<S, A> {
    inner: S,
    algorithm: Arc<A>,
    /// Current limit (tracked separately for dynamic adjustment)
    current_limit: Arc<AtomicUsize>,
    /// In-flight requests counter
    in_flight: Arc<AtomicUsize>,
    /// Calls currently waiting for a permit
    queued: Arc<AtomicUsize>,
    /// Semaphore for limiting concurrency
    semaphore: Arc<Semaphore>,
    config: Arc<AdaptiveConfig>,
    // Kept alive so the `Weak<dyn PrioritizedMember>` registered with the
    // shared prioritizer (if any) doesn't dangle.
    _load_probe: Arc<LoadProbe>,
}

impl<S, A> AdaptiveService<S, A>
where
    A: ConcurrencyAlgorithm,
{
    /// Create a new adaptive service with default (unbounded) queueing.
    pub fn new(service: S, algorithm: Arc<A>) -> Self {
        Self::with_config(service, algorithm, Arc::new(AdaptiveConfig::default()))
    }

    /// Create a new adaptive service with explicit queueing/prioritizer configuration.
    pub fn with_config(service: S, algorithm: Arc<A>, config: Arc<AdaptiveConfig>) -> Self {
        let initial_limit = algorithm.limit();
        let current_limit = Arc::new(AtomicUsize::new(initial_limit));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let load_probe = Arc::new(LoadProbe {
            in_flight: Arc::clone(&in_flight),
            current_limit: Arc::clone(&current_limit),
        });
        if let Some(prioritizer) = &config.prioritizer {
            prioritizer.register(Arc::downgrade(&load_probe) as std::sync::Weak<dyn PrioritizedMember>);
        }
        Self {
            inner: service,
            algorithm,
            current_limit,
            in_flight,
            queued: Arc::new(AtomicUsize::new(0)),
            semaphore: Arc::new(Semaphore::new(initial_limit)),
            config,
            _load_probe: load_probe,
        }
    }

    /// Get the current concurrency limit.
    pub fn limit(&self) -> usize {
        self.algorithm.limit()
    }

    /// Get the number of in-flight requests.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Get the number of calls currently queued for a permit.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Get a reference to the algorithm.
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    fn queue_capacity(&self) -> Option<usize> {
        self.config
            .queue_factor
            .map(|factor| ((self.algorithm.limit() as f64) * factor).ceil() as usize)
    }

    /// Syncs the semaphore's permit count to the algorithm's current limit,
    /// emitting `LimitChanged` when it moves.
    fn reconcile_limit(&self) {
        let algorithm_limit = self.algorithm.limit();
        let current = self.current_limit.swap(algorithm_limit, Ordering::AcqRel);
        if algorithm_limit == current {
            return;
        }
        if algorithm_limit > current {
            self.semaphore.add_permits(algorithm_limit - current);
        }
        // Shrinking the semaphore's permit count isn't directly supported;
        // the limit still governs admission via `current_limit`/`in_flight`
        // comparisons the algorithm consults when reporting its own limit.
        let event = AdaptiveLimiterEvent::LimitChanged {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            previous_limit: current,
            new_limit: algorithm_limit,
        };
        self.config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        gauge!("adaptive_limiter_limit", "limiter" => self.config.name.clone()).set(algorithm_limit as f64);
    }
}

impl<S, A> Clone for AdaptiveService<S, A>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            algorithm: Arc::clone(&self.algorithm),
            current_limit: Arc::clone(&self.current_limit),
            in_flight: Arc::clone(&self.in_flight),
            queued: Arc::clone(&self.queued),
            semaphore: Arc::clone(&self.semaphore),
            config: Arc::clone(&self.config),
            _load_probe: Arc::clone(&self._load_probe),
        }
    }
}

impl<S, A, Req> Service<Req> for AdaptiveService<S, A>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    A: ConcurrencyAlgorithm + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = AdaptiveLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(AdaptiveLimiterError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.reconcile_limit();

        let config = Arc::clone(&self.config);
        let algorithm = Arc::clone(&self.algorithm);
        let semaphore = Arc::clone(&self.semaphore);
        let in_flight = Arc::clone(&self.in_flight);
        let queued = Arc::clone(&self.queued);
        let current_limit = Arc::clone(&self.current_limit);
        let queue_capacity = self.queue_capacity();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(prioritizer) = &config.prioritizer {
                let priority = ExecutionContext::try_current()
                    .map(|ctx| ctx.priority())
                    .unwrap_or_default();
                if !prioritizer.admits(priority) {
                    let event = AdaptiveLimiterEvent::PriorityRejected {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                    };
                    config.event_listeners.emit(&event);
                    return Err(AdaptiveLimiterError::PriorityRejected);
                }
            }

            if let Some(capacity) = queue_capacity {
                if queued.load(Ordering::Acquire) >= capacity {
                    let event = AdaptiveLimiterEvent::LimitExceeded {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        limit: algorithm.limit(),
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    counter!("adaptive_limiter_rejected_total", "limiter" => config.name.clone())
                        .increment(1);

                    return Err(AdaptiveLimiterError::LimitExceeded {
                        limit: algorithm.limit(),
                    });
                }
            }

            queued.fetch_add(1, Ordering::AcqRel);
            if queued.load(Ordering::Acquire) > 1 {
                let event = AdaptiveLimiterEvent::CallQueued {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    queue_depth: queued.load(Ordering::Acquire),
                };
                config.event_listeners.emit(&event);
            }

            let acquire = semaphore.acquire_owned();
            let permit = match config.max_wait {
                Some(max_wait) => match tokio::time::timeout(max_wait, acquire).await {
                    Ok(Ok(permit)) => permit,
                    _ => {
                        queued.fetch_sub(1, Ordering::AcqRel);
                        let event = AdaptiveLimiterEvent::LimitExceeded {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            limit: algorithm.limit(),
                        };
                        config.event_listeners.emit(&event);
                        return Err(AdaptiveLimiterError::LimitExceeded {
                            limit: algorithm.limit(),
                        });
                    }
                },
                None => match acquire.await {
                    Ok(permit) => permit,
                    Err(_) => {
                        queued.fetch_sub(1, Ordering::AcqRel);
                        return Err(AdaptiveLimiterError::LimitExceeded {
                            limit: algorithm.limit(),
                        });
                    }
                },
            };
            queued.fetch_sub(1, Ordering::AcqRel);

            in_flight.fetch_add(1, Ordering::AcqRel);
            let start = Instant::now();
            let result = inner.call(req).await;
            let latency = start.elapsed();
            in_flight.fetch_sub(1, Ordering::AcqRel);
            drop(permit);

            match &result {
                Ok(_) => algorithm.record_success(latency),
                Err(_) => algorithm.record_failure(),
            }

            // Re-sync the semaphore if the algorithm moved the limit while
            // this call was in flight.
            let algorithm_limit = algorithm.limit();
            let current = current_limit.swap(algorithm_limit, Ordering::AcqRel);
            if algorithm_limit > current {
                semaphore.add_permits(algorithm_limit - current);
            }

            result.map_err(AdaptiveLimiterError::Inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Aimd;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_service_basic() {
        let service = tower::service_fn(|req: i32| async move { Ok::<_, &str>(req * 2) });

        let algorithm = Aimd::builder()
            .initial_limit(10)
            .latency_threshold(Duration::from_secs(1))
            .build();

        let mut service = AdaptiveService::new(service, Arc::new(algorithm));

        let response = service.ready().await.unwrap().call(21).await.unwrap();
        assert_eq!(response, 42);
    }

    #[tokio::test]
    async fn test_in_flight_tracking() {
        let service = tower::service_fn(|_req: ()| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, &str>(())
        });

        let algorithm = Aimd::builder().initial_limit(10).build();
        let service = AdaptiveService::new(service, Arc::new(algorithm));

        assert_eq!(service.in_flight(), 0);

        let mut svc = service.clone();
        let fut = svc.ready().await.unwrap().call(());
        assert_eq!(service.in_flight(), 1);

        let _ = fut.await;
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn bounded_queue_rejects_beyond_queue_factor() {
        let service = tower::service_fn(|_req: ()| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, std::convert::Infallible>(())
        });

        let algorithm = Arc::new(Aimd::builder().initial_limit(1).build());
        let config = Arc::new(AdaptiveConfig::builder().queue_factor(1.0).build());
        let service = AdaptiveService::with_config(service, algorithm, config);

        let mut first = service.clone();
        let mut second = service.clone();
        let mut third = service.clone();

        let first_call = first.ready().await.unwrap().call(());
        // Give the first call a moment to occupy the single permit.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second_call = second.ready().await.unwrap().call(());
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Queue capacity (limit=1 * queue_factor=1.0 -> 1) is already occupied
        // by `second_call`; a third concurrent call must be rejected.
        let third_result = third.ready().await.unwrap().call(()).await;
        assert!(matches!(
            third_result,
            Err(AdaptiveLimiterError::LimitExceeded { .. })
        ));

        first_call.await.unwrap();
        second_call.await.unwrap();
    }

    #[tokio::test]
    async fn max_wait_times_out_while_queued() {
        let service = tower::service_fn(|_req: ()| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, std::convert::Infallible>(())
        });

        let algorithm = Arc::new(Aimd::builder().initial_limit(1).build());
        let config = Arc::new(
            AdaptiveConfig::builder()
                .max_wait(Duration::from_millis(10))
                .build(),
        );
        let service = AdaptiveService::with_config(service, algorithm, config);

        let mut first = service.clone();
        let mut second = service.clone();

        let first_call = first.ready().await.unwrap().call(());
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second_result = second.ready().await.unwrap().call(()).await;
        assert!(matches!(
            second_result,
            Err(AdaptiveLimiterError::LimitExceeded { .. })
        ));

        first_call.await.unwrap();
    }

    #[tokio::test]
    async fn prioritizer_rejects_low_priority_callers_under_load() {
        use tower_resilience_core::{ExecutionContext, Prioritizer};

        let service = tower::service_fn(|_req: ()| async { Ok::<_, std::convert::Infallible>(()) });

        let prioritizer = Prioritizer::new();
        let algorithm = Arc::new(Aimd::builder().initial_limit(5).build());
        let config = Arc::new(
            AdaptiveConfig::builder()
                .prioritizer(Arc::clone(&prioritizer))
                .build(),
        );
        let mut service = AdaptiveService::with_config(service, algorithm, config);

        // Force the threshold to VeryHigh without needing real load.
        struct AlwaysHot;
        impl tower_resilience_core::PrioritizedMember for AlwaysHot {
            fn load(&self) -> f64 {
                1.0
            }
        }
        let hot = Arc::new(AlwaysHot);
        prioritizer.register(Arc::downgrade(&hot) as std::sync::Weak<dyn tower_resilience_core::PrioritizedMember>);
        prioritizer.recompute();

        let ctx = ExecutionContext::new().with_priority(tower_resilience_core::Priority::Low);
        let result = ctx
            .scope(async { service.ready().await.unwrap().call(()).await })
            .await;

        assert!(matches!(
            result,
            Err(AdaptiveLimiterError::PriorityRejected)
        ));
    }

    #[test]
    fn test_error_display() {
        let err: AdaptiveLimiterError<&str> = AdaptiveLimiterError::LimitExceeded { limit: 5 };
        assert_eq!(err.to_string(), "adaptive concurrency limit exceeded (limit 5)");

        let err: AdaptiveLimiterError<&str> = AdaptiveLimiterError::Inner("test error");
        assert!(err.to_string().contains("test error"));
    }
}
