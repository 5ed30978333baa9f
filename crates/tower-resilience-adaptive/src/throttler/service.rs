//! Service implementation for the adaptive (client-side) throttler.

use crate::throttler::config::ThrottlerConfig;
use crate::throttler::error::ThrottlerError;
use crate::throttler::events::ThrottlerEvent;
use crate::throttler::ewma::EwmaCounter;
use futures::future::BoxFuture;
use rand::Rng;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower_resilience_core::execution::ExecutionContext;
use tower_resilience_core::PrioritizedMember;
use tower_service::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Load probe registered with a shared [`tower_resilience_core::Prioritizer`]:
/// reports the throttler's own current rejection probability.
struct LoadProbe {
    requests: Arc<EwmaCounter>,
    accepts: Arc<EwmaCounter>,
    k: f64,
}

impl PrioritizedMember for LoadProbe {
    fn load(&self) -> f64 {
        rejection_probability(self.requests.value(), self.accepts.value(), self.k, 1.0)
    }
}

fn rejection_probability(requests: f64, accepts: f64, k: f64, max_rate: f64) -> f64 {
    let raw = (requests - k * accepts) / (requests + 1.0);
    raw.max(0.0).min(max_rate)
}

/// A [`tower::Service`] that throttles calls client-side based on the EWMA of
/// requests versus accepts, per Google's SRE-book client throttling formula.
pub struct AdaptiveThrottlerService<S> {
    inner: S,
    requests: Arc<EwmaCounter>,
    accepts: Arc<EwmaCounter>,
    config: Arc<ThrottlerConfig>,
    _load_probe: Arc<LoadProbe>,
}

impl<S> AdaptiveThrottlerService<S> {
    /// Create a new throttler service wrapping `service`.
    pub fn new(service: S, config: Arc<ThrottlerConfig>) -> Self {
        let requests = Arc::new(EwmaCounter::new(config.window));
        let accepts = Arc::new(EwmaCounter::new(config.window));
        let load_probe = Arc::new(LoadProbe {
            requests: Arc::clone(&requests),
            accepts: Arc::clone(&accepts),
            k: config.k,
        });
        if let Some(prioritizer) = &config.prioritizer {
            prioritizer.register(Arc::downgrade(&load_probe) as std::sync::Weak<dyn PrioritizedMember>);
        }
        Self {
            inner: service,
            requests,
            accepts,
            config,
            _load_probe: load_probe,
        }
    }

    /// The throttler's current rejection probability, `[0.0, max_rejection_rate]`.
    pub fn rejection_probability(&self) -> f64 {
        rejection_probability(
            self.requests.value(),
            self.accepts.value(),
            self.config.k,
            self.config.max_rejection_rate,
        )
    }
}

impl<S: Clone> Clone for AdaptiveThrottlerService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            requests: Arc::clone(&self.requests),
            accepts: Arc::clone(&self.accepts),
            config: Arc::clone(&self.config),
            _load_probe: Arc::clone(&self._load_probe),
        }
    }
}

impl<S, Req> Service<Req> for AdaptiveThrottlerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = ThrottlerError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottlerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let requests = Arc::clone(&self.requests);
        let accepts = Arc::clone(&self.accepts);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(prioritizer) = &config.prioritizer {
                let priority = ExecutionContext::try_current()
                    .map(|ctx| ctx.priority())
                    .unwrap_or_default();
                if !prioritizer.admits(priority) {
                    let event = ThrottlerEvent::PriorityRejected {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                    };
                    config.event_listeners.emit(&event);
                    return Err(ThrottlerError::PriorityRejected);
                }
            }

            let requests_value = requests.record();
            let probability = rejection_probability(
                requests_value,
                accepts.value(),
                config.k,
                config.max_rejection_rate,
            );

            #[cfg(feature = "metrics")]
            gauge!("adaptive_throttler_rejection_probability", "throttler" => config.name.clone())
                .set(probability);

            if probability > 0.0 && rand::rng().random::<f64>() < probability {
                let event = ThrottlerEvent::Throttled {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    probability,
                };
                config.event_listeners.emit(&event);

                #[cfg(feature = "metrics")]
                counter!("adaptive_throttler_throttled_total", "throttler" => config.name.clone())
                    .increment(1);

                return Err(ThrottlerError::ThrottleExceeded);
            }

            let event = ThrottlerEvent::Accepted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                probability,
            };
            config.event_listeners.emit(&event);

            let result = inner.call(req).await;
            if result.is_ok() {
                accepts.record();
            }
            result.map_err(ThrottlerError::Inner)
        })
    }
}
