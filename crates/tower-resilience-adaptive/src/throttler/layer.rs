//! Layer implementation for the adaptive throttler.

use crate::throttler::config::ThrottlerConfig;
use crate::throttler::service::AdaptiveThrottlerService;
use std::sync::Arc;
use tower_layer::Layer;

/// A Tower [`Layer`] that throttles calls client-side based on the EWMA of
/// requests versus accepts.
///
/// # Example
///
/// ```rust
/// use tower_resilience_adaptive::throttler::{AdaptiveThrottlerLayer, ThrottlerConfig};
/// use tower::ServiceBuilder;
///
/// # fn my_service() -> impl tower::Service<(), Response = (), Error = std::convert::Infallible, Future = std::future::Ready<Result<(), std::convert::Infallible>>> + Clone {
/// #     tower::service_fn(|_: ()| std::future::ready(Ok(())))
/// # }
/// let layer = AdaptiveThrottlerLayer::new(
///     ThrottlerConfig::builder().k(2.0).max_rejection_rate(0.9).build()
/// );
///
/// let service = ServiceBuilder::new().layer(layer).service(my_service());
/// ```
#[derive(Clone)]
pub struct AdaptiveThrottlerLayer {
    config: Arc<ThrottlerConfig>,
}

impl AdaptiveThrottlerLayer {
    /// Creates a new throttler layer from the given configuration.
    pub fn new(config: ThrottlerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AdaptiveThrottlerLayer {
    type Service = AdaptiveThrottlerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AdaptiveThrottlerService::new(service, Arc::clone(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_is_cloneable() {
        let layer = AdaptiveThrottlerLayer::new(ThrottlerConfig::builder().build());
        let _ = layer.clone();
    }
}
