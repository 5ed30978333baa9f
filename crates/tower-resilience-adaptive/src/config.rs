//! Shared configuration for the adaptive limiter, independent of which
//! [`ConcurrencyAlgorithm`](crate::ConcurrencyAlgorithm) drives the limit.

use crate::events::AdaptiveLimiterEvent;
use std::sync::Arc;
use std::time::Duration;
use tower_resilience_core::events::{EventListeners, FnListener};
use tower_resilience_core::Prioritizer;

/// Bounds how many callers may wait for a permit once the limit is saturated,
/// and how the limiter cooperates with a shared [`Prioritizer`].
#[derive(Clone)]
pub struct AdaptiveConfig {
    pub(crate) name: String,
    /// Waiters beyond `queue_factor * limit` are rejected immediately with
    /// `LimitExceeded` instead of joining the queue. `None` means unbounded.
    pub(crate) queue_factor: Option<f64>,
    /// Maximum time a call may wait for a permit once queued.
    pub(crate) max_wait: Option<Duration>,
    /// Shared prioritizer consulted before a call is queued; below-threshold
    /// callers are rejected without spending a queue slot.
    pub(crate) prioritizer: Option<Arc<Prioritizer>>,
    pub(crate) event_listeners: EventListeners<AdaptiveLimiterEvent>,
}

impl AdaptiveConfig {
    /// Creates a builder with unbounded queueing and no prioritizer.
    pub fn builder() -> AdaptiveConfigBuilder {
        AdaptiveConfigBuilder::new()
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfigBuilder::new().build()
    }
}

/// Builder for [`AdaptiveConfig`].
pub struct AdaptiveConfigBuilder {
    name: String,
    queue_factor: Option<f64>,
    max_wait: Option<Duration>,
    prioritizer: Option<Arc<Prioritizer>>,
    event_listeners: EventListeners<AdaptiveLimiterEvent>,
}

impl AdaptiveConfigBuilder {
    /// Creates a new builder with default values: unbounded queue, no max
    /// wait (blocks until admitted), no prioritizer.
    pub fn new() -> Self {
        Self {
            name: "adaptive_limiter".to_string(),
            queue_factor: None,
            max_wait: None,
            prioritizer: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this limiter instance, used in events and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bounds the wait queue to `queue_factor * limit` waiters; beyond that,
    /// calls are rejected immediately with `LimitExceeded` rather than queued.
    pub fn queue_factor(mut self, queue_factor: f64) -> Self {
        self.queue_factor = Some(queue_factor);
        self
    }

    /// Bounds how long a call may wait for a permit once admitted to the queue.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Shares a [`Prioritizer`] with this limiter. Calls whose
    /// [`Priority`](tower_resilience_core::Priority) sits below the
    /// prioritizer's rejection threshold are rejected before queueing.
    pub fn prioritizer(mut self, prioritizer: Arc<Prioritizer>) -> Self {
        self.prioritizer = Some(prioritizer);
        self
    }

    /// Registers a callback invoked when a call is rejected for lack of
    /// queue capacity or because `max_wait` elapsed.
    pub fn on_limit_exceeded<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdaptiveLimiterEvent::LimitExceeded { limit, .. } = event {
                f(*limit);
            }
        }));
        self
    }

    /// Registers a callback invoked when a shared prioritizer rejects a call.
    pub fn on_priority_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdaptiveLimiterEvent::PriorityRejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> AdaptiveConfig {
        AdaptiveConfig {
            name: self.name,
            queue_factor: self.queue_factor,
            max_wait: self.max_wait,
            prioritizer: self.prioritizer,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for AdaptiveConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
