//! Configuration for the adaptive (client-side) throttler.

use crate::throttler::events::ThrottlerEvent;
use std::sync::Arc;
use std::time::Duration;
use tower_resilience_core::events::{EventListeners, FnListener};
use tower_resilience_core::Prioritizer;

/// Configuration for [`crate::throttler::AdaptiveThrottlerLayer`].
#[derive(Clone)]
pub struct ThrottlerConfig {
    pub(crate) name: String,
    /// Multiplier `K` in `max(0, (requests - K*accepts) / (requests + 1))`.
    /// Higher values tolerate a larger gap between requests and accepts
    /// before throttling kicks in.
    pub(crate) k: f64,
    /// Half-life of the requests/accepts EWMA counters.
    pub(crate) window: Duration,
    /// Upper bound on the computed rejection probability.
    pub(crate) max_rejection_rate: f64,
    pub(crate) prioritizer: Option<Arc<Prioritizer>>,
    pub(crate) event_listeners: EventListeners<ThrottlerEvent>,
}

impl ThrottlerConfig {
    /// Creates a builder with the client-side throttling defaults from the
    /// Google SRE book: `K = 2.0`, a 60s EWMA window, rejection capped at 1.0
    /// (no cap).
    pub fn builder() -> ThrottlerConfigBuilder {
        ThrottlerConfigBuilder::new()
    }
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        ThrottlerConfigBuilder::new().build()
    }
}

/// Builder for [`ThrottlerConfig`].
pub struct ThrottlerConfigBuilder {
    name: String,
    k: f64,
    window: Duration,
    max_rejection_rate: f64,
    prioritizer: Option<Arc<Prioritizer>>,
    event_listeners: EventListeners<ThrottlerEvent>,
}

impl ThrottlerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: "adaptive_throttler".to_string(),
            k: 2.0,
            window: Duration::from_secs(60),
            max_rejection_rate: 1.0,
            prioritizer: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this throttler instance, used in events and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets `K`, the multiplier applied to `accepts` in the rejection
    /// probability formula. Default: `2.0`.
    pub fn k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Sets the half-life of the requests/accepts EWMA counters. Default: 60s.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Bounds the computed rejection probability. Default: `1.0` (unbounded).
    pub fn max_rejection_rate(mut self, rate: f64) -> Self {
        self.max_rejection_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Shares a [`Prioritizer`] with this throttler: below-threshold callers
    /// are rejected outright, bypassing the probabilistic decision.
    pub fn prioritizer(mut self, prioritizer: Arc<Prioritizer>) -> Self {
        self.prioritizer = Some(prioritizer);
        self
    }

    /// Registers a callback invoked when a call is throttled.
    pub fn on_throttled<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ThrottlerEvent::Throttled { probability, .. } = event {
                f(*probability);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is admitted.
    pub fn on_accepted<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ThrottlerEvent::Accepted { .. } = event {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ThrottlerConfig {
        ThrottlerConfig {
            name: self.name,
            k: self.k,
            window: self.window,
            max_rejection_rate: self.max_rejection_rate,
            prioritizer: self.prioritizer,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for ThrottlerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
