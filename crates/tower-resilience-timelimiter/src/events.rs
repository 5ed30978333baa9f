//! Events emitted by the time limiter policy.

use std::time::{Duration, Instant};
use tower_resilience_core::ResilienceEvent;

/// Events emitted during time limiter operation.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The inner call completed successfully before the timeout elapsed.
    Success {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the call took.
        duration: Duration,
    },

    /// The inner call returned an error before the timeout elapsed.
    Error {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the call took before failing.
        duration: Duration,
    },

    /// The inner call did not complete within the timeout.
    Timeout {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The configured timeout duration that was exceeded.
        timeout_duration: Duration,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { timestamp, .. } => *timestamp,
            TimeLimiterEvent::Error { timestamp, .. } => *timestamp,
            TimeLimiterEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Success { pattern_name, .. } => pattern_name,
            TimeLimiterEvent::Error { pattern_name, .. } => pattern_name,
            TimeLimiterEvent::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
