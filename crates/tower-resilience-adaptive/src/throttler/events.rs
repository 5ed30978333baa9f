//! Events emitted by the adaptive throttler.

use std::time::Instant;
use tower_resilience_core::ResilienceEvent;

/// Events emitted during adaptive throttler operation.
#[derive(Debug, Clone)]
pub enum ThrottlerEvent {
    /// A call was admitted past the rejection probability.
    Accepted {
        /// Name of the throttler instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The rejection probability in effect when this call was evaluated.
        probability: f64,
    },

    /// A call was rejected by the computed rejection probability.
    Throttled {
        /// Name of the throttler instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The rejection probability that triggered the rejection.
        probability: f64,
    },

    /// A shared prioritizer rejected the call before the probabilistic check ran.
    PriorityRejected {
        /// Name of the throttler instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for ThrottlerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ThrottlerEvent::Accepted { .. } => "accepted",
            ThrottlerEvent::Throttled { .. } => "throttled",
            ThrottlerEvent::PriorityRejected { .. } => "priority_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ThrottlerEvent::Accepted { timestamp, .. }
            | ThrottlerEvent::Throttled { timestamp, .. }
            | ThrottlerEvent::PriorityRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            ThrottlerEvent::Accepted { pattern_name, .. }
            | ThrottlerEvent::Throttled { pattern_name, .. }
            | ThrottlerEvent::PriorityRejected { pattern_name, .. } => pattern_name,
        }
    }
}
