//! Events emitted by the adaptive concurrency limiter.

use std::time::Instant;
use tower_resilience_core::ResilienceEvent;

/// Events emitted during adaptive limiter operation.
#[derive(Debug, Clone)]
pub enum AdaptiveLimiterEvent {
    /// The algorithm changed the concurrency limit.
    LimitChanged {
        /// Name of the limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The limit before this change.
        previous_limit: usize,
        /// The limit after this change.
        new_limit: usize,
    },

    /// A call was queued behind the current limit before being admitted.
    CallQueued {
        /// Name of the limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// Number of calls already queued ahead of this one.
        queue_depth: usize,
    },

    /// The wait queue was full, or `max_wait` elapsed before a slot opened.
    LimitExceeded {
        /// Name of the limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The limit in effect at rejection time.
        limit: usize,
    },

    /// A shared prioritizer rejected the call before it reached the queue.
    PriorityRejected {
        /// Name of the limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for AdaptiveLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdaptiveLimiterEvent::LimitChanged { .. } => "limit_changed",
            AdaptiveLimiterEvent::CallQueued { .. } => "call_queued",
            AdaptiveLimiterEvent::LimitExceeded { .. } => "limit_exceeded",
            AdaptiveLimiterEvent::PriorityRejected { .. } => "priority_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            AdaptiveLimiterEvent::LimitChanged { timestamp, .. }
            | AdaptiveLimiterEvent::CallQueued { timestamp, .. }
            | AdaptiveLimiterEvent::LimitExceeded { timestamp, .. }
            | AdaptiveLimiterEvent::PriorityRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            AdaptiveLimiterEvent::LimitChanged { pattern_name, .. }
            | AdaptiveLimiterEvent::CallQueued { pattern_name, .. }
            | AdaptiveLimiterEvent::LimitExceeded { pattern_name, .. }
            | AdaptiveLimiterEvent::PriorityRejected { pattern_name, .. } => pattern_name,
        }
    }
}
