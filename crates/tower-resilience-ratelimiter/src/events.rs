//! Events emitted by the rate limiter policy.

use std::time::{Duration, Instant};
use tower_resilience_core::ResilienceEvent;

/// Events emitted during rate limiter operation.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was acquired, either immediately or after waiting.
    PermitAcquired {
        /// Name of the rate limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the request waited for the permit.
        wait_duration: Duration,
    },

    /// A permit could not be acquired within `timeout_duration`.
    PermitRejected {
        /// Name of the rate limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The configured timeout that was exceeded.
        timeout_duration: Duration,
    },

    /// Permits were reset at the start of a new refresh period.
    PermitsRefreshed {
        /// Name of the rate limiter instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// Number of permits now available.
        available_permits: usize,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
            RateLimiterEvent::PermitsRefreshed { .. } => "permits_refreshed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. } => *timestamp,
            RateLimiterEvent::PermitRejected { timestamp, .. } => *timestamp,
            RateLimiterEvent::PermitsRefreshed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { pattern_name, .. } => pattern_name,
            RateLimiterEvent::PermitRejected { pattern_name, .. } => pattern_name,
            RateLimiterEvent::PermitsRefreshed { pattern_name, .. } => pattern_name,
        }
    }
}
