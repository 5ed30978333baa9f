//! Events emitted by the cache policy.

use std::time::Instant;
use tower_resilience_core::ResilienceEvent;

/// Events emitted during cache operation.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A requested entry was found in the cache.
    Hit {
        /// Name of the cache instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// A requested entry was not found; the inner service was called.
    Miss {
        /// Name of the cache instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// An entry was evicted to make room for a new one, or expired.
    Eviction {
        /// Name of the cache instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Eviction { .. } => "eviction",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. } => *timestamp,
            CacheEvent::Miss { timestamp, .. } => *timestamp,
            CacheEvent::Eviction { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. } => pattern_name,
            CacheEvent::Miss { pattern_name, .. } => pattern_name,
            CacheEvent::Eviction { pattern_name, .. } => pattern_name,
        }
    }
}
