//! Events emitted by the bulkhead policy.

use std::time::{Duration, Instant};
use tower_resilience_core::events::ResilienceEvent;

/// Events emitted during bulkhead operation.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call was permitted to proceed, having acquired a concurrency slot.
    CallPermitted {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// Number of calls currently in flight, including this one.
        concurrent_calls: usize,
    },

    /// A call was rejected because no slot became available.
    CallRejected {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The configured concurrency limit that was saturated.
        max_concurrent_calls: usize,
    },

    /// A permitted call completed successfully.
    CallFinished {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the call held its concurrency slot.
        duration: Duration,
    },

    /// A permitted call completed with an error.
    CallFailed {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the call held its concurrency slot before failing.
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. } => *timestamp,
            BulkheadEvent::CallRejected { timestamp, .. } => *timestamp,
            BulkheadEvent::CallFinished { timestamp, .. } => *timestamp,
            BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallRejected { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallFinished { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
