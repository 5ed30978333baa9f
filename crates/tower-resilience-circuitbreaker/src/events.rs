//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use std::time::{Duration, Instant};
use tower_resilience_core::ResilienceEvent;

/// Events emitted during circuit breaker operation.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit transitioned from one state to another.
    StateTransition {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// State before the transition.
        from_state: CircuitState,
        /// State after the transition.
        to_state: CircuitState,
    },

    /// A call was permitted to reach the inner service.
    CallPermitted {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The state the circuit was in when the call was permitted.
        state: CircuitState,
    },

    /// A call was rejected because the circuit is open (or half-open and saturated).
    CallRejected {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// A call completed and was recorded as a success.
    SuccessRecorded {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The state the circuit was in when the success was recorded.
        state: CircuitState,
    },

    /// A call completed and was recorded as a failure.
    FailureRecorded {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// The state the circuit was in when the failure was recorded.
        state: CircuitState,
    },

    /// A call exceeded the slow-call duration threshold.
    SlowCallDetected {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When this event occurred.
        timestamp: Instant,
        /// How long the call took.
        duration: Duration,
        /// The state the circuit was in when the slow call was detected.
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::CallPermitted { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::CallRejected { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::SuccessRecorded { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::CallPermitted { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::CallRejected { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::SuccessRecorded { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::FailureRecorded { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::SlowCallDetected { pattern_name, .. } => pattern_name,
        }
    }
}
