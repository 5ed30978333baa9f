//! Core infrastructure for tower-resilience.
//!
//! This crate provides shared functionality used across all tower-resilience modules:
//! - Event system for observability
//! - Metrics infrastructure
//! - Common configuration patterns
//! - A unified error type for composed layers
//! - The AIMD controller shared by the adaptive limiter and throttler
//! - Execution context/record types shared by the pipeline composer

pub mod aimd;
pub mod budget;
pub mod error;
pub mod events;
pub mod execution;
pub mod prioritizer;

pub use budget::Budget;
pub use error::ResilienceError;
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, ResilienceEvent};
pub use execution::{
    CacheKeyContext, ExecutionContext, ExecutionRecord, ExecutionResult, Permit, Priority,
    PriorityContext,
};
pub use prioritizer::{PrioritizedMember, Prioritizer};
