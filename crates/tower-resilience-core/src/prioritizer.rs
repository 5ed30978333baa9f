//! Shared prioritizer: a process-wide rejection-threshold aggregator that
//! priority-aware adaptive limiters and throttlers consult before admitting a
//! call.
//!
//! A single [`Prioritizer`] can be shared (via [`Arc`]) across every adaptive
//! limiter and throttler that should shed load together. Each policy instance
//! registers itself as a [`PrioritizedMember`]; a background aggregator -
//! either the one [`Prioritizer::spawn`] starts, or one the host application
//! drives itself by calling [`Prioritizer::recompute`] - folds every member's
//! current load into a single `rejection_threshold` in `[Low, VeryHigh]`.
//! Callers whose [`Priority`] (read from the `ExecutionContext`) sits below
//! that threshold are rejected immediately by any consulting policy, before
//! it spends a permit or concurrency slot on them.
//!
//! Members are held as [`Weak`] references: a prioritizer outliving the
//! limiters that registered with it does not keep them alive, and dead
//! members are pruned the next time the threshold is recomputed.

use crate::execution::Priority;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Something a [`Prioritizer`] can poll for load, expressed as a fraction in
/// `[0.0, 1.0]` where `1.0` means "reject everything but the highest priority".
pub trait PrioritizedMember: Send + Sync {
    /// Current load of this member, e.g. `queued / (queue_capacity)` for an
    /// adaptive limiter's wait queue, or the throttler's own rejection
    /// probability.
    fn load(&self) -> f64;
}

/// Aggregates load across every registered member and publishes a single
/// rejection threshold consulted by all of them.
pub struct Prioritizer {
    // Priority as u8 (0=Low..3=VeryHigh), stored atomically so the hot path
    // (`admits`) never takes the members lock.
    threshold: AtomicU8,
    members: Mutex<Vec<Weak<dyn PrioritizedMember>>>,
}

impl Prioritizer {
    /// Creates a prioritizer with no members and a threshold of `Low` (admit everything).
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            threshold: AtomicU8::new(Priority::Low as u8),
            members: Mutex::new(Vec::new()),
        })
    }

    /// Creates a prioritizer and spawns a background task on the current
    /// Tokio runtime that calls [`Prioritizer::recompute`] every `interval`
    /// for as long as the returned `Arc` (or a clone) is alive.
    pub fn spawn(interval: Duration) -> Arc<Self> {
        let prioritizer = Self::new();
        let weak = Arc::downgrade(&prioritizer);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(p) => p.recompute(),
                    None => break,
                }
            }
        });
        prioritizer
    }

    /// Registers a member whose [`PrioritizedMember::load`] will be folded
    /// into future threshold recomputations. The prioritizer holds only a
    /// weak reference, so the member is pruned automatically once it's
    /// dropped elsewhere.
    pub fn register(&self, member: Weak<dyn PrioritizedMember>) {
        self.members.lock().expect("prioritizer poisoned").push(member);
    }

    /// The rejection threshold as of the last [`Prioritizer::recompute`].
    /// Callers with a [`Priority`] strictly below this are rejected.
    pub fn rejection_threshold(&self) -> Priority {
        priority_from_ordinal(self.threshold.load(Ordering::Acquire))
    }

    /// Returns `true` if a caller at `priority` should be admitted under the
    /// current threshold.
    pub fn admits(&self, priority: Priority) -> bool {
        priority >= self.rejection_threshold()
    }

    /// Recomputes the rejection threshold from the worst (highest-load) live
    /// member, pruning dead ones. Safe to call directly from tests instead of
    /// waiting on [`Prioritizer::spawn`]'s interval.
    pub fn recompute(&self) {
        let mut members = self.members.lock().expect("prioritizer poisoned");
        members.retain(|m| Weak::strong_count(m) > 0);

        let worst = members
            .iter()
            .filter_map(|m| m.upgrade())
            .map(|m| m.load())
            .fold(0.0_f64, f64::max);

        self.threshold.store(threshold_for_load(worst) as u8, Ordering::Release);
    }
}

impl Default for Prioritizer {
    fn default() -> Self {
        // `new()` returns an `Arc<Self>` for shared registration; `Default`
        // is provided for call sites that just need an owned instance (e.g.
        // wrapping it in their own `Arc` alongside other state).
        Self {
            threshold: AtomicU8::new(Priority::Low as u8),
            members: Mutex::new(Vec::new()),
        }
    }
}

fn priority_from_ordinal(n: u8) -> Priority {
    match n {
        0 => Priority::Low,
        1 => Priority::Medium,
        2 => Priority::High,
        _ => Priority::VeryHigh,
    }
}

fn threshold_for_load(load: f64) -> Priority {
    if load >= 0.95 {
        Priority::VeryHigh
    } else if load >= 0.85 {
        Priority::High
    } else if load >= 0.7 {
        Priority::Medium
    } else {
        Priority::Low
    }
}
