//! Execution context and record shared by every policy in the pipeline.
//!
//! An [`Executor`](https://docs.rs/tower-resilience) composes an ordered stack
//! of resilience layers around a user operation. Every invocation of that
//! stack carries two pieces of cross-cutting state down through the layers
//! and back up again:
//!
//! - [`ExecutionContext`]: carries cancellation and a small key/value bag
//!   (priority, cache key, ...), derived parent-to-child as policies spawn
//!   nested attempts (retry iterations, hedge attempts, timeout children).
//! - [`ExecutionRecord`]: per-invocation counters and last-result bookkeeping,
//!   shared (not derived) across every attempt of one top-level call.
//!
//! Layers read and write these through `Arc` handles passed explicitly where
//! convenient, or ambiently via [`ExecutionContext::scope`]/[`ExecutionContext::try_current`]
//! for layers that don't otherwise thread a context through their `Service::call`
//! signature - a plain cache policy that doesn't care about attempt counting
//! can ignore both.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

tokio::task_local! {
    static CURRENT: ExecutionContext;
}

/// Caller-assigned priority, read from [`ExecutionContext`] by priority-aware
/// adaptive limiters and throttlers (see `tower-resilience-adaptive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
    VeryHigh = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Well-known context key carrying the caller's [`Priority`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityContext;

/// Well-known context key carrying a string cache key that overrides a
/// cache policy's statically configured key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyContext;

#[derive(Clone)]
enum Value {
    Priority(Priority),
    CacheKey(String),
    Other(Arc<dyn std::any::Any + Send + Sync>),
}

/// Per-invocation, per-attempt state threaded through the policy stack.
///
/// `ExecutionContext` is cheap to clone: the key/value bag and the
/// [`ExecutionRecord`] pointer are shared via `Arc`, while the cancellation
/// token forms a tree so a child can be canceled independently of its
/// siblings without affecting the parent.
///
/// # Invariants
///
/// A child context is canceled when:
/// 1. its parent is canceled,
/// 2. its deadline elapses (if one was set via [`ExecutionContext::with_deadline`]), or
/// 3. the owning policy explicitly cancels it (timeout fired, hedge winner
///    decided, outer abort).
///
/// Once canceled, a context is never uncanceled.
#[derive(Clone)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
    bag: Arc<Mutex<HashMap<&'static str, Value>>>,
    record: Arc<ExecutionRecord>,
}

impl ExecutionContext {
    /// Creates a new root context with a fresh [`ExecutionRecord`].
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            bag: Arc::new(Mutex::new(HashMap::new())),
            record: Arc::new(ExecutionRecord::new()),
        }
    }

    /// Derives a child context that inherits the bag and record but gets its
    /// own cancellation token, linked so that canceling `self` cancels the
    /// child, but canceling the child never cancels `self`.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            bag: Arc::clone(&self.bag),
            record: Arc::clone(&self.record),
        }
    }

    /// Returns a future that resolves once this context is canceled.
    pub async fn canceled(&self) {
        self.cancellation.cancelled().await
    }

    /// Returns `true` if this context (or an ancestor) has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancels this context and every context derived from it. Does not
    /// affect the parent this context was derived from.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The [`ExecutionRecord`] shared by every attempt of this invocation.
    pub fn record(&self) -> &Arc<ExecutionRecord> {
        &self.record
    }

    /// Sets the caller's [`Priority`] for this invocation.
    pub fn with_priority(self, priority: Priority) -> Self {
        self.bag
            .lock()
            .expect("execution context bag poisoned")
            .insert("priority", Value::Priority(priority));
        self
    }

    /// Returns the caller's [`Priority`], defaulting to [`Priority::Medium`]
    /// if none was set.
    pub fn priority(&self) -> Priority {
        match self.bag.lock().expect("execution context bag poisoned").get("priority") {
            Some(Value::Priority(p)) => *p,
            _ => Priority::Medium,
        }
    }

    /// Overrides the cache key a cache policy should use for this call,
    /// taking precedence over any statically configured key.
    pub fn with_cache_key(self, key: impl Into<String>) -> Self {
        self.bag
            .lock()
            .expect("execution context bag poisoned")
            .insert("cache_key", Value::CacheKey(key.into()));
        self
    }

    /// Returns the cache key override set via [`ExecutionContext::with_cache_key`], if any.
    pub fn cache_key(&self) -> Option<String> {
        match self.bag.lock().expect("execution context bag poisoned").get("cache_key") {
            Some(Value::CacheKey(k)) => Some(k.clone()),
            _ => None,
        }
    }

    /// Stores an arbitrary user value under `key`, for framework extensions
    /// beyond the well-known priority/cache-key slots.
    pub fn insert<T: Send + Sync + 'static>(&self, key: &'static str, value: T) {
        self.bag
            .lock()
            .expect("execution context bag poisoned")
            .insert(key, Value::Other(Arc::new(value)));
    }

    /// Retrieves a value previously stored with [`ExecutionContext::insert`].
    pub fn get<T: Send + Sync + 'static>(&self, key: &'static str) -> Option<Arc<T>> {
        match self.bag.lock().expect("execution context bag poisoned").get(key) {
            Some(Value::Other(v)) => Arc::clone(v).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Runs `fut` with `self` set as the ambiently-available execution
    /// context, retrievable by nested policies via [`ExecutionContext::try_current`]
    /// without changing their `Service::call` signature.
    pub async fn scope<F: std::future::Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// Returns a clone of the ambient execution context set by an enclosing
    /// [`ExecutionContext::scope`] call, if any.
    pub fn try_current() -> Option<ExecutionContext> {
        CURRENT.try_with(|ctx| ctx.clone()).ok()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("canceled", &self.is_canceled())
            .field("record", &self.record)
            .finish()
    }
}

/// Cross-attempt state for one top-level invocation, mutated concurrently by
/// hedge peers and retry iterations alike.
///
/// All counters are monotonic and updated with atomics; `last_result`'s
/// summary and `last_error`'s message are guarded by a mutex since they are
/// written far less often than the counters are read.
pub struct ExecutionRecord {
    started_at: Instant,
    attempts: AtomicU64,
    executions: AtomicU64,
    retry_count: AtomicU64,
    is_first_attempt: AtomicBool,
    is_hedge: AtomicBool,
    last: Mutex<LastOutcome>,
}

#[derive(Default, Clone)]
struct LastOutcome {
    result_summary: Option<String>,
    error_summary: Option<String>,
}

impl ExecutionRecord {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            attempts: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
            is_first_attempt: AtomicBool::new(true),
            is_hedge: AtomicBool::new(false),
            last: Mutex::new(LastOutcome::default()),
        }
    }

    /// When the top-level invocation began.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Number of attempts that entered the inner policy stack.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Number of attempts that were admitted all the way to the user operation.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Acquire)
    }

    /// Number of retry iterations performed so far (0 on the first attempt).
    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Acquire)
    }

    /// `true` only while the very first attempt of this invocation is in flight.
    pub fn is_first_attempt(&self) -> bool {
        self.is_first_attempt.load(Ordering::Acquire)
    }

    /// `true` if the in-flight attempt is a hedge rather than the primary attempt.
    pub fn is_hedge(&self) -> bool {
        self.is_hedge.load(Ordering::Acquire)
    }

    /// Called by a policy (typically retry) before each inner call.
    pub fn mark_attempt(&self) -> u64 {
        let n = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        if n > 1 {
            self.is_first_attempt.store(false, Ordering::Release);
            self.retry_count.fetch_add(1, Ordering::AcqRel);
        }
        n
    }

    /// Called by the innermost wrapper when an attempt reaches the user operation.
    pub fn mark_execution(&self) -> u64 {
        self.executions.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Marks whether the current in-flight attempt is a hedge.
    pub fn set_is_hedge(&self, is_hedge: bool) {
        self.is_hedge.store(is_hedge, Ordering::Release);
    }

    /// Records a human-readable summary of the most recent result, for
    /// listeners and for wrapping into `RetriesExceeded`-style errors.
    pub fn set_last_result(&self, summary: impl Into<String>) {
        self.last.lock().expect("execution record poisoned").result_summary = Some(summary.into());
        self.last.lock().expect("execution record poisoned").error_summary = None;
    }

    /// Records a human-readable summary of the most recent error.
    pub fn set_last_error(&self, summary: impl Into<String>) {
        self.last.lock().expect("execution record poisoned").error_summary = Some(summary.into());
    }

    /// The last recorded success summary, if any.
    pub fn last_result(&self) -> Option<String> {
        self.last.lock().expect("execution record poisoned").result_summary.clone()
    }

    /// The last recorded error summary, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last.lock().expect("execution record poisoned").error_summary.clone()
    }
}

impl std::fmt::Debug for ExecutionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRecord")
            .field("attempts", &self.attempts())
            .field("executions", &self.executions())
            .field("retry_count", &self.retry_count())
            .field("is_first_attempt", &self.is_first_attempt())
            .field("is_hedge", &self.is_hedge())
            .finish()
    }
}

/// Uniform result shape every policy classifies and may transform on its way
/// back up the stack.
///
/// `complete` tells outer policies "stop re-executing me" (set by an abort
/// predicate match, a circuit breaker rejection, or a timeout firing).
/// `success` lets a policy declare victory regardless of `error` being set
/// (a fallback that manufactured a value from an error still reports
/// `success = true` so outer policies don't retry it).
#[derive(Debug, Clone)]
pub struct ExecutionResult<T, E> {
    pub value: Option<T>,
    pub error: Option<E>,
    pub complete: bool,
    pub success: bool,
}

impl<T, E> ExecutionResult<T, E> {
    /// Builds a result from a successful value. `complete` defaults to `false`
    /// so outer retry/hedge policies still see an ordinary success they may
    /// choose to race against (e.g. a hedge that keeps waiting for a better one).
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
            complete: false,
            success: true,
        }
    }

    /// Builds a result from a failure that outer policies should be free to retry.
    pub fn err(error: E) -> Self {
        Self {
            value: None,
            error: Some(error),
            complete: false,
            success: false,
        }
    }

    /// Builds a terminal failure: no outer policy should re-execute.
    pub fn err_complete(error: E) -> Self {
        Self {
            value: None,
            error: Some(error),
            complete: true,
            success: false,
        }
    }

    /// Returns `true` if this result should be treated as a failure under the
    /// default predicate (any non-`None` error).
    pub fn is_failure(&self) -> bool {
        !self.success && self.error.is_some()
    }
}

/// An opaque, exclusive handle returned by bulkhead / limiter / cache
/// singleflight slots.
///
/// The caller must release exactly once: either by dropping the permit or by
/// calling [`Permit::release`] explicitly. Double release is a caller bug and
/// is not checked for; forgetting to release leaks a slot until the permit is
/// dropped (Rust's ownership rules make a true leak - never dropping at all -
/// possible only via `mem::forget`, so this is advisory, not enforced).
pub struct Permit {
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl Permit {
    /// Wraps a release callback into a permit. The callback runs at most once:
    /// on explicit [`Permit::release`], or on drop if that was never called.
    pub fn new(on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_release: Some(Box::new(on_release)),
        }
    }

    /// A permit with no associated release action, for call sites that don't
    /// need bounded-section bookkeeping but must still satisfy the type.
    pub fn noop() -> Self {
        Self { on_release: None }
    }

    /// Releases the permit immediately instead of waiting for drop.
    pub fn release(mut self) {
        if let Some(f) = self.on_release.take() {
            f();
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(f) = self.on_release.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_context_shares_record_but_not_cancellation() {
        let parent = ExecutionContext::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_canceled());
        assert!(!parent.is_canceled());

        parent.record().mark_attempt();
        assert_eq!(child.record().attempts(), 1);
    }

    #[test]
    fn parent_cancellation_propagates_to_child() {
        let parent = ExecutionContext::new();
        let child = parent.child();

        parent.cancel();
        assert!(child.is_canceled());
    }

    #[test]
    fn priority_and_cache_key_round_trip() {
        let ctx = ExecutionContext::new()
            .with_priority(Priority::High)
            .with_cache_key("user:42");

        assert_eq!(ctx.priority(), Priority::High);
        assert_eq!(ctx.cache_key().as_deref(), Some("user:42"));
    }

    #[test]
    fn default_priority_is_medium() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.priority(), Priority::Medium);
    }

    #[test]
    fn record_tracks_attempts_and_executions_independently() {
        let record = ExecutionRecord::new();
        assert!(record.is_first_attempt());

        record.mark_attempt();
        assert_eq!(record.attempts(), 1);
        assert_eq!(record.executions(), 0);

        record.mark_execution();
        assert_eq!(record.executions(), 1);

        record.mark_attempt();
        assert!(!record.is_first_attempt());
        assert_eq!(record.retry_count(), 1);
    }

    #[test]
    fn permit_release_runs_exactly_once_via_drop() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _permit = Permit::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permit_explicit_release_skips_drop_action() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let permit = Permit::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        permit.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
