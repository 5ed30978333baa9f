//! The resilience pipeline's executor facade.
//!
//! Individual policies (retry, circuit breaker, timeout, ...) are ordinary
//! Tower [`Layer`](tower_layer::Layer)s; stacking them with
//! `ServiceBuilder::new().layer(p1).layer(p2)...service(user_op)` already
//! produces the outer-to-inner call chain the design calls the "pipeline
//! composer" - `p1` wraps `p2` wraps ... wraps the user operation, exactly as
//! described. What that composition alone doesn't give you is a home for the
//! per-invocation [`ExecutionContext`]/[`ExecutionRecord`] pair and the small
//! family of invocation styles (`Get`, `GetWithExecution`, `Run`,
//! `RunWithExecution`, `GetAsync`) the design expects at the top of the
//! stack. [`Executor`] is that home.
//!
//! # Example
//!
//! ```rust
//! use tower_resilience_executor::Executor;
//! use tower::{Service, ServiceBuilder, service_fn};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ServiceBuilder::new().service(service_fn(|req: i32| async move {
//!     Ok::<_, std::convert::Infallible>(req * 2)
//! }));
//!
//! let executor = Executor::new(pipeline);
//! assert_eq!(executor.get(21).await?, 42);
//! # Ok(())
//! # }
//! ```
//!
//! # Cancellation
//!
//! `Executor` derives a fresh [`ExecutionContext`] per invocation (or a child
//! of one adopted via [`Executor::with_context`]) and makes it ambiently
//! available to every policy in the stack via
//! `tower_resilience_core::ExecutionContext::try_current`. Canceling the
//! handle returned by [`Executor::get_async`] cancels that context; any
//! suspension point inside the stack that checks it unwinds promptly.

mod handle;
mod pipeline;

pub use handle::{ExecutionCanceled, ResultHandle};
pub use pipeline::Executor;

pub use tower_resilience_core::{
    CacheKeyContext, ExecutionContext, ExecutionRecord, ExecutionResult, Permit, Priority,
    PriorityContext,
};
