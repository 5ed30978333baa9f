//! The `Executor` facade: the single entry point through which a user invokes
//! an ordered stack of resilience policies.
//!
//! Policies themselves are plain Tower [`Layer`](tower_layer::Layer)s -
//! `ServiceBuilder::new().layer(retry).layer(circuit_breaker)...service(user_op)`
//! already realizes the "pipeline composer" described by the design: the
//! outermost `.layer()` call wraps everything beneath it, so the resulting
//! `Service` *is* the outer-to-inner call chain. `Executor` adds the pieces
//! that composition alone doesn't give you - a place to establish the
//! [`ExecutionContext`] for an invocation, inspect its [`ExecutionRecord`]
//! afterward, and get an async, cancelable handle to a call running on its
//! own task.

use crate::handle::ResultHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower::{Service, ServiceExt};
use tower_resilience_core::{ExecutionContext, ExecutionRecord};

/// Executes a composed policy stack for one or more invocations, optionally
/// bound to a caller-supplied parent [`ExecutionContext`].
///
/// `S` is the fully composed pipeline: an ordered stack of policy layers
/// wrapped around the user's operation, built the ordinary Tower way and
/// handed to [`Executor::new`].
#[derive(Clone)]
pub struct Executor<S> {
    service: S,
    parent: ExecutionContext,
}

impl<S> Executor<S> {
    /// Wraps an already-composed policy stack. The outermost layer passed to
    /// `ServiceBuilder` should be the outermost policy (`P1` in the design's
    /// notation); the user operation sits at the center as the base service.
    pub fn new(service: S) -> Self {
        Self {
            service,
            parent: ExecutionContext::new(),
        }
    }

    /// Returns a new `Executor` that derives every invocation's
    /// [`ExecutionContext`] from `ctx` instead of a fresh root context -
    /// useful for adopting a caller's own cancellation/deadline as the parent
    /// of every call this executor makes.
    pub fn with_context(mut self, ctx: ExecutionContext) -> Self {
        self.parent = ctx;
        self
    }
}

impl<S, Req> Executor<S>
where
    S: Service<Req> + Clone + Send + 'static,
    Req: Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    /// Blocking-style call returning just the value, the `Get` form of the
    /// design's invocation surface.
    pub async fn get(&self, req: Req) -> Result<S::Response, S::Error> {
        self.get_with_execution(req).await.0
    }

    /// `Get` with access to the invocation's [`ExecutionRecord`] - attempts,
    /// executions, retry count - for instrumentation or assertions in tests.
    pub async fn get_with_execution(
        &self,
        req: Req,
    ) -> (Result<S::Response, S::Error>, Arc<ExecutionRecord>) {
        let ctx = self.parent.child();
        let record = Arc::clone(ctx.record());
        let mut service = self.service.clone();
        let result = ctx
            .clone()
            .scope(async move {
                let ready = service.ready().await?;
                ready.call(req).await
            })
            .await;
        (result, record)
    }

    /// Side-effect-only call; the value is discarded.
    pub async fn run(&self, req: Req) -> Result<(), S::Error> {
        self.get(req).await.map(|_| ())
    }

    /// Side-effect-only call with access to the [`ExecutionRecord`].
    pub async fn run_with_execution(&self, req: Req) -> (Result<(), S::Error>, Arc<ExecutionRecord>) {
        let (result, record) = self.get_with_execution(req).await;
        (result.map(|_| ()), record)
    }

    /// Spawns the invocation on the current Tokio runtime and returns a
    /// [`ResultHandle`] that can be polled, awaited, or canceled - the `GetAsync` form.
    pub fn get_async(&self, req: Req) -> ResultHandle<S::Response, S::Error> {
        let ctx = self.parent.child();
        let done = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let mut service = self.service.clone();

        let done_task = Arc::clone(&done);
        let ctx_task = ctx.clone();
        tokio::spawn(async move {
            let result = ctx_task
                .scope(async move {
                    let ready = service.ready().await?;
                    ready.call(req).await
                })
                .await;
            done_task.store(true, Ordering::Release);
            let _ = tx.send(result);
        });

        ResultHandle::new(rx, ctx, done)
    }
}
