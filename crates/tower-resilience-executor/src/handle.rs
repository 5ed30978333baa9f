//! Async result handle returned by [`crate::Executor::get_async`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tower_resilience_core::ExecutionContext;

/// A one-shot handle to an invocation running on a spawned task.
///
/// Modeled after the spec's async `ResultHandle<R>`: a completion signal, a
/// result slot, and a cancel function that cancels the invocation's
/// [`ExecutionContext`] rather than the task itself - cancellation is
/// cooperative, observed by every suspension point the inner policies select
/// on, not a forced abort.
pub struct ResultHandle<R, E> {
    rx: oneshot::Receiver<Result<R, E>>,
    ctx: ExecutionContext,
    done: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl<R, E> ResultHandle<R, E> {
    pub(crate) fn new(
        rx: oneshot::Receiver<Result<R, E>>,
        ctx: ExecutionContext,
        done: std::sync::Arc<std::sync::atomic::AtomicBool>,
    ) -> Self {
        Self { rx, ctx, done }
    }

    /// Returns `true` once the invocation has produced a result (or was canceled).
    pub fn is_done(&self) -> bool {
        self.done.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Cancels the underlying invocation. Every suspension point in the
    /// policy stack observes this on its next poll; the handle still must be
    /// awaited (or dropped) to release the spawned task's resources.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Awaits the final result, equivalent to `.await`ing the handle directly.
    pub async fn get(self) -> Result<R, ExecutionCanceled<E>> {
        self.await
    }
}

/// Error returned by [`ResultHandle`] when the invocation never produced a
/// result because it (or the task carrying it) was canceled.
#[derive(Debug)]
pub enum ExecutionCanceled<E> {
    /// The invocation completed normally but with an application error.
    Inner(E),
    /// The spawned task was dropped or canceled before it could complete.
    Canceled,
}

impl<E: std::fmt::Display> std::fmt::Display for ExecutionCanceled<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionCanceled::Inner(e) => write!(f, "{}", e),
            ExecutionCanceled::Canceled => write!(f, "execution canceled"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ExecutionCanceled<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutionCanceled::Inner(e) => Some(e),
            ExecutionCanceled::Canceled => None,
        }
    }
}

impl<R, E> Future for ResultHandle<R, E> {
    type Output = Result<R, ExecutionCanceled<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(ExecutionCanceled::Inner(e))),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ExecutionCanceled::Canceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
