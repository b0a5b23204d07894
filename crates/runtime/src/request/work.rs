//! work
//!
//! Threadpool offload. `queue` claims the request's ACTIVE slot with `fetch_and`, submits the
//! callback to the engine threadpool, and settles two separate channels: `result` (the worker's
//! return value or panic) and `finished` (set by the *after-work* step, which always runs back
//! on the loop thread). The future `queue` returns only resolves once `finished` has fired,
//! matching §4.5's "the returned future is `then(finished_future, || result_future.get())`".

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::channel::oneshot;

use super::{RequestState, Status};
use crate::error::{Error, Result};
use crate::event_loop::Loop;
use crate::futures::{errored, ready, BoxFuture};

struct Inner {
    state: RequestState,
    loop_: Loop,
}

/// A one-shot threadpool offload. Per the teacher's `WorkOncePool` precedent, a `Work` is
/// single-use: once it reaches FINISHED or CANCELLED, `queue`/`defer_queue` fail with
/// [`Error::InvalidState`] rather than resetting the state machine — see DESIGN.md.
#[derive(Clone)]
pub struct Work {
    inner: Arc<Inner>,
}

impl Work {
    pub(crate) fn new(loop_: Loop) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RequestState::new(),
                loop_,
            }),
        }
    }

    pub fn status(&self) -> Status {
        self.inner.state.status()
    }

    /// Submit `f` to the threadpool immediately, returning a future that resolves once the
    /// after-work step has run on the loop thread.
    pub fn queue<F, R>(&self, f: F) -> BoxFuture<'static, Result<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let current = self.inner.state.status();
        if current.intersects(Status::FINISHED | Status::CANCELLED) {
            return errored(Error::InvalidState);
        }

        let prior = self.inner.state.claim_active();
        if prior.intersects(Status::ACTIVE) {
            return errored(Error::Busy);
        }

        let (result_tx, result_rx) = oneshot::channel::<Result<R>>();
        let (finished_tx, finished_rx) = oneshot::channel::<Result<()>>();

        let inner = Arc::clone(&self.inner);
        let worker_loop = self.inner.loop_.clone();
        self.inner.loop_.submit_work(Box::new(move || {
            // The PENDING -> ACTIVE transition happens here, on the pool thread, not at `queue`
            // time — this is the window `Request::cancel` races against (§4.5 "worker").
            if !inner.state.try_activate() {
                let inner = Arc::clone(&inner);
                worker_loop.schedule_void(Box::new(move || {
                    inner.state.set(Status::CANCELLED);
                    let _ = finished_tx.send(Err(Error::Cancelled));
                }));
                return;
            }

            let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic);
            let _ = result_tx.send(outcome);
            let inner = Arc::clone(&inner);
            worker_loop.schedule_void(Box::new(move || {
                inner.state.set(Status::FINISHED);
                let _ = finished_tx.send(Ok(()));
            }));
        }));

        Box::pin(async move {
            finished_rx.await.map_err(|_| Error::LoopExpired)??;
            result_rx.await.map_err(|_| Error::LoopExpired)?
        })
    }

    /// As [`queue`](Self::queue), but the submission itself is deferred until the returned
    /// future is first polled.
    pub fn defer_queue<F, R>(&self, f: F) -> BoxFuture<'static, Result<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.clone();
        Box::pin(async move { this.queue(f).await })
    }

    /// Best-effort cancellation. Fails with [`Error::Busy`] if the worker already entered
    /// ACTIVE.
    pub fn cancel(&self) -> BoxFuture<'static, Result<()>> {
        if self.inner.state.try_cancel() {
            ready(Ok(()))
        } else {
            errored(Error::Busy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::Loop;
    use futures::executor::block_on;

    #[test]
    fn queue_resolves_with_result() {
        let l = Loop::make();
        let w = l.work();
        let fut = w.queue(|| 7);
        let _ = l.run(crate::event_loop::RunMode::Once);
        assert_eq!(block_on(fut).unwrap(), 7);
    }

    #[test]
    fn queue_after_finished_is_rejected() {
        let l = Loop::make();
        let w = l.work();
        let fut = w.queue(|| 1);
        let _ = l.run(crate::event_loop::RunMode::Once);
        block_on(fut).unwrap();
        let second = w.queue(|| 2);
        assert!(matches!(block_on(second), Err(Error::InvalidState)));
    }

    #[test]
    fn busy_while_active() {
        let l = Loop::make();
        let w = l.work();
        assert!(w.inner.state.try_activate());
        let fut = w.queue(|| 3);
        assert!(matches!(block_on(fut), Err(Error::Busy)));
    }
}
