//! async
//!
//! The coalescing cross-thread wakeup (§4.4). `send` may be called from any thread; the
//! registered callback always runs on the loop thread. Two back-to-back `send`s may coalesce
//! into a single OS-level wakeup, but every `send` still gets its own promise and is still
//! dispatched — the `is_sending` flag dedupes *wakeups*, never *invocations*.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::channel::oneshot;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event_loop::Loop;
use crate::futures::{errored, BoxFuture};
use crate::registry::HandleId;

struct Pending<T, R> {
    args: T,
    tx: oneshot::Sender<R>,
}

struct Inner<T, R> {
    id: HandleId,
    callback: Mutex<Box<dyn FnMut(T) -> R + Send>>,
    pending: Mutex<VecDeque<Pending<T, R>>>,
    is_sending: AtomicBool,
    closing: AtomicBool,
}

/// A typed, coalescing cross-thread wakeup. `T` is the argument type `send` accepts; `R` is the
/// callback's return type.
pub struct Async<T, R> {
    inner: Arc<Inner<T, R>>,
    loop_: Loop,
}

impl<T, R> Clone for Async<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            loop_: self.loop_.clone(),
        }
    }
}

impl<T, R> Async<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(loop_: Loop, f: impl FnMut(T) -> R + Send + 'static) -> Self {
        let id = loop_.registry().reserve();
        Self {
            inner: Arc::new(Inner {
                id,
                callback: Mutex::new(Box::new(f)),
                pending: Mutex::new(VecDeque::new()),
                is_sending: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }),
            loop_,
        }
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Send `args` to the loop thread. May be called from any thread, including the loop
    /// thread itself — per the Design Notes, this is not special-cased.
    pub fn send(&self, args: T) -> BoxFuture<'static, Result<R>> {
        if self.inner.closing.load(Ordering::Acquire) {
            return errored(Error::AsyncClosed);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().push_back(Pending { args, tx });

        if !self.inner.is_sending.swap(true, Ordering::AcqRel) {
            let inner = Arc::clone(&self.inner);
            trace!(id = ?inner.id, "async wakeup scheduled");
            self.loop_.schedule_void(Box::new(move || drain(&inner)));
        }

        Box::pin(async move { rx.await.map_err(|_| Error::LoopExpired) })
    }

    /// As [`send`](Self::send), but the wakeup itself is deferred until the returned future is
    /// first polled.
    pub fn defer_send(&self, args: T) -> BoxFuture<'static, Result<R>> {
        let this = self.clone();
        Box::pin(async move { this.send(args).await })
    }

    pub fn close(&self) {
        self.inner.closing.store(true, Ordering::Release);
        self.inner.pending.lock().clear();
    }
}

impl Async<(), ()> {
    /// Fast path for a callback that takes no application parameters and returns nothing —
    /// this is how the `Loop`'s own cross-thread scheduler drain wakes itself.
    pub fn send_void(&self) -> BoxFuture<'static, Result<()>> {
        self.send(())
    }
}

fn drain<T, R>(inner: &Arc<Inner<T, R>>)
where
    T: Send + 'static,
    R: Send + 'static,
{
    loop {
        let batch: VecDeque<Pending<T, R>> = std::mem::take(&mut *inner.pending.lock());
        if batch.is_empty() {
            inner.is_sending.store(false, Ordering::Release);
            if inner.pending.lock().is_empty() {
                break;
            } else {
                continue;
            }
        }
        let mut callback = inner.callback.lock();
        for Pending { args, tx } in batch {
            let out = callback(args);
            let _ = tx.send(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::{Loop, RunMode};
    use futures::executor::block_on;

    #[test]
    fn send_resolves_on_loop_thread() {
        let l = Loop::make();
        let a = l.async_handle(|n: i32| n * 2);
        let fut = a.send(3);
        let _ = l.run(RunMode::Once);
        assert_eq!(block_on(fut).unwrap(), 6);
    }

    #[test]
    fn closed_async_rejects_send() {
        let l = Loop::make();
        let a = l.async_handle(|n: i32| n);
        a.close();
        let fut = a.send(1);
        assert!(matches!(block_on(fut), Err(Error::AsyncClosed)));
    }
}
