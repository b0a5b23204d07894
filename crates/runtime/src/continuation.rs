//! continuation
//!
//! Binds a user callback to the slot that will eventually hold its result. The source's
//! `continuation<F, Args...>` leans on compile-time arity/self-type reflection to build that
//! binding generically over arbitrary callback shapes; we get the same generality for free from
//! Rust's closure typing (`FnOnce() -> R`), so the only job left here is the panic boundary and
//! the result channel (see §4.3 / §9 Design Notes: explicit tagging over reflection).

use crate::error::{Error, Result};
use futures::channel::oneshot;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A one-shot callback bound to a [`oneshot::Receiver`] that resolves once the callback has run.
///
/// `Continuation::fire` is the only way to run it — consuming `self` mirrors the source's
/// single-invocation continuation semantics (a continuation is either pending or already
/// dispatched, never both).
pub struct Continuation<R> {
    tx: oneshot::Sender<Result<R>>,
}

impl<R> Continuation<R> {
    /// Build a continuation, returning it paired with the future that resolves to its result.
    pub fn new() -> (Self, oneshot::Receiver<Result<R>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Run `f`, catching any panic and turning it into [`Error::Panic`], then deliver the
    /// outcome to the paired receiver. Dropping the receiver before this runs is not an error —
    /// the send is simply discarded, matching a detached/forgotten future.
    pub fn fire(self, f: impl FnOnce() -> R) {
        let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic);
        let _ = self.tx.send(outcome);
    }
}

/// As [`Continuation`], but passes a handle-scoped value `H` through to the callback. Used where
/// the source's continuation captures `self` (the owning handle) as its first reflected
/// argument — here that's just an explicit parameter instead of a reflected one.
pub struct ContinuationWithHandle<H, R> {
    handle: H,
    tx: oneshot::Sender<Result<R>>,
}

impl<H, R> ContinuationWithHandle<H, R> {
    pub fn new(handle: H) -> (Self, oneshot::Receiver<Result<R>>) {
        let (tx, rx) = oneshot::channel();
        (Self { handle, tx }, rx)
    }

    pub fn fire(self, f: impl FnOnce(H) -> R) {
        let handle = self.handle;
        let outcome = catch_unwind(AssertUnwindSafe(|| f(handle))).map_err(Error::from_panic);
        let _ = self.tx.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn fires_and_resolves() {
        let (cont, rx) = Continuation::new();
        cont.fire(|| 7);
        assert_eq!(block_on(rx).unwrap().unwrap(), 7);
    }

    #[test]
    fn captures_panics() {
        let (cont, rx) = Continuation::<i32>::new();
        cont.fire(|| panic!("boom"));
        let outcome = block_on(rx).unwrap();
        assert!(matches!(outcome, Err(Error::Panic(_))));
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (cont, rx) = Continuation::new();
        drop(rx);
        cont.fire(|| 1);
    }
}
