//! then
//!
//! Future chaining. Rust's ownership model means every future here is uniquely owned by its
//! caller (unlike the source's `shared_future`, which exists because C++ futures are otherwise
//! awkward to hand to more than one waiter) — see DESIGN.md for why this crate does not carry a
//! `Shared`-everywhere convention.

use pin_project_lite::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where a `then` continuation (or an `Async`/`Work` callback) is allowed to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchPolicy {
    /// Run inline, on whatever thread polls the antecedent to completion.
    Deferred,
    /// Run on the engine's own choice of thread (the loop thread, for loop-affine futures).
    Async,
    /// Run on a dedicated, unjoined thread. Fire-and-forget: `.get()`/`.await` still resolves,
    /// but dropping the returned future does not cancel the spawned thread.
    Detached,
    /// Let the engine decide between `Deferred` and `Async` (the source's `deferred|async`).
    Auto,
}

/// A future that already resolved to `value`.
pub fn ready<T>(value: T) -> BoxFuture<'static, T>
where
    T: Send + 'static,
{
    Box::pin(futures::future::ready(value))
}

/// A future that already resolved to an error.
pub fn errored<T>(err: crate::error::Error) -> BoxFuture<'static, crate::error::Result<T>>
where
    T: Send + 'static,
{
    Box::pin(futures::future::ready(Err(err)))
}

/// `then(fut, f)`: await `fut`, call `f` with its output, and — because `f` returns a future —
/// await that too. This is the "return-value collapse" half of §4.6: if `f` itself returns a
/// future, the caller never sees a `Future<Output = Future<Output = U>>`.
pub fn then<Fut, F, Fut2>(fut: Fut, f: F) -> BoxFuture<'static, Fut2::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send,
    F: FnOnce(Fut::Output) -> Fut2 + Send + 'static,
    Fut2: Future + Send + 'static,
    Fut2::Output: Send,
{
    Box::pin(async move {
        let value = fut.await;
        f(value).await
    })
}

/// As [`then`], but the antecedent is itself a future-of-a-future (one level of *input*
/// nesting), collapsed before `f` runs — the "recursive collapse" half of §4.6. This is the
/// exact shape of S6: `then_nested(ready(ready(5)), |x| ready(x + 1))`.
///
/// Deeper nesting collapses by calling `then_nested` again on the result, composing one level
/// at a time rather than via a generic reflection layer (see §9 Design Notes).
pub fn then_nested<Fut, F, Fut2>(fut: Fut, f: F) -> BoxFuture<'static, Fut2::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Future + Send + 'static,
    <Fut::Output as Future>::Output: Send,
    F: FnOnce(<Fut::Output as Future>::Output) -> Fut2 + Send + 'static,
    Fut2: Future + Send + 'static,
    Fut2::Output: Send,
{
    Box::pin(async move {
        let inner = fut.await.await;
        f(inner).await
    })
}

/// `then`, honoring an explicit [`LaunchPolicy`]. `Deferred`/`Async`/`Auto` all run inline on
/// whichever thread polls the antecedent to completion — the distinction between "deferred" and
/// "on the loop thread" only matters to callers that already hold a `Loop` handle, and those
/// callers route through `Loop::schedule` themselves rather than through this free function.
/// `Detached` spawns a dedicated unjoined thread and blocks it on the continuation.
pub fn then_with_policy<Fut, F, Fut2>(
    fut: Fut,
    f: F,
    policy: LaunchPolicy,
) -> BoxFuture<'static, Fut2::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send,
    F: FnOnce(Fut::Output) -> Fut2 + Send + 'static,
    Fut2: Future + Send + 'static,
    Fut2::Output: Send + 'static,
{
    match policy {
        LaunchPolicy::Detached => Box::pin(async move {
            let value = fut.await;
            let (tx, rx) = futures::channel::oneshot::channel();
            std::thread::spawn(move || {
                futures::executor::block_on(async move {
                    let out = f(value).await;
                    let _ = tx.send(out);
                });
            });
            rx.await
                .expect("detached `then` continuation dropped its sender without completing")
        }),
        _ => then(fut, f),
    }
}

pin_project! {
    /// A future wrapper that exposes `.then(f)` as a method, per §4.6's "`ThenableFuture`
    /// wrapper that chains".
    pub struct ThenableFuture<Fut> {
        #[pin]
        inner: Fut,
    }
}

impl<Fut> ThenableFuture<Fut>
where
    Fut: Future,
{
    pub fn new(inner: Fut) -> Self {
        Self { inner }
    }

    /// Chain `f` onto this future, collapsing `f`'s future return value.
    pub fn then<F, Fut2>(self, f: F) -> ThenableFuture<BoxFuture<'static, Fut2::Output>>
    where
        Fut: Send + 'static,
        Fut::Output: Send,
        F: FnOnce(Fut::Output) -> Fut2 + Send + 'static,
        Fut2: Future + Send + 'static,
        Fut2::Output: Send,
    {
        ThenableFuture::new(then(self.inner, f))
    }
}

impl<Fut> Future for ThenableFuture<Fut>
where
    Fut: Future,
{
    type Output = Fut::Output;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}
