//! event_loop
//!
//! Owns the engine loop, enforces thread affinity, and is the one factory for every handle and
//! request kind (§4.1). A `Loop` is a cheap `Arc`-backed handle; cloning it is how every other
//! type in this crate gets back to the loop that owns it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;
use futures::channel::oneshot;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config;
use crate::engine::{Job, Threadpool, TimerHeap};
use crate::error::{Error, Result};
use crate::futures::BoxFuture;
use crate::handle::async_handle::Async;
use crate::handle::check::Check;
use crate::handle::idle::Idle;
use crate::handle::prepare::Prepare;
use crate::handle::signal::{Signal, SignalInner};
use crate::handle::tick::TickInner;
use crate::handle::timer::{Timer, TimerInner};
use crate::handle::HandleKind;
use crate::registry::{HandleId, Registry};
use crate::request::Work;

const WAKE_TOKEN: mio::Token = mio::Token(0);

/// Which of the three run modes governs one call to [`Loop::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Block until at least one event/timer/task fires, same as `Once` in this crate's
    /// per-iteration model — see DESIGN.md for why this collapses two source modes into one.
    Default,
    /// Block until at least one event/timer/task fires.
    Once,
    /// Never block; drain whatever is already ready and return immediately.
    NoWait,
}

struct LoopState {
    poll: Mutex<mio::Poll>,
    waker: Arc<mio::Waker>,
    task_queue: SegQueue<Job>,
    registry: Registry,

    affinity: Mutex<Option<ThreadId>>,
    has_run: AtomicBool,
    stopped: AtomicBool,

    idle: Mutex<Vec<Arc<TickInner>>>,
    prepare: Mutex<Vec<Arc<TickInner>>>,
    check: Mutex<Vec<Arc<TickInner>>>,

    timers: Mutex<TimerHeap>,
    timers_registered: Mutex<HashMap<HandleId, Arc<TimerInner>>>,

    signals_registered: Mutex<HashMap<HandleId, Arc<SignalInner>>>,
    signal_map: Mutex<HashMap<i32, Vec<HandleId>>>,
    #[cfg(unix)]
    signal_bridge: Mutex<Option<crate::engine::signals::SignalBridge>>,

    threadpool: Threadpool,
}

/// A cooperative, single-threaded event loop. Cheap to clone (an `Arc` underneath); every
/// handle and request created from it holds its own clone so it can reach back into the loop
/// from any thread.
#[derive(Clone)]
pub struct Loop {
    inner: Arc<LoopState>,
}

impl Loop {
    /// Construct a loop owning a fresh engine poll instance. Records the calling thread as the
    /// provisional affinity thread (§4.1) — superseded by whichever thread next calls `run`.
    pub fn make() -> Self {
        let poll = mio::Poll::new().expect("failed to create mio::Poll");
        let waker =
            Arc::new(mio::Waker::new(poll.registry(), WAKE_TOKEN).expect("failed to create mio::Waker"));
        let inner = Arc::new(LoopState {
            poll: Mutex::new(poll),
            waker,
            task_queue: SegQueue::new(),
            registry: Registry::new(),
            affinity: Mutex::new(Some(std::thread::current().id())),
            has_run: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            idle: Mutex::new(Vec::new()),
            prepare: Mutex::new(Vec::new()),
            check: Mutex::new(Vec::new()),
            timers: Mutex::new(TimerHeap::new()),
            timers_registered: Mutex::new(HashMap::new()),
            signals_registered: Mutex::new(HashMap::new()),
            signal_map: Mutex::new(HashMap::new()),
            #[cfg(unix)]
            signal_bridge: Mutex::new(None),
            threadpool: Threadpool::new(config::threadpool_size()),
        });
        Self { inner }
    }

    /// The process-wide default loop, lazily initialized on first access.
    pub fn default_loop() -> Loop {
        static DEFAULT: OnceLock<Loop> = OnceLock::new();
        DEFAULT.get_or_init(Loop::make).clone()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    fn is_affinity_thread(&self) -> bool {
        match *self.inner.affinity.lock() {
            Some(id) => id == std::thread::current().id(),
            None => true,
        }
    }

    pub(crate) fn assert_affinity(&self) -> Result<()> {
        if !self.inner.has_run.load(Ordering::Acquire) || self.is_affinity_thread() {
            Ok(())
        } else {
            Err(Error::WrongThread)
        }
    }

    /// Run `f`, either inline (if already on the affinity thread, or the loop has never run)
    /// or marshalled onto the loop thread and awaited synchronously — this is the "factory
    /// internally schedules the creation" behavior of §4.1.
    fn marshal<T: Send + 'static>(&self, f: impl FnOnce(Loop) -> T + Send + 'static) -> T {
        if self.assert_affinity().is_ok() {
            f(self.clone())
        } else {
            let this = self.clone();
            let fut = self.schedule(move || f(this));
            futures::executor::block_on(fut).expect("marshalled factory call cannot panic-propagate")
        }
    }

    fn wake(&self) {
        if let Err(err) = self.inner.waker.wake() {
            warn!(%err, "failed to wake loop poller");
        }
    }

    /// Enqueue `f` onto the cross-thread task queue and wake the loop. Returns a future
    /// resolving to `f`'s return value (or `Error::Panic` if it panicked) — §4.1's
    /// `schedule(f, args…) -> shared_future<R>`.
    pub fn schedule<F, R>(&self, f: F) -> BoxFuture<'static, Result<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<R>>();
        let job: Job = Box::new(move || {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(Error::from_panic);
            let _ = tx.send(outcome);
        });
        self.inner.task_queue.push(job);
        self.wake();
        Box::pin(async move { rx.await.map_err(|_| Error::LoopExpired)? })
    }

    /// Enqueue a fire-and-forget job; used internally by `Async::send` and by signal dispatch,
    /// both of which already have their own result-delivery mechanism.
    pub(crate) fn schedule_void(&self, job: Job) {
        self.inner.task_queue.push(job);
        self.wake();
    }

    pub(crate) fn submit_work(&self, job: Job) {
        self.inner.threadpool.submit(job);
    }

    // --- tick (idle/prepare/check) bookkeeping -----------------------------------------------

    pub(crate) fn register_tick(&self, kind: HandleKind, inner: Arc<TickInner>) {
        let list = match kind {
            HandleKind::Idle => &self.inner.idle,
            HandleKind::Prepare => &self.inner.prepare,
            HandleKind::Check => &self.inner.check,
            _ => unreachable!("register_tick called with non-tick kind"),
        };
        list.lock().push(inner);
    }

    pub(crate) fn unregister_tick(&self, kind: HandleKind, id: HandleId) {
        let list = match kind {
            HandleKind::Idle => &self.inner.idle,
            HandleKind::Prepare => &self.inner.prepare,
            HandleKind::Check => &self.inner.check,
            _ => unreachable!("unregister_tick called with non-tick kind"),
        };
        list.lock().retain(|i| i.id != id);
        self.inner.registry.remove(id);
    }

    // --- timer bookkeeping -------------------------------------------------------------------

    pub(crate) fn register_timer(&self, inner: Arc<TimerInner>) {
        self.inner.timers_registered.lock().insert(inner.id, inner);
    }

    pub(crate) fn unregister_timer(&self, id: HandleId) {
        self.inner.timers_registered.lock().remove(&id);
        self.inner.registry.remove(id);
    }

    pub(crate) fn timer_heap_push(&self, id: HandleId, deadline: Instant) {
        self.inner.timers.lock().push(id, deadline);
    }

    // --- signal bookkeeping ------------------------------------------------------------------

    pub(crate) fn register_signal(&self, inner: Arc<SignalInner>) {
        self.inner.signals_registered.lock().insert(inner.id, inner);
    }

    pub(crate) fn unregister_signal(&self, id: HandleId) {
        let signum = self
            .inner
            .signals_registered
            .lock()
            .remove(&id)
            .and_then(|inner| inner.signum());
        if let Some(signum) = signum {
            if let Some(ids) = self.inner.signal_map.lock().get_mut(&signum) {
                ids.retain(|&existing| existing != id);
            }
        }
        self.inner.registry.remove(id);
    }

    #[cfg(unix)]
    pub(crate) fn bridge_signal(&self, id: HandleId, signum: i32) -> Result<()> {
        let mut bridge = self.inner.signal_bridge.lock();
        if bridge.is_none() {
            let this = self.clone();
            let spawned = crate::engine::signals::SignalBridge::spawn(move |signum| {
                this.dispatch_signal(signum);
            })
            .map_err(Error::from)?;
            *bridge = Some(spawned);
        }
        bridge.as_ref().unwrap().add_signal(signum).map_err(Error::from)?;
        self.inner
            .signal_map
            .lock()
            .entry(signum)
            .or_default()
            .push(id);
        Ok(())
    }

    #[cfg(not(unix))]
    pub(crate) fn bridge_signal(&self, _id: HandleId, _signum: i32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Called from the background signal-delivery thread; marshals dispatch onto the loop
    /// thread via the ordinary task queue so handle callbacks still only ever run there.
    fn dispatch_signal(&self, signum: i32) {
        let ids = self
            .inner
            .signal_map
            .lock()
            .get(&signum)
            .cloned()
            .unwrap_or_default();
        for id in ids {
            let registered = Arc::clone(&self.inner.signals_registered);
            self.schedule_void(Box::new(move || {
                if let Some(inner) = registered.lock().get(&id) {
                    inner.fire(signum);
                }
            }));
        }
    }

    // --- factories -----------------------------------------------------------------------------

    pub fn idle(&self) -> Idle {
        self.marshal(Idle::new)
    }

    pub fn prepare(&self) -> Prepare {
        self.marshal(Prepare::new)
    }

    pub fn check(&self) -> Check {
        self.marshal(Check::new)
    }

    pub fn timer(&self) -> Timer {
        self.marshal(Timer::new)
    }

    pub fn signal(&self) -> Signal {
        self.marshal(Signal::new)
    }

    pub fn async_handle<T, R>(&self, f: impl FnMut(T) -> R + Send + 'static) -> Async<T, R>
    where
        T: Send + 'static,
        R: Send + 'static,
    {
        self.marshal(move |l| Async::new(l, f))
    }

    pub fn work(&self) -> Work {
        self.marshal(Work::new)
    }

    // --- run loop ------------------------------------------------------------------------------

    /// Set when the loop has found nothing ready after draining every phase, so `run_forever`
    /// knows to sleep before the next call to `run`.
    fn poll_timeout(&self, mode: RunMode) -> Option<Duration> {
        if mode == RunMode::NoWait {
            return Some(Duration::ZERO);
        }
        let idle_busy = self.inner.idle.lock().iter().any(|i| i.is_active());
        if idle_busy {
            return Some(Duration::ZERO);
        }
        match self.inner.timers.lock().next_deadline() {
            Some(deadline) => Some(deadline.saturating_duration_since(Instant::now())),
            None => None,
        }
    }

    /// Run one iteration: prepare -> poll -> check -> drain cross-thread tasks -> fire due
    /// timers -> run idle. Returns the number of handles still active (a rough analogue of the
    /// engine's "pending handle count").
    pub fn run(&self, mode: RunMode) -> usize {
        self.inner.stopped.store(false, Ordering::Release);
        *self.inner.affinity.lock() = Some(std::thread::current().id());
        self.inner.has_run.store(true, Ordering::Release);

        for p in self.inner.prepare.lock().iter() {
            p.tick();
        }

        let timeout = self.poll_timeout(mode);
        {
            let mut events = mio::Events::with_capacity(64);
            let mut poll = self.inner.poll.lock();
            if let Err(err) = poll.poll(&mut events, timeout) {
                if err.kind() != std::io::ErrorKind::Interrupted {
                    warn!(%err, "poll failed");
                }
            }
        }

        for c in self.inner.check.lock().iter() {
            c.tick();
        }

        while let Some(job) = self.inner.task_queue.pop() {
            job();
        }

        let due = self.inner.timers.lock().pop_due(Instant::now());
        for id in due {
            let inner = self.inner.timers_registered.lock().get(&id).cloned();
            if let Some(inner) = inner {
                inner.fire();
                let repeat = inner.repeat();
                if !repeat.is_zero() {
                    self.timer_heap_push(id, Instant::now() + repeat);
                }
            }
        }

        for i in self.inner.idle.lock().iter() {
            i.tick();
        }

        self.pending_count()
    }

    fn pending_count(&self) -> usize {
        let idle = self.inner.idle.lock().iter().filter(|i| i.is_active()).count();
        let prepare = self.inner.prepare.lock().iter().filter(|i| i.is_active()).count();
        let check = self.inner.check.lock().iter().filter(|i| i.is_active()).count();
        let timers = self.inner.timers_registered.lock().len();
        let signals = self.inner.signals_registered.lock().len();
        idle + prepare + check + timers + signals
    }

    /// Run `run` repeatedly until `stop()` is called, sleeping `sleep_dur` between iterations
    /// that found nothing pending.
    pub fn run_forever(&self, sleep_dur: Duration, mode: RunMode) {
        while !self.inner.stopped.load(Ordering::Acquire) {
            let pending = self.run(mode);
            if pending == 0 || mode == RunMode::NoWait {
                std::thread::sleep(sleep_dur);
            }
        }
    }

    /// Request the loop to stop at the next opportunity. Callable from any thread.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn schedule_round_trip() {
        let l = Loop::make();
        let fut = l.schedule(|| 42);
        let _ = l.run(RunMode::Once);
        assert_eq!(block_on(fut).unwrap(), 42);
    }

    #[test]
    fn idle_runs_every_iteration() {
        let l = Loop::make();
        let idle = l.idle();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = Arc::clone(&count);
        idle.start(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        l.run(RunMode::NoWait);
        l.run(RunMode::NoWait);
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn stop_halts_run_forever() {
        let l = Loop::make();
        let l2 = l.clone();
        let handle = std::thread::spawn(move || {
            l2.run_forever(Duration::from_millis(1), RunMode::NoWait);
        });
        std::thread::sleep(Duration::from_millis(5));
        l.stop();
        handle.join().unwrap();
    }
}
