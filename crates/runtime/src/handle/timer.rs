//! timer

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event_loop::Loop;
use crate::futures::BoxFuture;
use crate::registry::HandleId;

pub(crate) struct TimerInner {
    pub(crate) id: HandleId,
    callback: Mutex<Option<Box<dyn FnMut() + Send>>>,
    repeat: Mutex<Duration>,
    active: AtomicBool,
    closing: AtomicBool,
}

impl TimerInner {
    pub(crate) fn fire(&self) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut guard = self.callback.lock();
        if let Some(cb) = guard.as_mut() {
            cb();
        }
    }

    pub(crate) fn repeat(&self) -> Duration {
        *self.repeat.lock()
    }
}

/// Fires once after `timeout`, and then every `repeat` thereafter if `repeat` is non-zero
/// (§4.2's "timer" row). A `repeat` of zero is a single shot.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
    loop_: Loop,
}

impl Timer {
    pub(crate) fn new(loop_: Loop) -> Self {
        let id = loop_.registry().reserve();
        let inner = Arc::new(TimerInner {
            id,
            callback: Mutex::new(None),
            repeat: Mutex::new(Duration::ZERO),
            active: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        });
        loop_.register_timer(Arc::clone(&inner));
        Self { inner, loop_ }
    }

    pub fn start(
        &self,
        f: impl FnMut(Timer) + Send + 'static,
        timeout: Duration,
        repeat: Duration,
    ) -> Result<()> {
        self.loop_.assert_affinity()?;
        let this = self.clone();
        let mut f = f;
        *self.inner.callback.lock() = Some(Box::new(move || f(this.clone())));
        *self.inner.repeat.lock() = repeat;
        self.inner.active.store(true, Ordering::Release);
        self.loop_.timer_heap_push(self.inner.id, Instant::now() + timeout);
        trace!(id = ?self.inner.id, ?timeout, ?repeat, "timer started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.loop_.assert_affinity()?;
        self.inner.active.store(false, Ordering::Release);
        *self.inner.callback.lock() = None;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    pub fn close(&self, f: impl FnOnce(Timer) + Send + 'static) -> BoxFuture<'static, Result<()>> {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return crate::futures::errored(Error::ClosedAlready);
        }
        self.inner.active.store(false, Ordering::Release);
        *self.inner.callback.lock() = None;
        let this = self.clone();
        self.loop_.unregister_timer(self.inner.id);
        trace!(id = ?self.inner.id, "timer closing");
        Box::pin(async move {
            f(this);
            Ok(())
        })
    }
}
