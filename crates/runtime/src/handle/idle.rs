//! idle

use super::tick::TickHandle;
use super::HandleKind;
use crate::error::Result;
use crate::event_loop::Loop;
use crate::futures::BoxFuture;

/// Fires once per loop iteration, unconditionally, for as long as it is active. Mirrors
/// `uv_idle_t`: mostly used to run low-priority work that should happen "whenever the loop is
/// free," or to keep the loop alive without a pending I/O source.
#[derive(Clone)]
pub struct Idle {
    inner: TickHandle,
}

impl Idle {
    pub(crate) fn new(loop_: Loop) -> Self {
        Self {
            inner: TickHandle::new(loop_, HandleKind::Idle),
        }
    }

    pub fn start(&self, mut f: impl FnMut(Idle) + Send + 'static) -> Result<()> {
        let this = self.clone();
        self.inner.start(move || f(this.clone()))
    }

    pub fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn is_closing(&self) -> bool {
        self.inner.is_closing()
    }

    pub fn close(&self, f: impl FnOnce(Idle) + Send + 'static) -> BoxFuture<'static, Result<()>> {
        let this = self.clone();
        self.inner.close(move || f(this))
    }
}
