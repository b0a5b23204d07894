//! prepare

use super::tick::TickHandle;
use super::HandleKind;
use crate::error::Result;
use crate::event_loop::Loop;
use crate::futures::BoxFuture;

/// Fires once per loop iteration, immediately before the engine polls for I/O.
#[derive(Clone)]
pub struct Prepare {
    inner: TickHandle,
}

impl Prepare {
    pub(crate) fn new(loop_: Loop) -> Self {
        Self {
            inner: TickHandle::new(loop_, HandleKind::Prepare),
        }
    }

    pub fn start(&self, mut f: impl FnMut(Prepare) + Send + 'static) -> Result<()> {
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

    pub fn close(&self, f: impl FnOnce(Prepare) + Send + 'static) -> BoxFuture<'static, Result<()>> {
        let this = self.clone();
        self.inner.close(move || f(this))
    }
}
