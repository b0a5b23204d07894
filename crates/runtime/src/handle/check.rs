//! check

use super::tick::TickHandle;
use super::HandleKind;
use crate::error::Result;
use crate::event_loop::Loop;
use crate::futures::BoxFuture;

/// Fires once per loop iteration, immediately after the engine polls for I/O.
#[derive(Clone)]
pub struct Check {
    inner: TickHandle,
}

impl Check {
    pub(crate) fn new(loop_: Loop) -> Self {
        Self {
            inner: TickHandle::new(loop_, HandleKind::Check),
        }
    }

    pub fn start(&self, mut f: impl FnMut(Check) + Send + 'static) -> Result<()> {
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

    pub fn close(&self, f: impl FnOnce(Check) + Send + 'static) -> BoxFuture<'static, Result<()>> {
        let this = self.clone();
        self.inner.close(move || f(this))
    }
}
