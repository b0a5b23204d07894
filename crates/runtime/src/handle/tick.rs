//! tick
//!
//! Shared plumbing behind `Idle`, `Prepare`, and `Check`: their bodies are uniform (§2 System
//! Overview — "init -> store continuation -> register with engine callback -> on fire, resolve
//! weak self + dispatch"), so this module implements it once and the three public types in
//! `idle.rs`/`prepare.rs`/`check.rs` are thin, differently-named wrappers.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event_loop::Loop;
use crate::futures::BoxFuture;
use crate::registry::HandleId;

use super::HandleKind;

pub(crate) struct TickInner {
    pub(crate) id: HandleId,
    pub(crate) kind: HandleKind,
    callback: Mutex<Option<Box<dyn FnMut() + Send>>>,
    closing: AtomicBool,
}

impl TickInner {
    pub(crate) fn tick(&self) {
        let mut guard = self.callback.lock();
        if let Some(cb) = guard.as_mut() {
            cb();
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.callback.lock().is_some()
    }
}

#[derive(Clone)]
pub(crate) struct TickHandle {
    inner: Arc<TickInner>,
    loop_: Loop,
}

impl TickHandle {
    pub(crate) fn new(loop_: Loop, kind: HandleKind) -> Self {
        let id = loop_.registry().reserve();
        let inner = Arc::new(TickInner {
            id,
            kind,
            callback: Mutex::new(None),
            closing: AtomicBool::new(false),
        });
        loop_.register_tick(kind, Arc::clone(&inner));
        trace!(kind = kind.name(), ?id, "handle initialized");
        Self { inner, loop_ }
    }

    pub(crate) fn id(&self) -> HandleId {
        self.inner.id
    }

    pub(crate) fn start(&self, f: impl FnMut() + Send + 'static) -> Result<()> {
        self.loop_.assert_affinity()?;
        *self.inner.callback.lock() = Some(Box::new(f));
        trace!(kind = self.inner.kind.name(), id = ?self.inner.id, "handle started");
        Ok(())
    }

    /// Halts dispatch without releasing registry/engine resources — distinct from `close` per
    /// the Design Notes' resolution of the stop-vs-close open question.
    pub(crate) fn stop(&self) -> Result<()> {
        self.loop_.assert_affinity()?;
        *self.inner.callback.lock() = None;
        trace!(kind = self.inner.kind.name(), id = ?self.inner.id, "handle stopped");
        Ok(())
    }

    pub(crate) fn is_active(&self) -> bool {
        self.inner.callback.lock().is_some()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self, f: impl FnOnce() + Send + 'static) -> BoxFuture<'static, Result<()>> {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return crate::futures::errored(Error::ClosedAlready);
        }
        *self.inner.callback.lock() = None;
        let loop_ = self.loop_.clone();
        let kind = self.inner.kind;
        let id = self.inner.id;
        loop_.unregister_tick(kind, id);
        trace!(kind = kind.name(), ?id, "handle closing");
        Box::pin(async move {
            f();
            Ok(())
        })
    }
}

