//! registry
//!
//! Per §9 Design Notes: the source anchors each engine callback to its owning handle through a
//! heap-allocated weak pointer stashed in the engine's opaque data slot. We get the same
//! "detect a dropped owner, never touch freed memory" guarantee more cheaply by storing a
//! small integer id in the opaque slot instead, and keeping the strong/weak split in one
//! `Slab` keyed by that id.

use parking_lot::Mutex;
use slab::Slab;
use std::{
    any::Any,
    sync::{Arc, Weak},
};

/// A registry key standing in for "the engine's opaque data slot". Copy, so it is as cheap to
/// stash in a callback context as the raw pointer it replaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HandleId(usize);

enum Slot {
    Strong(Arc<dyn Any + Send + Sync>),
    Weak(Weak<dyn Any + Send + Sync>),
}

/// Owned by the `Loop`. Holds every registered handle, strongly (automatic lifetime
/// management) or weakly (`weak = true` registrations, per the Data Model's HandleData
/// description).
#[derive(Default)]
pub(crate) struct Registry {
    slots: Mutex<Slab<Slot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
        }
    }

    pub fn insert_strong(&self, value: Arc<dyn Any + Send + Sync>) -> HandleId {
        HandleId(self.slots.lock().insert(Slot::Strong(value)))
    }

    pub fn insert_weak(&self, value: &Arc<dyn Any + Send + Sync>) -> HandleId {
        HandleId(self.slots.lock().insert(Slot::Weak(Arc::downgrade(value))))
    }

    /// Reserve a fresh id with no payload worth upgrading — used by handle kinds (idle,
    /// prepare, check) that keep their own dispatch state out-of-band and only need the id
    /// for bookkeeping/tracing, not for the registry's usual upgrade-and-dispatch path.
    pub fn reserve(&self) -> HandleId {
        self.insert_strong(Arc::new(()))
    }

    /// Look up and downcast. Returns `None` if the id was removed or (for weak registrations)
    /// the owning handle has already been dropped — exactly the "expired weak reference, no
    /// user code runs" case from the close protocol.
    pub fn upgrade<T: Any + Send + Sync>(&self, id: HandleId) -> Option<Arc<T>> {
        let slots = self.slots.lock();
        let any = match slots.get(id.0)? {
            Slot::Strong(arc) => arc.clone(),
            Slot::Weak(weak) => weak.upgrade()?,
        };
        any.downcast::<T>().ok()
    }

    pub fn remove(&self, id: HandleId) {
        let mut slots = self.slots.lock();
        if slots.contains(id.0) {
            slots.remove(id.0);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
