//! Callback registry: id allocation and storage.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::callback::{Callback, CallbackId};

/// Shared handle to a registered callback body.
///
/// Bodies live behind `Rc<RefCell<_>>` so an invocation already in flight
/// keeps the body alive even if the id is unregistered mid-broadcast.
pub(crate) type CallbackCell<P> = Rc<RefCell<Callback<P>>>;

/// Mapping from callback id to callback, with monotonic id allocation.
///
/// `BTreeMap` iteration is ascending id order, which is registration order —
/// the default broadcast order.
pub(crate) struct Registry<P> {
    callbacks: BTreeMap<CallbackId, CallbackCell<P>>,
    next_id: u64,
}

impl<P> Registry<P> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Stores the callback under the next unused id. The counter never
    /// resets, so ids are unique for the registry's lifetime even across
    /// unregistration.
    pub(crate) fn register(&mut self, callback: Callback<P>) -> CallbackId {
        let id = CallbackId::from_raw(self.next_id);
        self.next_id += 1;
        self.callbacks.insert(id, Rc::new(RefCell::new(callback)));
        id
    }

    /// Removes the entry if present. Absent ids are a no-op; returns whether
    /// anything was removed.
    pub(crate) fn unregister(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    pub(crate) fn get(&self, id: CallbackId) -> Option<CallbackCell<P>> {
        self.callbacks.get(&id).map(Rc::clone)
    }

    /// Snapshot of the registered ids in ascending order.
    pub(crate) fn ids(&self) -> Vec<CallbackId> {
        self.callbacks.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.callbacks.clear();
    }
}
