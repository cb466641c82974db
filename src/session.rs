//! Per-broadcast bookkeeping.

use std::collections::HashSet;
use std::rc::Rc;

use crate::callback::CallbackId;

/// Transient state for one broadcast.
///
/// A session exists only while a dispatch is in progress and is discarded
/// wholesale when the broadcast ends, whatever the outcome. `finished` is
/// always a subset of `started`: an id that is started but not finished is
/// currently executing, or blocked partway through a `wait_for` chain —
/// which is exactly what makes cycles detectable.
pub(crate) struct Session<P> {
    payload: Rc<P>,
    started: HashSet<CallbackId>,
    finished: HashSet<CallbackId>,
}

impl<P> Session<P> {
    pub(crate) fn new(payload: P) -> Self {
        Self {
            payload: Rc::new(payload),
            started: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// Cheap handle to the broadcast payload. `Rc` so a callback can read it
    /// without the engine pinning the session cell across the nested
    /// `wait_for` re-entry.
    pub(crate) fn payload(&self) -> Rc<P> {
        Rc::clone(&self.payload)
    }

    pub(crate) fn mark_started(&mut self, id: CallbackId) {
        self.started.insert(id);
    }

    /// Records completion, whether the body succeeded or failed.
    pub(crate) fn mark_finished(&mut self, id: CallbackId) {
        debug_assert!(self.started.contains(&id), "finish before start");
        self.finished.insert(id);
    }

    pub(crate) fn has_started(&self, id: CallbackId) -> bool {
        self.started.contains(&id)
    }

    pub(crate) fn has_finished(&self, id: CallbackId) -> bool {
        self.finished.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> CallbackId {
        CallbackId::from_raw(raw)
    }

    #[test]
    fn test_start_finish_lifecycle() {
        let mut session = Session::new("payload");
        assert!(!session.has_started(id(1)));

        session.mark_started(id(1));
        assert!(session.has_started(id(1)));
        assert!(!session.has_finished(id(1)));

        session.mark_finished(id(1));
        assert!(session.has_finished(id(1)));
    }

    #[test]
    fn test_payload_handle_is_shared() {
        let session = Session::new(vec![1, 2, 3]);
        let a = session.payload();
        let b = session.payload();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(*a, vec![1, 2, 3]);
    }
}
