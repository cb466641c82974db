//! The dispatch engine: callback registration, the single-pass broadcast,
//! and the `wait_for` dependency protocol with cycle detection.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::callback::{CallbackError, CallbackId};
use crate::error::{DispatchError, DispatchResult};
use crate::registry::{CallbackCell, Registry};
use crate::session::Session;

/// Synchronous broadcast dispatcher for unidirectional data flow.
///
/// One `dispatch` call delivers the payload to every registered callback
/// before it returns. A callback may declare, while it runs, that it depends
/// on other callbacks having finished for this broadcast by calling
/// [`wait_for`](Dispatcher::wait_for); dependencies are satisfied by direct
/// nested invocation, and cycles among them are detected and reported.
///
/// The dispatcher is a cheaply cloneable handle over shared state, so
/// callbacks can capture a clone to call `wait_for` from inside a broadcast.
/// It is single-threaded by construction (`Rc`-based, hence not `Send`);
/// there is exactly one broadcast in progress at any time and a nested
/// top-level `dispatch` is rejected outright.
///
/// # Examples
///
/// ```
/// use flux_dispatch::Dispatcher;
///
/// let dispatcher: Dispatcher<String> = Dispatcher::new();
/// let id = dispatcher.register(|payload: &String| {
///     assert_eq!(payload, "hello");
///     Ok(())
/// });
///
/// dispatcher.dispatch("hello".to_string()).unwrap();
/// dispatcher.unregister(id);
/// ```
pub struct Dispatcher<P> {
    inner: Rc<Inner<P>>,
}

struct Inner<P> {
    registry: RefCell<Registry<P>>,
    /// `None` while idle, `Some` while a broadcast is in progress. The
    /// re-entrancy guard and the session state are the same thing.
    session: RefCell<Option<Session<P>>>,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the session when a broadcast ends, on every exit path — normal
/// return, callback failure, or unwind — so the dispatcher is immediately
/// dispatch-ready again and can never be left wedged.
struct SessionTeardown<'a, P> {
    inner: &'a Inner<P>,
}

impl<P> Drop for SessionTeardown<'_, P> {
    fn drop(&mut self) {
        self.inner.session.replace(None);
    }
}

impl<P> Dispatcher<P> {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                registry: RefCell::new(Registry::new()),
                session: RefCell::new(None),
            }),
        }
    }

    /// Registers the given callback so it receives payloads from future
    /// broadcasts, and returns its id.
    ///
    /// Registration is allowed at any time, including from inside a running
    /// callback; a callback registered mid-broadcast only participates from
    /// the next broadcast onward.
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: FnMut(&P) -> Result<(), CallbackError> + 'static,
    {
        let id = self.inner.registry.borrow_mut().register(Box::new(callback));
        trace!(callback_id = %id, "registered callback");
        id
    }

    /// Unregisters the callback with the given id. Absent ids are a no-op.
    ///
    /// Unregistering mid-broadcast never has retroactive effect: an id that
    /// already started in the current session is unaffected, and one that has
    /// not started yet is simply skipped by the remainder of the pass (a
    /// `wait_for` naming it reports [`DispatchError::UnknownCallback`]).
    pub fn unregister(&self, id: CallbackId) {
        if self.inner.registry.borrow_mut().unregister(id) {
            trace!(callback_id = %id, "unregistered callback");
        }
    }

    /// Returns true while a broadcast is in progress on this dispatcher.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    /// Delivers `payload` to every currently registered callback, in
    /// ascending id order, before returning.
    ///
    /// The first callback failure aborts the rest of the pass and is
    /// returned; callbacks that had not started by then simply run on the
    /// next broadcast. On every exit path the session is torn down before
    /// this method returns, so the dispatcher always accepts a new
    /// `dispatch` afterward.
    ///
    /// # Errors
    ///
    /// [`DispatchError::DispatchInProgress`] if a broadcast is already in
    /// progress, or [`DispatchError::Callback`] carrying the first callback
    /// failure.
    pub fn dispatch(&self, payload: P) -> DispatchResult<()> {
        {
            let mut session = self.inner.session.borrow_mut();
            if session.is_some() {
                return Err(DispatchError::DispatchInProgress);
            }
            *session = Some(Session::new(payload));
        }
        let _teardown = SessionTeardown {
            inner: &*self.inner,
        };

        let pending = self.inner.registry.borrow().ids();
        debug!(callbacks = pending.len(), "dispatch started");

        for id in pending {
            if self.with_session(|session| session.has_started(id))? {
                // Pulled forward by an earlier callback's wait_for.
                continue;
            }
            let Some(callback) = self.inner.registry.borrow().get(id) else {
                // Unregistered after the session snapshot; skip it.
                continue;
            };
            self.run_callback(id, callback)?;
        }

        debug!("dispatch finished");
        Ok(())
    }

    /// Blocks — in the nested-invocation sense — until every callback named
    /// by `ids` has finished in the current broadcast, running any that have
    /// not started yet before returning. Ids are processed in the order
    /// given; a single dependency is spelled `wait_for([id])`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NoActiveDispatch`] outside a broadcast,
    /// [`DispatchError::UnknownCallback`] for an id with no registered
    /// callback, [`DispatchError::CircularDependency`] when the wait chain
    /// loops back to a callback that is still executing (including waiting
    /// on yourself), or [`DispatchError::Callback`] if a dependency's body
    /// fails while being run.
    pub fn wait_for<I>(&self, ids: I) -> DispatchResult<()>
    where
        I: IntoIterator<Item = CallbackId>,
    {
        if !self.is_dispatching() {
            return Err(DispatchError::NoActiveDispatch);
        }

        for id in ids {
            let (started, finished) =
                self.with_session(|session| (session.has_started(id), session.has_finished(id)))?;
            if finished {
                trace!(callback_id = %id, "wait_for dependency already satisfied");
                continue;
            }
            if started {
                return Err(DispatchError::CircularDependency { id });
            }
            let Some(callback) = self.inner.registry.borrow().get(id) else {
                return Err(DispatchError::UnknownCallback { id });
            };
            trace!(callback_id = %id, "wait_for running dependency");
            self.run_callback(id, callback)?;
        }
        Ok(())
    }

    /// Clears every registration and any in-flight session bookkeeping.
    ///
    /// Callbacks commonly capture a clone of the dispatcher handle; dropping
    /// them here is what breaks the resulting reference cycle. Disposal
    /// during an active dispatch is not a supported sequence.
    pub fn dispose(&self) {
        self.inner.registry.borrow_mut().clear();
        self.inner.session.replace(None);
        debug!("dispatcher disposed");
    }

    /// Number of currently registered callbacks.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Marks `id` started, invokes its body with the session payload, then
    /// marks it finished. Started flips before invocation so a re-entrant
    /// wait on the same id is seen as circular instead of being re-run;
    /// finished is recorded whether the body succeeds or fails.
    fn run_callback(&self, id: CallbackId, callback: CallbackCell<P>) -> DispatchResult<()> {
        let payload = self.with_session(|session| {
            session.mark_started(id);
            session.payload()
        })?;

        trace!(callback_id = %id, "running callback");
        let outcome = {
            let mut body = callback.borrow_mut();
            (*body)(&payload)
        };

        self.with_session(|session| session.mark_finished(id))?;
        outcome.map_err(|source| DispatchError::Callback { id, source })
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session<P>) -> T) -> DispatchResult<T> {
        let mut slot = self.inner.session.borrow_mut();
        slot.as_mut().map(f).ok_or(DispatchError::NoActiveDispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_dispatch_with_no_callbacks_is_ok() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        assert!(dispatcher.dispatch(1).is_ok());
        assert!(!dispatcher.is_dispatching());
    }

    #[test]
    fn test_register_returns_increasing_ids() {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let a = dispatcher.register(|_| Ok(()));
        let b = dispatcher.register(|_| Ok(()));
        assert_eq!(a.as_u64(), 1);
        assert_eq!(b.as_u64(), 2);
        assert_eq!(dispatcher.registered_count(), 2);
    }

    #[test]
    fn test_is_dispatching_inside_callback() {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let handle = dispatcher.clone();
        let observed = Rc::new(Cell::new(false));
        let observed_inner = Rc::clone(&observed);
        dispatcher.register(move |_| {
            observed_inner.set(handle.is_dispatching());
            Ok(())
        });

        assert!(!dispatcher.is_dispatching());
        dispatcher.dispatch(()).unwrap();
        assert!(observed.get());
        assert!(!dispatcher.is_dispatching());
    }

    #[test]
    fn test_wait_for_outside_dispatch_fails() {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let id = dispatcher.register(|_| Ok(()));
        let err = dispatcher.wait_for([id]).unwrap_err();
        assert!(matches!(err, DispatchError::NoActiveDispatch));
    }

    #[test]
    fn test_dispose_clears_registrations() {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let ran = Rc::new(Cell::new(0u32));
        let ran_inner = Rc::clone(&ran);
        dispatcher.register(move |_| {
            ran_inner.set(ran_inner.get() + 1);
            Ok(())
        });

        dispatcher.dispose();
        assert_eq!(dispatcher.registered_count(), 0);
        dispatcher.dispatch(()).unwrap();
        assert_eq!(ran.get(), 0);
    }

    #[test]
    fn test_payload_is_dropped_at_teardown() {
        struct Tracked(Rc<Cell<bool>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let dispatcher: Dispatcher<Tracked> = Dispatcher::new();
        dispatcher.register(|_| Ok(()));
        dispatcher.dispatch(Tracked(Rc::clone(&dropped))).unwrap();
        assert!(dropped.get());
    }
}
