//! Observable store plumbing bound to a dispatcher.
//!
//! A store registers a dispatch handler on construction, retains the
//! returned callback id, re-exposes a change notification to its own
//! listeners, and unregisters exactly once on teardown. The handler itself
//! is supplied by the user as a [`StoreHandler`] implementation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::callback::{CallbackError, CallbackId};
use crate::dispatcher::Dispatcher;

/// Dispatch-handling logic for a [`Store`].
///
/// The method has no default body on purpose: where the classic store base
/// class raises a fatal runtime error for a handler that was never
/// overridden, here the type system refuses the store outright.
pub trait StoreHandler<P> {
    /// Handles one broadcast. Return `Ok(true)` if the store's data changed;
    /// the store then notifies its change listeners. A returned error aborts
    /// the broadcast and surfaces to the `dispatch` caller.
    fn handle_dispatch(&mut self, payload: &P) -> Result<bool, CallbackError>;
}

/// Identifier for a change listener added via [`Store::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ListenerCell = Rc<RefCell<dyn FnMut()>>;

struct Shared<H> {
    handler: H,
    listeners: Vec<(ListenerId, ListenerCell)>,
    next_listener_id: u64,
}

/// An observable store bound to a [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use flux_dispatch::{CallbackError, Dispatcher, Store, StoreHandler};
///
/// struct Counter {
///     total: i64,
/// }
///
/// impl StoreHandler<i64> for Counter {
///     fn handle_dispatch(&mut self, payload: &i64) -> Result<bool, CallbackError> {
///         self.total += *payload;
///         Ok(true)
///     }
/// }
///
/// let dispatcher: Dispatcher<i64> = Dispatcher::new();
/// let store = Store::new(&dispatcher, Counter { total: 0 });
/// dispatcher.dispatch(5).unwrap();
/// assert_eq!(store.read(|counter| counter.total), 5);
/// ```
pub struct Store<P, H> {
    dispatcher: Dispatcher<P>,
    callback_id: CallbackId,
    shared: Rc<RefCell<Shared<H>>>,
    disposed: Cell<bool>,
}

impl<P, H> Store<P, H>
where
    P: 'static,
    H: StoreHandler<P> + 'static,
{
    /// Creates the store and registers its dispatch handler with
    /// `dispatcher`.
    pub fn new(dispatcher: &Dispatcher<P>, handler: H) -> Self {
        let shared = Rc::new(RefCell::new(Shared {
            handler,
            listeners: Vec::new(),
            next_listener_id: 1,
        }));
        let weak = Rc::downgrade(&shared);
        let callback_id = dispatcher.register(move |payload| Self::deliver(&weak, payload));
        trace!(callback_id = %callback_id, "store registered");
        Self {
            dispatcher: dispatcher.clone(),
            callback_id,
            shared,
            disposed: Cell::new(false),
        }
    }

    fn deliver(weak: &Weak<RefCell<Shared<H>>>, payload: &P) -> Result<(), CallbackError> {
        // A torn-down store is never notified, even if the registration were
        // somehow still live.
        let Some(shared) = weak.upgrade() else {
            return Ok(());
        };
        let changed = shared.borrow_mut().handler.handle_dispatch(payload)?;
        if changed {
            notify(&shared);
        }
        Ok(())
    }
}

impl<P, H> Store<P, H> {
    /// The id the store's handler is registered under. Sibling stores use it
    /// to sequence themselves via [`Dispatcher::wait_for`] — the classic
    /// dispatch-token pattern.
    #[must_use]
    pub const fn callback_id(&self) -> CallbackId {
        self.callback_id
    }

    /// Adds a change listener, returning an id for later removal.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut() + 'static,
    {
        let mut shared = self.shared.borrow_mut();
        let id = ListenerId(shared.next_listener_id);
        shared.next_listener_id += 1;
        shared.listeners.push((id, Rc::new(RefCell::new(listener))));
        id
    }

    /// Removes a change listener. Absent ids are a no-op.
    pub fn remove_change_listener(&self, id: ListenerId) {
        self.shared
            .borrow_mut()
            .listeners
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Notifies every change listener. Handlers normally trigger this by
    /// returning `Ok(true)`, but stores whose data changes outside a
    /// broadcast may emit directly.
    pub fn emit_change(&self) {
        notify(&self.shared);
    }

    /// Runs `f` with shared access to the handler state.
    pub fn read<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.shared.borrow().handler)
    }

    /// Unregisters the store's handler from the dispatcher. Idempotent, and
    /// also run on drop; after the first call the handler is never invoked
    /// again.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.dispatcher.unregister(self.callback_id);
        trace!(callback_id = %self.callback_id, "store disposed");
    }
}

impl<P, H> Drop for Store<P, H> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Calls every listener registered at the time of emission. Listener cells
/// are snapshotted first so a listener body may add or remove listeners.
fn notify<H>(shared: &Rc<RefCell<Shared<H>>>) {
    let listeners: Vec<ListenerCell> = shared
        .borrow()
        .listeners
        .iter()
        .map(|(_, listener)| Rc::clone(listener))
        .collect();
    for listener in listeners {
        (*listener.borrow_mut())();
    }
}
