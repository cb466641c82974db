//! # flux-dispatch
//!
//! A synchronous, in-process broadcast dispatcher for unidirectional data
//! flow. One [`Dispatcher::dispatch`] call delivers a payload, before it
//! returns, to every registered callback; a callback may declare while it
//! runs that it must execute only after other callbacks have finished for
//! the same broadcast ([`Dispatcher::wait_for`]), and cycles among such
//! dependencies are detected and reported instead of recursing forever.
//!
//! ## Core concepts
//!
//! - **Dispatcher**: the engine — registry, per-broadcast session, and the
//!   dependency resolver
//! - **`CallbackId`**: opaque registration token, monotonic and never reused
//! - **`wait_for`**: a callback's mid-broadcast declaration that another
//!   callback must complete first
//! - **Store**: observable-state plumbing that binds a handler to the
//!   dispatcher and re-exposes a change notification
//!
//! ## Usage
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use flux_dispatch::{CallbackId, Dispatcher};
//!
//! let dispatcher: Dispatcher<&str> = Dispatcher::new();
//! let handle = dispatcher.clone();
//! let logger_id: Rc<Cell<Option<CallbackId>>> = Rc::new(Cell::new(None));
//!
//! // Registered first, so id order would run it first — but it defers to
//! // the logger for every broadcast.
//! let logger_slot = Rc::clone(&logger_id);
//! dispatcher.register(move |_| {
//!     if let Some(logger) = logger_slot.get() {
//!         handle.wait_for([logger])?;
//!     }
//!     Ok(())
//! });
//!
//! let logger = dispatcher.register(|payload: &&str| {
//!     assert_eq!(*payload, "saved");
//!     Ok(())
//! });
//! logger_id.set(Some(logger));
//!
//! dispatcher.dispatch("saved").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod store;

mod registry;
mod session;

pub use callback::{Callback, CallbackError, CallbackId};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use store::{ListenerId, Store, StoreHandler};
