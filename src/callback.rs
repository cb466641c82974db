//! Callback identity and invocation types.
//!
//! A callback is an opaque unit of work: it receives the broadcast payload by
//! shared reference and produces no value the dispatcher observes, though it
//! may fail. Its identity is the id it was registered under.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error type a callback body may return.
///
/// The dispatcher never inspects or recovers from these; they are surfaced
/// unmodified to the `dispatch`/`wait_for` caller inside
/// [`DispatchError::Callback`](crate::DispatchError::Callback).
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A registered unit of work, invoked at most once per broadcast with the
/// broadcast payload.
pub type Callback<P> = Box<dyn FnMut(&P) -> Result<(), CallbackError>>;

/// Identifier for a registered callback.
///
/// Ids are allocated from a monotonic counter starting at 1, in registration
/// order, and are never reused for the lifetime of a dispatcher — not even
/// after the callback is unregistered. Ascending id order is therefore the
/// default broadcast order.
///
/// # Examples
///
/// ```
/// use flux_dispatch::Dispatcher;
///
/// let dispatcher: Dispatcher<()> = Dispatcher::new();
/// let first = dispatcher.register(|_| Ok(()));
/// let second = dispatcher.register(|_| Ok(()));
/// assert!(first < second);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(u64);

impl CallbackId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the underlying integer id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_id_ordering_follows_raw_value() {
        let a = CallbackId::from_raw(1);
        let b = CallbackId::from_raw(2);
        assert!(a < b);
        assert_eq!(a, CallbackId::from_raw(1));
    }

    #[test]
    fn test_callback_id_display() {
        let id = CallbackId::from_raw(42);
        assert_eq!(format!("{id}"), "42");
        assert_eq!(id.as_u64(), 42);
    }

    #[test]
    fn test_callback_id_serde_transparent() {
        let id = CallbackId::from_raw(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: CallbackId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
