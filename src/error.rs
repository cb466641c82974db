//! Error types for the dispatcher.
//!
//! All failures are strongly typed using thiserror and surface synchronously
//! to the direct caller; nothing is retried or queued. A failed broadcast
//! never corrupts dispatcher state — the engine is dispatch-ready again as
//! soon as the erroring call returns.

use thiserror::Error;

use crate::callback::{CallbackError, CallbackId};

/// Top-level error type for dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `dispatch` was called while another dispatch was already in progress
    /// on the same dispatcher. Broadcasts never nest or interleave at the top
    /// level; sequencing inside a broadcast goes through `wait_for`.
    #[error("cannot dispatch in the middle of a dispatch")]
    DispatchInProgress,

    /// `wait_for` was called with no broadcast in progress.
    #[error("wait_for must be called during a dispatch")]
    NoActiveDispatch,

    /// `wait_for` referenced an id with no registered callback.
    #[error("no registered callback with id {id}")]
    UnknownCallback {
        /// The id that was waited on.
        id: CallbackId,
    },

    /// `wait_for` reached a callback that has started but not finished in the
    /// current broadcast, meaning the wait chain loops back on itself
    /// (directly or transitively).
    #[error("circular dependency detected while waiting for callback {id}")]
    CircularDependency {
        /// The id whose execution the chain looped back to.
        id: CallbackId,
    },

    /// A callback body failed. The broadcast is aborted after this callback;
    /// its own error is carried as the source.
    #[error("callback {id} failed during dispatch")]
    Callback {
        /// The id of the failing callback.
        id: CallbackId,
        /// The error the callback body returned.
        #[source]
        source: CallbackError,
    },
}

impl DispatchError {
    /// The callback id this error names, if any.
    #[must_use]
    pub const fn callback_id(&self) -> Option<CallbackId> {
        match self {
            Self::UnknownCallback { id }
            | Self::CircularDependency { id }
            | Self::Callback { id, .. } => Some(*id),
            Self::DispatchInProgress | Self::NoActiveDispatch => None,
        }
    }

    /// Returns true if this is a circular dependency error.
    #[must_use]
    pub const fn is_circular_dependency(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Returns true if this error came out of a callback body rather than
    /// the dispatcher itself.
    #[must_use]
    pub const fn is_callback_failure(&self) -> bool {
        matches!(self, Self::Callback { .. })
    }
}

/// Result type alias for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::CallbackId;
    use std::error::Error as _;

    fn id(raw: u64) -> CallbackId {
        CallbackId::from_raw(raw)
    }

    #[test]
    fn test_dispatch_in_progress_display() {
        let err = DispatchError::DispatchInProgress;
        let msg = format!("{err}");
        assert!(msg.contains("middle of a dispatch"));
        assert_eq!(err.callback_id(), None);
    }

    #[test]
    fn test_no_active_dispatch_display() {
        let err = DispatchError::NoActiveDispatch;
        let msg = format!("{err}");
        assert!(msg.contains("during a dispatch"));
    }

    #[test]
    fn test_unknown_callback_names_id() {
        let err = DispatchError::UnknownCallback { id: id(3) };
        let msg = format!("{err}");
        assert!(msg.contains("no registered callback"));
        assert!(msg.contains('3'));
        assert_eq!(err.callback_id(), Some(id(3)));
    }

    #[test]
    fn test_circular_dependency_names_id() {
        let err = DispatchError::CircularDependency { id: id(9) };
        let msg = format!("{err}");
        assert!(msg.contains("circular dependency"));
        assert!(msg.contains('9'));
        assert!(err.is_circular_dependency());
        assert!(!err.is_callback_failure());
    }

    #[test]
    fn test_callback_failure_carries_source() {
        let cause: CallbackError = "store exploded".into();
        let err = DispatchError::Callback {
            id: id(2),
            source: cause,
        };
        assert!(err.is_callback_failure());
        assert_eq!(err.callback_id(), Some(id(2)));
        let source = err.source().expect("source must be preserved");
        assert_eq!(format!("{source}"), "store exploded");
    }
}
