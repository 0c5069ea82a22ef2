//! Error types for the redelivery coordinator.
//!
//! Every path out of [`crate::RedeliveryPolicy::execute`] returns a single
//! `Result<T, RedeliveryError<E>>`: broker failures are converted to data
//! here instead of escaping as panics, and the caller never observes a
//! half-completed redelivery.

use crate::action::TerminalAction;
use crate::transport::TransportError;
use thiserror::Error;

/// Failure outcome of one coordinated processing attempt.
///
/// `Inner` carries the wrapped callback's own error. The broker variants
/// take precedence over it: a message left in an unresolved state outranks
/// whatever the processing failure was.
#[derive(Debug, Error)]
pub enum RedeliveryError<E> {
    /// The wrapped processing callback failed and no broker failure
    /// superseded it (the redelivery side effects, if any, succeeded).
    #[error(transparent)]
    Inner(E),

    /// The terminal action could not be applied; the message state is
    /// unresolved at the broker.
    #[error("terminal action `{action}` failed: {source}")]
    TerminalAction {
        action: TerminalAction,
        #[source]
        source: TransportError,
    },

    /// The acknowledge-original + enqueue-replacement transition failed.
    #[error("redelivery transition failed: {source}")]
    Transition {
        #[source]
        source: TransportError,
    },
}

impl<E> RedeliveryError<E> {
    /// Check whether this is the wrapped callback's own failure.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Borrow the inner processing error, if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Extract the inner processing error, if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Check whether a broker failure replaced the processing outcome.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TerminalAction { .. } | Self::Transition { .. })
    }
}

/// Errors produced while building a redelivery policy.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No sender was configured.
    #[error("a sender is required to schedule replacement messages")]
    MissingSender,

    /// No receiver was configured.
    #[error("a receiver is required to settle original messages")]
    MissingReceiver,

    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be >= 1 (got {0})")]
    InvalidMaxAttempts(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyError(&'static str);

    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for DummyError {}

    fn transport_err(msg: &'static str) -> TransportError {
        Box::new(DummyError(msg))
    }

    #[test]
    fn inner_is_transparent() {
        let err: RedeliveryError<DummyError> = RedeliveryError::Inner(DummyError("boom"));
        assert_eq!(err.to_string(), "boom");
        assert!(err.is_inner());
        assert!(!err.is_transport());
        assert_eq!(err.into_inner(), Some(DummyError("boom")));
    }

    #[test]
    fn terminal_action_display_names_the_action() {
        let err: RedeliveryError<DummyError> = RedeliveryError::TerminalAction {
            action: TerminalAction::DeadLetter,
            source: transport_err("link detached"),
        };
        let msg = err.to_string();
        assert!(msg.contains("dead-letter"));
        assert!(msg.contains("link detached"));
        assert!(err.is_transport());
        assert!(err.source().is_some());
    }

    #[test]
    fn transition_display_carries_source() {
        let err: RedeliveryError<DummyError> =
            RedeliveryError::Transition { source: transport_err("send refused") };
        assert!(err.to_string().contains("send refused"));
        assert!(err.as_inner().is_none());
        assert!(err.into_inner().is_none());
    }

    #[test]
    fn build_error_messages() {
        assert!(BuildError::MissingSender.to_string().contains("sender"));
        assert!(BuildError::MissingReceiver.to_string().contains("receiver"));
        assert!(BuildError::InvalidMaxAttempts(0).to_string().contains("got 0"));
    }
}
