//! Terminal dispositions applied once redelivery attempts are exhausted.

use crate::message::Message;
use crate::transport::{Receiver, TransportError};
use std::fmt;

/// Final disposition for a message whose attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// Acknowledge the message as handled.
    Complete,
    /// Release it for immediate broker-native redelivery.
    Abandon,
    /// Set it aside for explicit later retrieval.
    Defer,
    /// Move it to the dead-letter destination.
    DeadLetter,
}

impl fmt::Display for TerminalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminalAction::Complete => "complete",
            TerminalAction::Abandon => "abandon",
            TerminalAction::Defer => "defer",
            TerminalAction::DeadLetter => "dead-letter",
        };
        f.write_str(name)
    }
}

/// Apply a terminal action against the receiver.
///
/// Receiver failures come back as values so the coordinator can fold them
/// into its outcome.
pub(crate) async fn apply(
    action: TerminalAction,
    message: &Message,
    receiver: &dyn Receiver,
) -> Result<(), TransportError> {
    match action {
        TerminalAction::Complete => receiver.complete(message).await,
        TerminalAction::Abandon => receiver.abandon(message).await,
        TerminalAction::Defer => receiver.defer(message).await,
        TerminalAction::DeadLetter => receiver.dead_letter(message).await,
    }
}
