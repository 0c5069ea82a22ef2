//! Broker capabilities consumed by the coordinator.
//!
//! These traits are the seam to the real broker client: a [`Sender`] that
//! enqueues messages to the source queue/topic and a [`Receiver`] that
//! settles the in-flight message it delivered. The coordinator never talks
//! wire protocol; it only drives these capabilities.

use crate::message::Message;
use async_trait::async_trait;

/// Error raised by a broker operation.
///
/// Transports surface their own error types; the coordinator folds them into
/// its outcome rather than interpreting them.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Enqueues messages to the queue/topic the original message came from.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Submit a message, honoring its scheduled enqueue time if set.
    async fn send(&self, message: Message) -> Result<(), TransportError>;
}

/// Settles messages on the receive link that delivered the original.
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Acknowledge the message as successfully handled.
    async fn complete(&self, message: &Message) -> Result<(), TransportError>;

    /// Release the message for immediate broker-native redelivery.
    async fn abandon(&self, message: &Message) -> Result<(), TransportError>;

    /// Set the message aside for explicit later retrieval.
    async fn defer(&self, message: &Message) -> Result<(), TransportError>;

    /// Move the message to the dead-letter destination.
    async fn dead_letter(&self, message: &Message) -> Result<(), TransportError>;
}
