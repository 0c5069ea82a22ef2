//! In-process transport double.
//!
//! [`InMemoryQueue`] implements both broker capabilities and records every
//! operation it sees, so tests (this crate's and downstream users') can
//! assert on sends and settlements without a broker. Failure injection
//! forces transport errors deterministically.
//!
//! This is a recorder, not a broker: scheduled enqueue times are stored, not
//! honored, and nothing is ever delivered back out.

use crate::message::Message;
use crate::transport::{Receiver, Sender, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Error returned by an [`InMemoryQueue`] operation with failure injection on.
#[derive(Debug, Error)]
#[error("injected {op} failure")]
pub struct InjectedFailure {
    op: &'static str,
}

#[derive(Debug, Default)]
struct QueueState {
    sent: Vec<Message>,
    completed: Vec<Message>,
    abandoned: Vec<Message>,
    deferred: Vec<Message>,
    dead_lettered: Vec<Message>,
    fail_sends: bool,
    fail_receiver_ops: bool,
}

/// Recording in-memory implementation of [`Sender`] and [`Receiver`].
///
/// Cloning shares the recorded state, so a clone handed to a policy and the
/// original held by a test observe the same operations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages submitted through the sender, in order.
    pub async fn sent(&self) -> Vec<Message> {
        self.state.lock().await.sent.clone()
    }

    /// Messages acknowledged as complete.
    pub async fn completed(&self) -> Vec<Message> {
        self.state.lock().await.completed.clone()
    }

    /// Messages released for broker-native redelivery.
    pub async fn abandoned(&self) -> Vec<Message> {
        self.state.lock().await.abandoned.clone()
    }

    /// Messages set aside for later retrieval.
    pub async fn deferred(&self) -> Vec<Message> {
        self.state.lock().await.deferred.clone()
    }

    /// Messages moved to the dead-letter destination.
    pub async fn dead_lettered(&self) -> Vec<Message> {
        self.state.lock().await.dead_lettered.clone()
    }

    /// Make subsequent `send` calls fail.
    pub async fn fail_sends(&self, fail: bool) {
        self.state.lock().await.fail_sends = fail;
    }

    /// Make subsequent receiver operations fail.
    pub async fn fail_receiver_ops(&self, fail: bool) {
        self.state.lock().await.fail_receiver_ops = fail;
    }

    async fn settle(
        &self,
        message: &Message,
        op: &'static str,
        pick: impl FnOnce(&mut QueueState) -> &mut Vec<Message>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.fail_receiver_ops {
            return Err(Box::new(InjectedFailure { op }));
        }
        pick(&mut state).push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl Sender for InMemoryQueue {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.fail_sends {
            return Err(Box::new(InjectedFailure { op: "send" }));
        }
        state.sent.push(message);
        Ok(())
    }
}

#[async_trait]
impl Receiver for InMemoryQueue {
    async fn complete(&self, message: &Message) -> Result<(), TransportError> {
        self.settle(message, "complete", |s| &mut s.completed).await
    }

    async fn abandon(&self, message: &Message) -> Result<(), TransportError> {
        self.settle(message, "abandon", |s| &mut s.abandoned).await
    }

    async fn defer(&self, message: &Message) -> Result<(), TransportError> {
        self.settle(message, "defer", |s| &mut s.deferred).await
    }

    async fn dead_letter(&self, message: &Message) -> Result<(), TransportError> {
        self.settle(message, "dead_letter", |s| &mut s.dead_lettered).await
    }
}
