#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # redelivery
//!
//! Broker-driven redelivery for async message processing: when handling a
//! received message fails, the message is acknowledged and a replacement is
//! scheduled for later delivery — with configurable backoff, a maximum
//! attempt count, and a terminal action once attempts are exhausted —
//! instead of letting the broker hammer the consumer with immediate
//! redeliveries.
//!
//! ## Features
//!
//! - **Backoff strategies** (constant, linear, exponential) with capping and
//!   graceful overflow
//! - **Attempt tracking** carried in message properties, with an unbounded
//!   "retry forever" sentinel
//! - **Terminal actions** (complete, abandon, defer, dead-letter) on
//!   exhaustion
//! - **Duplicate-over-loss transition**: the replacement is enqueued before
//!   the original is acknowledged
//! - **User hooks** for the handle predicate, delay override, and redelivery
//!   notification — sync closures or async trait impls
//! - **Telemetry sinks** as composable `tower` services
//!
//! ## Quick Start
//!
//! ```rust
//! use redelivery::{Backoff, InMemoryQueue, Message, RedeliveryContext, RedeliveryPolicy, TerminalAction};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = InMemoryQueue::new();
//!     let policy = RedeliveryPolicy::<(), std::io::Error>::builder()
//!         .sender(queue.clone())
//!         .receiver(queue.clone())
//!         .max_attempts(5)
//!         .backoff(Backoff::exponential(Duration::from_secs(30)).with_max(Duration::from_secs(600)))
//!         .terminal_action(TerminalAction::DeadLetter)
//!         .build()
//!         .unwrap();
//!
//!     let message = Message::new("payload");
//!     let outcome = policy
//!         .execute(&message, &RedeliveryContext::new(), || async {
//!             Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "flaky downstream"))
//!         })
//!         .await;
//!
//!     // The caller sees the original failure; the replacement was scheduled
//!     // as a side effect.
//!     assert!(outcome.is_err());
//!     assert_eq!(queue.sent().await.len(), 1);
//! }
//! ```

pub mod action;
pub mod attempt;
pub mod backoff;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod message;
pub mod telemetry;
pub mod transport;

mod transition;

// Re-exports
pub use action::TerminalAction;
pub use attempt::{AttemptDecision, ATTEMPT_NUMBER_KEY, UNBOUNDED_ATTEMPTS};
pub use backoff::Backoff;
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{
    DelayGenerator, DelayOverrideArgs, HandleFailures, HandlePredicate, OnRedeliverArgs,
    PredicateArgs, RedeliverHook, RedeliveryContext, RedeliveryPolicy, RedeliveryPolicyBuilder,
};
pub use error::{BuildError, RedeliveryError};
pub use memory::InMemoryQueue;
pub use message::{Message, PropertyValue};
pub use telemetry::{LogSink, MemorySink, NullSink, RedeliveryEvent, Severity, TelemetrySink};
pub use transport::{Receiver, Sender, TransportError};
