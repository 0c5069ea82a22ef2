//! Telemetry for redelivery decisions.
//!
//! The coordinator emits one structured event per stage: an
//! [`RedeliveryEvent::Attempt`] after every evaluated processing attempt and
//! a [`RedeliveryEvent::Redeliver`] when a replacement is about to be
//! scheduled. Events flow through [`TelemetrySink`] implementations, which
//! can log, aggregate, or forward them.
//!
//! Sinks are `tower::Service<RedeliveryEvent>`s so they compose with
//! standard tower combinators. Emission is strictly best-effort: an unready
//! or failing sink drops the event and never affects the coordinator's
//! outcome.

use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// Severity attached to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Information => f.write_str("information"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Events emitted by the redelivery coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeliveryEvent {
    /// A processing attempt completed and was evaluated by the predicate.
    Attempt {
        /// Zero-based attempt number read from the message.
        attempt: u32,
        /// Wall time spent in the wrapped callback and predicate.
        duration: Duration,
        /// Whether the predicate asked for the outcome to be handled.
        handled: bool,
    },
    /// A replacement message is about to be scheduled.
    Redeliver {
        /// Zero-based attempt number read from the message.
        attempt: u32,
        /// The chosen delay before the replacement becomes visible.
        delay: Duration,
        /// Wall time spent in the wrapped callback and predicate.
        duration: Duration,
    },
}

impl RedeliveryEvent {
    /// Stable event name, usable as a metric or log key.
    pub fn name(&self) -> &'static str {
        match self {
            RedeliveryEvent::Attempt { .. } => "ExecutionAttempt",
            RedeliveryEvent::Redeliver { .. } => "OnRedeliver",
        }
    }

    /// Severity of this event: handled attempts and redeliveries are
    /// warnings, everything else is informational.
    pub fn severity(&self) -> Severity {
        match self {
            RedeliveryEvent::Attempt { handled, .. } => {
                if *handled {
                    Severity::Warning
                } else {
                    Severity::Information
                }
            }
            RedeliveryEvent::Redeliver { .. } => Severity::Warning,
        }
    }
}

impl fmt::Display for RedeliveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeliveryEvent::Attempt { attempt, duration, handled } => {
                write!(
                    f,
                    "ExecutionAttempt(#{}, duration={:?}, handled={})",
                    attempt, duration, handled
                )
            }
            RedeliveryEvent::Redeliver { attempt, delay, duration } => {
                write!(f, "OnRedeliver(#{}, delay={:?}, duration={:?})", attempt, delay, duration)
            }
        }
    }
}

/// A telemetry sink that consumes redelivery events.
///
/// A type alias-style trait over `tower::Service<RedeliveryEvent>`: any
/// clonable service taking events and returning `()` qualifies.
pub trait TelemetrySink:
    Service<RedeliveryEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Telemetry must never block or fail the decision path: if the sink is not
/// ready or returns an error, the event is dropped.
pub(crate) async fn emit_best_effort<S>(sink: S, event: RedeliveryEvent)
where
    S: Service<RedeliveryEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// A no-op sink that discards all events. The default sink of a policy.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<RedeliveryEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: RedeliveryEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A sink that logs events through `tracing`, mapping event severity to the
/// log level (warning → `warn!`, information → `info!`).
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<RedeliveryEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RedeliveryEvent) -> Self::Future {
        match event.severity() {
            Severity::Warning => tracing::warn!(event = %event, name = event.name(), "redelivery_event"),
            Severity::Information => tracing::info!(event = %event, name = event.name(), "redelivery_event"),
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A bounded in-memory sink. Oldest events are evicted past capacity.
///
/// Useful for tests and debugging.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<RedeliveryEvent>>>,
    capacity: usize,
}

impl MemorySink {
    /// Creates a bounded memory sink (default cap: 1,000).
    pub fn new() -> Self {
        Self::with_capacity(1_000)
    }

    /// Creates a bounded memory sink with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Arc::new(Mutex::new(Vec::new())), capacity: capacity.max(1) }
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<RedeliveryEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().expect("sink lock poisoned").clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<RedeliveryEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RedeliveryEvent) -> Self::Future {
        let mut events = self.events.lock().expect("sink lock poisoned");
        if events.len() == self.capacity {
            events.remove(0);
        }
        events.push(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt_event(handled: bool) -> RedeliveryEvent {
        RedeliveryEvent::Attempt { attempt: 1, duration: Duration::from_millis(5), handled }
    }

    #[test]
    fn severity_follows_handled_flag() {
        assert_eq!(attempt_event(true).severity(), Severity::Warning);
        assert_eq!(attempt_event(false).severity(), Severity::Information);
        let redeliver = RedeliveryEvent::Redeliver {
            attempt: 1,
            delay: Duration::from_secs(1),
            duration: Duration::from_millis(5),
        };
        assert_eq!(redeliver.severity(), Severity::Warning);
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(attempt_event(true).name(), "ExecutionAttempt");
        let redeliver = RedeliveryEvent::Redeliver {
            attempt: 0,
            delay: Duration::ZERO,
            duration: Duration::ZERO,
        };
        assert_eq!(redeliver.name(), "OnRedeliver");
    }

    #[test]
    fn display_includes_attempt_and_delay() {
        let event = RedeliveryEvent::Redeliver {
            attempt: 2,
            delay: Duration::from_secs(10),
            duration: Duration::from_millis(3),
        };
        let text = event.to_string();
        assert!(text.contains("#2"));
        assert!(text.contains("10s"));
    }

    #[tokio::test]
    async fn memory_sink_records_events() {
        let sink = MemorySink::new();
        emit_best_effort(sink.clone(), attempt_event(true)).await;
        emit_best_effort(sink.clone(), attempt_event(false)).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], attempt_event(true));
    }

    #[tokio::test]
    async fn memory_sink_evicts_oldest_past_capacity() {
        let sink = MemorySink::with_capacity(2);
        for n in 0..3u32 {
            emit_best_effort(
                sink.clone(),
                RedeliveryEvent::Attempt { attempt: n, duration: Duration::ZERO, handled: false },
            )
            .await;
        }
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RedeliveryEvent::Attempt { attempt: 1, .. }));
    }

    #[tokio::test]
    async fn null_sink_accepts_everything() {
        emit_best_effort(NullSink, attempt_event(true)).await;
    }

    #[tokio::test]
    async fn memory_sink_clear_resets() {
        let sink = MemorySink::new();
        emit_best_effort(sink.clone(), attempt_event(true)).await;
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
