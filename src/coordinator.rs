//! The redelivery coordinator.
//!
//! [`RedeliveryPolicy`] wraps one processing attempt of a received message
//! and decides what happens to the message afterwards: nothing (outcome not
//! handled), a terminal action (attempts exhausted), or the redelivery
//! transition (acknowledge the original, schedule a delayed replacement).
//!
//! The policy holds only immutable configuration and is cheap to clone;
//! concurrent `execute` calls for different messages are independent.
//!
//! Flow of one call, strictly sequential:
//!
//! ```text
//! Executing -> Evaluating -> Terminal   -> Done
//!                         \-> Scheduling -> Done
//! ```

use crate::action::{self, TerminalAction};
use crate::attempt;
use crate::backoff::Backoff;
use crate::clock::{Clock, SystemClock};
use crate::error::{BuildError, RedeliveryError};
use crate::message::Message;
use crate::telemetry::{emit_best_effort, NullSink, RedeliveryEvent, TelemetrySink};
use crate::transition;
use crate::transport::{Receiver, Sender};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum redelivery attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between redeliveries.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(30);

/// Arguments handed to the should-handle predicate.
pub struct PredicateArgs<'a, T, E> {
    /// Outcome of the wrapped processing callback.
    pub outcome: &'a Result<T, E>,
    /// Zero-based attempt number read from the message.
    pub attempt: u32,
}

/// Arguments handed to the delay override hook.
pub struct DelayOverrideArgs<'a, T, E> {
    /// Outcome of the wrapped processing callback.
    pub outcome: &'a Result<T, E>,
    /// Zero-based attempt number read from the message.
    pub attempt: u32,
}

/// Arguments handed to the redelivery notification hook.
pub struct OnRedeliverArgs<'a, T, E> {
    /// Outcome of the wrapped processing callback.
    pub outcome: &'a Result<T, E>,
    /// Zero-based attempt number read from the message.
    pub attempt: u32,
    /// The delay chosen for the replacement (override already applied).
    pub delay: Duration,
    /// Wall time spent in the callback and predicate.
    pub elapsed: Duration,
}

/// Decides whether an outcome warrants redelivery handling.
#[async_trait]
pub trait HandlePredicate<T, E>: Send + Sync {
    async fn should_handle<'a>(&self, args: PredicateArgs<'a, T, E>) -> bool;
}

/// Optionally replaces the computed backoff delay.
///
/// Returning `None` keeps the baseline delay. `Duration` admits no negative
/// value, so every returned delay is valid by construction.
#[async_trait]
pub trait DelayGenerator<T, E>: Send + Sync {
    async fn delay<'a>(&self, args: DelayOverrideArgs<'a, T, E>) -> Option<Duration>;
}

/// Notified once per scheduled redelivery, before the transition runs.
#[async_trait]
pub trait RedeliverHook<T, E>: Send + Sync {
    async fn on_redeliver<'a>(&self, args: OnRedeliverArgs<'a, T, E>);
}

/// Default predicate: handle any `Err` outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleFailures;

#[async_trait]
impl<T, E> HandlePredicate<T, E> for HandleFailures
where
    T: Sync,
    E: Sync,
{
    async fn should_handle<'a>(&self, args: PredicateArgs<'a, T, E>) -> bool {
        args.outcome.is_err()
    }
}

struct FnPredicate<F>(F);

#[async_trait]
impl<T, E, F> HandlePredicate<T, E> for FnPredicate<F>
where
    T: Sync,
    E: Sync,
    F: Fn(PredicateArgs<'_, T, E>) -> bool + Send + Sync,
{
    async fn should_handle<'a>(&self, args: PredicateArgs<'a, T, E>) -> bool {
        (self.0)(args)
    }
}

struct FnDelayGenerator<F>(F);

#[async_trait]
impl<T, E, F> DelayGenerator<T, E> for FnDelayGenerator<F>
where
    T: Sync,
    E: Sync,
    F: Fn(DelayOverrideArgs<'_, T, E>) -> Option<Duration> + Send + Sync,
{
    async fn delay<'a>(&self, args: DelayOverrideArgs<'a, T, E>) -> Option<Duration> {
        (self.0)(args)
    }
}

struct FnRedeliverHook<F>(F);

#[async_trait]
impl<T, E, F> RedeliverHook<T, E> for FnRedeliverHook<F>
where
    T: Sync,
    E: Sync,
    F: Fn(OnRedeliverArgs<'_, T, E>) + Send + Sync,
{
    async fn on_redeliver<'a>(&self, args: OnRedeliverArgs<'a, T, E>) {
        (self.0)(args)
    }
}

/// Per-invocation context carrying the cancellation flag.
///
/// Clones share the flag. Cancellation observed before the redelivery or
/// terminal decision short-circuits to returning the outcome unchanged; the
/// transition, once started, runs to completion or failure.
#[derive(Debug, Clone, Default)]
pub struct RedeliveryContext {
    cancelled: Arc<AtomicBool>,
}

impl RedeliveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Coordinates redelivery for messages processed under it.
///
/// Built with [`RedeliveryPolicy::builder`]. Holds only immutable
/// configuration; safe to clone and share across in-flight messages.
pub struct RedeliveryPolicy<T, E, S = NullSink> {
    sender: Arc<dyn Sender>,
    receiver: Arc<dyn Receiver>,
    max_attempts: u32,
    backoff: Backoff,
    terminal_action: TerminalAction,
    should_handle: Arc<dyn HandlePredicate<T, E>>,
    delay_override: Option<Arc<dyn DelayGenerator<T, E>>>,
    on_redeliver: Option<Arc<dyn RedeliverHook<T, E>>>,
    clock: Arc<dyn Clock>,
    telemetry: S,
}

impl<T, E, S: Clone> Clone for RedeliveryPolicy<T, E, S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            terminal_action: self.terminal_action,
            should_handle: self.should_handle.clone(),
            delay_override: self.delay_override.clone(),
            on_redeliver: self.on_redeliver.clone(),
            clock: self.clock.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

impl<T, E, S> std::fmt::Debug for RedeliveryPolicy<T, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedeliveryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("terminal_action", &self.terminal_action)
            .field("clock", &self.clock)
            .field("should_handle", &"<predicate>")
            .field("delay_override", &self.delay_override.as_ref().map(|_| "<generator>"))
            .field("on_redeliver", &self.on_redeliver.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl<T, E> RedeliveryPolicy<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Construct a new builder with defaults.
    pub fn builder() -> RedeliveryPolicyBuilder<T, E> {
        RedeliveryPolicyBuilder::new()
    }
}

impl<T, E, S> RedeliveryPolicy<T, E, S>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Process `message` once via `operation` and apply the redelivery
    /// decision to its outcome.
    ///
    /// Returns the operation's own outcome whenever the message ends up in a
    /// settled state: not handled, redelivered, or terminally actioned. A
    /// broker failure while settling replaces the outcome, because it leaves
    /// the message unresolved and must be surfaced.
    pub async fn execute<Op, Fut>(
        &self,
        message: &Message,
        cx: &RedeliveryContext,
        operation: Op,
    ) -> Result<T, RedeliveryError<E>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempt_number = attempt::current_attempt(message);
        let started = self.clock.now();

        let outcome = operation().await;

        let handled = self
            .should_handle
            .should_handle(PredicateArgs { outcome: &outcome, attempt: attempt_number })
            .await;
        let elapsed = self.clock.elapsed(started);

        emit_best_effort(
            self.telemetry.clone(),
            RedeliveryEvent::Attempt { attempt: attempt_number, duration: elapsed, handled },
        )
        .await;

        if cx.is_cancelled() || !handled {
            return outcome.map_err(RedeliveryError::Inner);
        }

        let decision = attempt::evaluate(attempt_number, self.max_attempts);

        if decision.terminal {
            return match action::apply(self.terminal_action, message, self.receiver.as_ref())
                .await
            {
                Ok(()) => outcome.map_err(RedeliveryError::Inner),
                Err(source) => {
                    // An unapplied terminal action outranks the processing
                    // failure: the message state is unresolved at the broker.
                    Err(RedeliveryError::TerminalAction { action: self.terminal_action, source })
                }
            };
        }

        let mut delay = self.backoff.delay(attempt_number);
        if let Some(generator) = &self.delay_override {
            let args = DelayOverrideArgs { outcome: &outcome, attempt: attempt_number };
            if let Some(overridden) = generator.delay(args).await {
                delay = overridden;
            }
        }

        emit_best_effort(
            self.telemetry.clone(),
            RedeliveryEvent::Redeliver { attempt: attempt_number, delay, duration: elapsed },
        )
        .await;

        if let Some(hook) = &self.on_redeliver {
            let args = OnRedeliverArgs {
                outcome: &outcome,
                attempt: attempt_number,
                delay,
                elapsed,
            };
            hook.on_redeliver(args).await;
        }

        let next = attempt::next_attempt(attempt_number, decision);
        match transition::redeliver_with_delay(
            message,
            self.sender.as_ref(),
            self.receiver.as_ref(),
            delay,
            next,
            self.clock.as_ref(),
        )
        .await
        {
            Ok(()) => outcome.map_err(RedeliveryError::Inner),
            Err(source) => Err(RedeliveryError::Transition { source }),
        }
    }
}

/// Builder for [`RedeliveryPolicy`].
pub struct RedeliveryPolicyBuilder<T, E, S = NullSink> {
    sender: Option<Arc<dyn Sender>>,
    receiver: Option<Arc<dyn Receiver>>,
    max_attempts: u32,
    backoff: Backoff,
    terminal_action: TerminalAction,
    should_handle: Arc<dyn HandlePredicate<T, E>>,
    delay_override: Option<Arc<dyn DelayGenerator<T, E>>>,
    on_redeliver: Option<Arc<dyn RedeliverHook<T, E>>>,
    clock: Arc<dyn Clock>,
    telemetry: S,
}

impl<T, E> RedeliveryPolicyBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Create a builder with defaults: 5 attempts, constant 30 s backoff,
    /// dead-letter on exhaustion, handle any failure, system clock, no sink.
    pub fn new() -> Self {
        Self {
            sender: None,
            receiver: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::constant(DEFAULT_BASE_DELAY),
            terminal_action: TerminalAction::DeadLetter,
            should_handle: Arc::new(HandleFailures),
            delay_override: None,
            on_redeliver: None,
            clock: Arc::new(SystemClock),
            telemetry: NullSink,
        }
    }
}

impl<T, E> Default for RedeliveryPolicyBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, S> RedeliveryPolicyBuilder<T, E, S>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Sender used to enqueue replacement messages (required).
    pub fn sender(mut self, sender: impl Sender + 'static) -> Self {
        self.sender = Some(Arc::new(sender));
        self
    }

    /// Receiver that delivered the original messages (required).
    pub fn receiver(mut self, receiver: impl Receiver + 'static) -> Self {
        self.receiver = Some(Arc::new(receiver));
        self
    }

    /// Maximum redelivery attempts. Must be at least 1; a message whose
    /// counter equals [`crate::attempt::UNBOUNDED_ATTEMPTS`] retries forever
    /// regardless.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Backoff shape for computed delays.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Disposition applied when attempts are exhausted.
    pub fn terminal_action(mut self, action: TerminalAction) -> Self {
        self.terminal_action = action;
        self
    }

    /// Predicate deciding whether an outcome warrants redelivery.
    pub fn should_handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(PredicateArgs<'_, T, E>) -> bool + Send + Sync + 'static,
    {
        self.should_handle = Arc::new(FnPredicate(predicate));
        self
    }

    /// Async-capable variant of [`Self::should_handle`].
    pub fn should_handle_with(mut self, predicate: impl HandlePredicate<T, E> + 'static) -> Self {
        self.should_handle = Arc::new(predicate);
        self
    }

    /// Hook that may replace the computed delay (`None` keeps it).
    pub fn delay_override<F>(mut self, generator: F) -> Self
    where
        F: Fn(DelayOverrideArgs<'_, T, E>) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delay_override = Some(Arc::new(FnDelayGenerator(generator)));
        self
    }

    /// Async-capable variant of [`Self::delay_override`].
    pub fn delay_override_with(mut self, generator: impl DelayGenerator<T, E> + 'static) -> Self {
        self.delay_override = Some(Arc::new(generator));
        self
    }

    /// Hook invoked once per scheduled redelivery, before the transition.
    pub fn on_redeliver<F>(mut self, hook: F) -> Self
    where
        F: Fn(OnRedeliverArgs<'_, T, E>) + Send + Sync + 'static,
    {
        self.on_redeliver = Some(Arc::new(FnRedeliverHook(hook)));
        self
    }

    /// Async-capable variant of [`Self::on_redeliver`].
    pub fn on_redeliver_with(mut self, hook: impl RedeliverHook<T, E> + 'static) -> Self {
        self.on_redeliver = Some(Arc::new(hook));
        self
    }

    /// Provide a custom clock (tests use [`crate::ManualClock`]).
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Provide a telemetry sink.
    pub fn telemetry<S2: TelemetrySink>(self, sink: S2) -> RedeliveryPolicyBuilder<T, E, S2> {
        RedeliveryPolicyBuilder {
            sender: self.sender,
            receiver: self.receiver,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            terminal_action: self.terminal_action,
            should_handle: self.should_handle,
            delay_override: self.delay_override,
            on_redeliver: self.on_redeliver,
            clock: self.clock,
            telemetry: sink,
        }
    }

    /// Build the policy, validating inputs.
    pub fn build(self) -> Result<RedeliveryPolicy<T, E, S>, BuildError> {
        let sender = self.sender.ok_or(BuildError::MissingSender)?;
        let receiver = self.receiver.ok_or(BuildError::MissingReceiver)?;
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(RedeliveryPolicy {
            sender,
            receiver,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            terminal_action: self.terminal_action,
            should_handle: self.should_handle,
            delay_override: self.delay_override,
            on_redeliver: self.on_redeliver,
            clock: self.clock,
            telemetry: self.telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueue;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn builder_requires_sender_and_receiver() {
        let err = RedeliveryPolicy::<u32, TestError>::builder().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingSender));

        let queue = InMemoryQueue::new();
        let err =
            RedeliveryPolicy::<u32, TestError>::builder().sender(queue).build().unwrap_err();
        assert!(matches!(err, BuildError::MissingReceiver));
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let queue = InMemoryQueue::new();
        let err = RedeliveryPolicy::<u32, TestError>::builder()
            .sender(queue.clone())
            .receiver(queue)
            .max_attempts(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidMaxAttempts(0)));
    }

    #[test]
    fn builder_applies_defaults() {
        let queue = InMemoryQueue::new();
        let policy = RedeliveryPolicy::<u32, TestError>::builder()
            .sender(queue.clone())
            .receiver(queue)
            .build()
            .unwrap();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.terminal_action, TerminalAction::DeadLetter);
        assert_eq!(policy.backoff, Backoff::constant(DEFAULT_BASE_DELAY));
        assert!(policy.delay_override.is_none());
        assert!(policy.on_redeliver.is_none());
    }

    #[tokio::test]
    async fn default_predicate_handles_failures_only() {
        let ok: Result<u32, TestError> = Ok(7);
        let err: Result<u32, TestError> = Err(TestError("boom"));

        assert!(!HandleFailures.should_handle(PredicateArgs { outcome: &ok, attempt: 0 }).await);
        assert!(HandleFailures.should_handle(PredicateArgs { outcome: &err, attempt: 0 }).await);
    }

    #[test]
    fn context_cancellation_is_shared_across_clones() {
        let cx = RedeliveryContext::new();
        let clone = cx.clone();
        assert!(!clone.is_cancelled());
        cx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn debug_does_not_require_hook_internals() {
        let queue = InMemoryQueue::new();
        let policy = RedeliveryPolicy::<u32, TestError>::builder()
            .sender(queue.clone())
            .receiver(queue)
            .should_handle(|args: PredicateArgs<'_, u32, TestError>| args.outcome.is_err())
            .build()
            .unwrap();
        let text = format!("{:?}", policy);
        assert!(text.contains("max_attempts"));
        assert!(text.contains("<predicate>"));
    }
}
