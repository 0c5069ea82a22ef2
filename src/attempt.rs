//! Attempt tracking: reading the redelivery counter out of a message and
//! deciding whether an attempt is terminal.
//!
//! The counter lives in the message's application properties under
//! [`ATTEMPT_NUMBER_KEY`]. Reads are defensive: a message with no counter,
//! or a counter of the wrong type or range, is attempt `0` (first
//! processing). The value [`UNBOUNDED_ATTEMPTS`] is a sentinel meaning
//! "retry forever": a message carrying it is never terminal and its counter
//! is frozen so it cannot wrap.

use crate::message::Message;

/// Reserved application-property key carrying the redelivery counter.
pub const ATTEMPT_NUMBER_KEY: &str = "AttemptNumber";

/// Sentinel attempt value meaning the message is retried indefinitely.
pub const UNBOUNDED_ATTEMPTS: u32 = u32::MAX;

/// Outcome of evaluating an attempt against the configured maximum.
///
/// `terminal` and `increment` are almost but not quite the same predicate:
/// at the sentinel the attempt is non-terminal *and* the counter must not
/// move, so conflating the two would corrupt the counter once retries are
/// configured as unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptDecision {
    /// This attempt exhausts the configured budget.
    pub terminal: bool,
    /// The replacement message should carry `attempt + 1`.
    pub increment: bool,
}

/// Read the current attempt number from a message.
///
/// Returns `0` when the reserved key is absent, not integer-typed, or
/// outside the `u32` range.
pub fn current_attempt(message: &Message) -> u32 {
    message
        .property(ATTEMPT_NUMBER_KEY)
        .and_then(|value| value.as_int())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

/// Decide whether `attempt` is terminal under `max_attempts`.
pub fn evaluate(attempt: u32, max_attempts: u32) -> AttemptDecision {
    if attempt == UNBOUNDED_ATTEMPTS {
        return AttemptDecision { terminal: false, increment: false };
    }
    AttemptDecision { terminal: attempt >= max_attempts, increment: true }
}

/// The counter value the replacement message should carry.
pub fn next_attempt(attempt: u32, decision: AttemptDecision) -> u32 {
    // increment is never set at the sentinel, so this cannot overflow.
    if decision.increment {
        attempt + 1
    } else {
        attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn missing_counter_reads_as_attempt_zero() {
        let msg = Message::new("payload");
        assert_eq!(current_attempt(&msg), 0);
    }

    #[test]
    fn integer_counter_is_read_back() {
        let msg = Message::new("payload").with_property(ATTEMPT_NUMBER_KEY, 4i64);
        assert_eq!(current_attempt(&msg), 4);
    }

    #[test]
    fn non_integer_counter_reads_as_zero() {
        let msg = Message::new("payload").with_property(ATTEMPT_NUMBER_KEY, "4");
        assert_eq!(current_attempt(&msg), 0);

        let msg = Message::new("payload").with_property(ATTEMPT_NUMBER_KEY, 4.0f64);
        assert_eq!(current_attempt(&msg), 0);
    }

    #[test]
    fn out_of_range_counter_reads_as_zero() {
        let msg = Message::new("payload").with_property(ATTEMPT_NUMBER_KEY, -1i64);
        assert_eq!(current_attempt(&msg), 0);

        let msg = Message::new("payload").with_property(ATTEMPT_NUMBER_KEY, i64::MAX);
        assert_eq!(current_attempt(&msg), 0);
    }

    #[test]
    fn attempt_below_max_is_not_terminal() {
        let decision = evaluate(2, 5);
        assert_eq!(decision, AttemptDecision { terminal: false, increment: true });
    }

    #[test]
    fn attempt_at_or_above_max_is_terminal() {
        assert!(evaluate(5, 5).terminal);
        assert!(evaluate(6, 5).terminal);
        // Increment still applies; only the sentinel freezes the counter.
        assert!(evaluate(5, 5).increment);
    }

    #[test]
    fn sentinel_is_never_terminal_and_freezes_counter() {
        let decision = evaluate(UNBOUNDED_ATTEMPTS, 5);
        assert_eq!(decision, AttemptDecision { terminal: false, increment: false });
        assert_eq!(next_attempt(UNBOUNDED_ATTEMPTS, decision), UNBOUNDED_ATTEMPTS);
    }

    #[test]
    fn next_attempt_increments_when_asked() {
        let decision = evaluate(2, 5);
        assert_eq!(next_attempt(2, decision), 3);
    }
}
