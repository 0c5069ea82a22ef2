//! Backoff strategies for redelivery delays.
//!
//! Provides constant, linear, and exponential strategies with an optional
//! cap. Attempt semantics: the delay computed for attempt `a` is the wait
//! before the *next* delivery of a message currently on attempt `a`, so
//! attempt `0` already receives the full base delay.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use redelivery::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_secs(1)).with_max(Duration::from_secs(30));
//! assert_eq!(backoff.delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//! assert_eq!(backoff.delay(10), Duration::from_secs(30)); // capped
//! ```
//!
//! Overflow behavior: computations that exceed the representable `Duration`
//! range degrade to the cap when one is set, otherwise to `Duration::MAX` —
//! never an error.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffKind {
    Constant,
    Linear,
    Exponential,
}

/// Delay policy mapping an attempt number to the wait before redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// Constant delay: `base` for every attempt.
    pub fn constant(base: Duration) -> Self {
        Self { kind: BackoffKind::Constant, base, max: None }
    }

    /// Linear delay: `base * (attempt + 1)`.
    pub fn linear(base: Duration) -> Self {
        Self { kind: BackoffKind::Linear, base, max: None }
    }

    /// Exponential delay: `base * 2^attempt`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential, base, max: None }
    }

    /// Set a hard ceiling applied after the shape computation.
    ///
    /// The cap also bounds the overflow fallback: a computation that leaves
    /// the representable range returns the cap instead of `Duration::MAX`.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// The configured cap, if any.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Compute the delay before redelivering a message on the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            // Zero base short-circuits every shape, including 2^0 * 0.
            return Duration::ZERO;
        }
        match self.raw_delay(attempt) {
            Some(delay) => match self.max {
                Some(max) if delay > max => max,
                _ => delay,
            },
            None => self.max.unwrap_or(Duration::MAX),
        }
    }

    /// Shape computation without capping. `None` means the result left the
    /// representable `Duration` range.
    fn raw_delay(&self, attempt: u32) -> Option<Duration> {
        match self.kind {
            BackoffKind::Constant => Some(self.base),
            BackoffKind::Linear => {
                let nanos = self.base.as_nanos().checked_mul(u128::from(attempt) + 1)?;
                duration_from_nanos(nanos)
            }
            BackoffKind::Exponential => {
                let multiplier = 2u128.checked_pow(attempt)?;
                let nanos = self.base.as_nanos().checked_mul(multiplier)?;
                duration_from_nanos(nanos)
            }
        }
    }
}

fn duration_from_nanos(nanos: u128) -> Option<Duration> {
    if nanos > Duration::MAX.as_nanos() {
        return None;
    }
    let secs = (nanos / 1_000_000_000) as u64;
    let subsec = (nanos % 1_000_000_000) as u32;
    Some(Duration::new(secs, subsec))
}
