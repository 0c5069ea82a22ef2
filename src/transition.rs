//! The redelivery transition: acknowledge the original message and enqueue
//! its delayed replacement.

use crate::attempt::ATTEMPT_NUMBER_KEY;
use crate::clock::Clock;
use crate::message::Message;
use crate::transport::{Receiver, Sender, TransportError};
use std::time::Duration;

/// Schedule horizon used when `now + delay` is not representable (100 years).
const MAX_SCHEDULE_HORIZON: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Build the replacement for `original`: same body and properties, counter
/// set to `next_attempt`, visible at `clock.now() + delay`.
fn replacement_for(
    original: &Message,
    delay: Duration,
    next_attempt: u32,
    clock: &dyn Clock,
) -> Message {
    let mut replacement = original.clone();
    replacement.set_property(ATTEMPT_NUMBER_KEY, i64::from(next_attempt));
    // Saturated delays (Duration::MAX) can push SystemTime past its range;
    // fall back to a horizon no broker will ever reach.
    let now = clock.now();
    let visible_at =
        now.checked_add(delay).unwrap_or_else(|| now + MAX_SCHEDULE_HORIZON);
    replacement.set_scheduled_enqueue_time(visible_at);
    replacement
}

/// Redeliver `message` through `sender` with `delay`, then settle the
/// original against `receiver`.
///
/// The capability traits expose no cross-operation transaction, so the two
/// effects run as an explicit two-phase protocol with the send first. A
/// failure before the send leaves everything untouched; a failure between
/// send and complete leaves the original un-acked, so the broker will
/// redeliver it and downstream consumers may see a duplicate — never a lost
/// message. Both failures surface as `Err` to the caller.
pub(crate) async fn redeliver_with_delay(
    message: &Message,
    sender: &dyn Sender,
    receiver: &dyn Receiver,
    delay: Duration,
    next_attempt: u32,
    clock: &dyn Clock,
) -> Result<(), TransportError> {
    let replacement = replacement_for(message, delay, next_attempt, clock);
    sender.send(replacement).await?;
    receiver.complete(message).await?;
    Ok(())
}
