use redelivery::{InMemoryQueue, ManualClock, RedeliveryPolicyBuilder};
use std::fmt;
use std::sync::Once;
use std::time::{Duration, SystemTime};

/// Install a per-test tracing subscriber once per binary so sink logging is
/// visible under `--nocapture`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub &'static str);

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestError: {}", self.0)
    }
}

impl std::error::Error for TestError {}

/// A clock frozen at a fixed, recognizable wall time.
pub fn fixed_clock() -> ManualClock {
    ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
}

/// Builder pre-wired to the given queue for both capabilities.
pub fn policy_for(queue: &InMemoryQueue) -> RedeliveryPolicyBuilder<u64, TestError> {
    RedeliveryPolicyBuilder::new().sender(queue.clone()).receiver(queue.clone())
}
