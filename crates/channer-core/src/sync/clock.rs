//! Wall-clock source for envelope stamps

use crate::models::Timestamp;
use crate::util::unix_timestamp_millis_now;

/// Source of "now" in Unix milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        unix_timestamp_millis_now()
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use super::Clock;
    use crate::models::Timestamp;

    /// Clock that only moves when told to; clones share the same time
    #[derive(Debug, Clone, Default)]
    pub struct ManualClock(Arc<AtomicI64>);

    impl ManualClock {
        pub fn at(now: Timestamp) -> Self {
            Self(Arc::new(AtomicI64::new(now)))
        }

        pub fn set(&self, now: Timestamp) {
            self.0.store(now, Ordering::SeqCst);
        }

        pub fn advance(&self, millis: Timestamp) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> Timestamp {
            self.0.load(Ordering::SeqCst)
        }
    }
}
