//! Time source for gate evaluations.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the "now" a request is judged against. Read once per request.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> i64 {
        // Before 1970 only on a badly broken host; treat it as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

/// Clock frozen at a given instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_millis(&self) -> i64 {
        self.0
    }
}
