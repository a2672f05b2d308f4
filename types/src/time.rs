//! Timestamps and the clock seam.
//!
//! Timestamps are Unix epoch seconds (UTC). All delay and deadline
//! arithmetic in the node is done against a `Clock` so tests can drive
//! time by hand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// This timestamp shifted forward by `secs`, saturating at `u64::MAX`.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp::new(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let start = Timestamp::new(100);
        assert!(!start.has_expired(60, Timestamp::new(159)));
        assert!(start.has_expired(60, Timestamp::new(160)));
        assert!(start.has_expired(60, Timestamp::new(161)));
    }

    #[test]
    fn elapsed_saturates_when_now_precedes_start() {
        let start = Timestamp::new(100);
        assert_eq!(start.elapsed_since(Timestamp::new(50)), 0);
        assert_eq!(start.elapsed_since(Timestamp::new(180)), 80);
    }

    #[test]
    fn plus_secs_saturates() {
        assert_eq!(Timestamp::new(u64::MAX).plus_secs(10).as_secs(), u64::MAX);
        assert_eq!(Timestamp::new(5).plus_secs(10).as_secs(), 15);
    }
}
