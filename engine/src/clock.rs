//! Wall clock used to stamp queued actions and sync runs.
//!
//! The clock is injected so tests can control `createdAt` ordering and the
//! status display delay without sleeping.

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis().max(0) as Timestamp
    }
}

/// A manually driven clock.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given timestamp.
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicU64::new(start),
        }
    }

    /// Move the clock forward and return the new value.
    pub fn advance(&self, millis: u64) -> Timestamp {
        self.millis.fetch_add(millis, Ordering::SeqCst) + millis
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, timestamp: Timestamp) {
        self.millis.store(timestamp, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_where_told() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now(), 1000);
    }

    #[test]
    fn advance_moves_forward() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.advance(250), 1250);
        assert_eq!(clock.now(), 1250);
    }

    #[test]
    fn set_jumps() {
        let clock = ManualClock::default();
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn system_clock_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_704_067_200_000);
    }
}
