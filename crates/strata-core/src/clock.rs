//! Wall-clock abstraction.
//!
//! Timestamps are truncated to microseconds everywhere so that values
//! survive a round trip through storage unchanged.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Source of "now" for version intervals and future-query checks.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Truncate to the precision stored by the engine.
pub fn to_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        to_precision(Utc::now())
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(to_precision(start)),
        }
    }

    pub fn set(&self, ts: DateTime<Utc>) {
        *self.lock() = to_precision(ts);
    }

    /// Move forward by `by` and return the new reading.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut current = self.lock();
        *current = to_precision(*current + by);
        *current
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid timestamp.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
