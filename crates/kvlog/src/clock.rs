//! Time sources for new versions.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use kvlog_types::Timestamp;

/// Source of timestamps for appended versions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Raw wall-clock time.
///
/// Two calls within the clock's resolution may return the same value; a
/// second write to the same key then fails with `DuplicateVersion`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Wall-clock time that never repeats or goes backwards within a process.
///
/// When the wall clock has not advanced past the last returned value, the
/// clock returns `last + 1ns` instead.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<Timestamp>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::now();
        // A poisoned lock only means another caller panicked mid-update; the
        // stored value is still a valid lower bound.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = match *last {
            Some(prev) if wall <= prev => prev.succ(),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

/// Manually driven clock for tests and deterministic replays.
///
/// Returns the current reading and then advances it by `step`. A zero step
/// freezes time.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicI64,
    step: i64,
}

impl ManualClock {
    /// A clock reading `start` that advances by 1ns per call.
    pub fn new(start: Timestamp) -> Self {
        Self::with_step(start, Duration::from_nanos(1))
    }

    /// A clock reading `start` that advances by `step` per call.
    pub fn with_step(start: Timestamp, step: Duration) -> Self {
        Self {
            nanos: AtomicI64::new(start.as_nanos()),
            step: i64::try_from(step.as_nanos()).unwrap_or(i64::MAX),
        }
    }

    /// A clock that always returns `at`.
    pub fn frozen(at: Timestamp) -> Self {
        Self::with_step(at, Duration::ZERO)
    }

    /// The value the next call to `now` will return.
    pub fn peek(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    /// Jump to `to`.
    pub fn set(&self, to: Timestamp) {
        self.nanos.store(to.as_nanos(), Ordering::SeqCst);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_nanos()).unwrap_or(i64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(by))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let step = self.step;
        let previous = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(step))
            })
            .unwrap_or_else(|n| n);
        Timestamp::from_nanos(previous)
    }
}
