//! Time source and poll cadence.
//!
//! The poll loop never reads the wall clock directly. It asks a [`Clock`]
//! for the time elapsed since start and lets a [`PollSchedule`] decide
//! whether a poll is due, so tests can drive the cadence by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

pub trait Clock {
    /// Time elapsed since the clock started.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Monotonic clock backed by the runtime timer.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(by, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }
}

/// Fixed-interval poll cadence.
///
/// The first poll is due immediately; after that a poll is due once strictly
/// more than `interval` has passed since the last one started. Time spent
/// inside a poll (including audio playback) counts toward the next interval,
/// and missed ticks are never queued up.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    last: Option<Duration>,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Duration) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) > self.interval,
        }
    }

    /// Record that a poll started at `now`.
    pub fn mark(&mut self, now: Duration) {
        self.last = Some(now);
    }

    /// How long to wait from `now` until the next poll is due.
    pub fn until_due(&self, now: Duration) -> Duration {
        match self.last {
            None => Duration::ZERO,
            Some(last) => {
                let due_at = last + self.interval + Duration::from_millis(1);
                due_at.saturating_sub(now)
            }
        }
    }
}
