//! Time source abstraction
//!
//! The time series never reads a global clock. Whoever builds it hands in a
//! [`Clock`], which keeps the counting logic testable on a desktop host and
//! lets firmware plug in whatever monotonic source it has.

use core::cell::Cell;

use embassy_time::{Duration, Instant};

/// Supplies the current time to a [`TimeSeries`](crate::TimeSeries)
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A clock that only moves when told to
///
/// Used by tests and by the simulator to run hours of traffic in a few
/// milliseconds. Share it with a series by reference:
///
/// ```rust,ignore
/// let clock = ManualClock::new(Instant::from_secs(0));
/// let mut series = TimeSeries::with_defaults(&clock)?;
/// series.increase(1)?;
/// clock.advance(Duration::from_secs(1));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub const fn new(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Jump to an absolute instant (may move backwards)
    pub fn set(&self, instant: Instant) {
        self.now.set(instant);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
