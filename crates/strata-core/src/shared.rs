//! Lock-guarded access to a time series
//!
//! Reads advance the rings just like writes do, so a reader and a writer (or
//! two readers) must never touch the series at the same time. Every call here
//! takes the same lock for its whole duration.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};

use crate::clock::Clock;
use crate::error::SeriesResult;
use crate::series::TimeSeries;
use crate::window::TimeWindow;

/// A [`TimeSeries`] behind one blocking mutex
///
/// `M` picks the lock flavour, e.g. `CriticalSectionRawMutex` when tasks on
/// different executors or interrupts share the counter, `NoopRawMutex` when
/// everything runs in one context.
pub struct SharedSeries<M: RawMutex, C: Clock> {
    inner: Mutex<M, RefCell<TimeSeries<C>>>,
}

impl<M: RawMutex, C: Clock> SharedSeries<M, C> {
    pub fn new(series: TimeSeries<C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(series)),
        }
    }

    /// Run `f` with exclusive access to the series
    pub fn with<R>(&self, f: impl FnOnce(&mut TimeSeries<C>) -> R) -> R {
        self.inner.lock(|series| f(&mut series.borrow_mut()))
    }

    pub fn increase(&self, amount: i64) -> SeriesResult<()> {
        self.with(|series| series.increase(amount))
    }

    pub fn increase_at_time(&self, amount: i64, at: Instant) -> SeriesResult<()> {
        self.with(|series| series.increase_at_time(amount, at))
    }

    pub fn recent(&self, duration: Duration) -> SeriesResult<f64> {
        self.with(|series| series.recent(duration))
    }

    pub fn recent_window(&self, window: TimeWindow) -> SeriesResult<f64> {
        self.with(|series| series.recent_window(window))
    }

    pub fn range(&self, start: Instant, end: Instant) -> SeriesResult<f64> {
        self.with(|series| series.range(start, end))
    }

    /// Unwrap the series again
    pub fn into_inner(self) -> TimeSeries<C> {
        self.inner.into_inner().into_inner()
    }
}
