//! Platform-independent core library for strata
//!
//! Counts events at several time resolutions at once (per second, per
//! minute, per hour, ...) in memory that is allocated once at construction.
//! Old data is evicted as each resolution's window slides forward, and range
//! queries are answered from the finest resolution that still covers them.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).
//!
//! ```rust,ignore
//! use strata_core::{ManualClock, TimeSeries, TimeWindow};
//!
//! let clock = ManualClock::new(Instant::from_secs(0));
//! let mut series = TimeSeries::with_defaults(&clock)?;
//! series.increase(1)?;
//! clock.advance(Duration::from_secs(1));
//! let last_minute = series.recent_window(TimeWindow::OneMinute)?;
//! ```

#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod error;
pub mod granularity;
pub mod level;
pub mod series;
pub mod shared;
pub mod window;

pub use clock::{Clock, ManualClock};
pub use config::SeriesConfig;
pub use error::{SeriesError, SeriesResult};
pub use granularity::{DEFAULT_GRANULARITIES, Granularity, MAX_LEVELS};
pub use level::Level;
pub use series::TimeSeries;
pub use shared::SharedSeries;
pub use window::TimeWindow;
