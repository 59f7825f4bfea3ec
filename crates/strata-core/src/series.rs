//! Multi-resolution time series
//!
//! A [`TimeSeries`] keeps several [`Level`]s, finest first. Every insert is
//! fanned out to each level whose window still covers the event, so the same
//! event is counted once per resolution:
//!
//! ```text
//! event at 12:01:01
//!   1s level  -> bucket 12:01:01
//!   1m level  -> bucket 12:01:00
//!   1h level  -> bucket 12:00:00
//! ```
//!
//! Queries are answered by the finest level that still holds the start of
//! the range. Recent ranges get per-second precision; once the start falls
//! out of the finest window the answer comes from a coarser level instead,
//! interpolated at the edges.
//!
//! ## Write coalescing
//!
//! The most recent bucket is not written to the levels right away. Inserts
//! landing in it accumulate in a pending slot that is committed in one go
//! once a write moves into a later bucket, or when a query needs it.
//! Bursts of same-second events therefore touch the rings once.

use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::debug;

use crate::clock::Clock;
use crate::config::SeriesConfig;
use crate::error::{SeriesError, SeriesResult};
use crate::granularity::{DEFAULT_GRANULARITIES, Granularity, MAX_LEVELS, validate};
use crate::level::Level;
use crate::window::TimeWindow;

/// Event counter aggregated at several resolutions at once
///
/// Not thread-safe, and reads are not pure: [`range`](Self::range) and
/// [`recent`](Self::recent) move the levels forward to the clock's current
/// time before answering. Sharing one series therefore needs a single lock
/// around every call, which is what [`SharedSeries`](crate::SharedSeries)
/// provides.
pub struct TimeSeries<C: Clock> {
    clock: C,
    /// Finest granularity first
    levels: Vec<Level, MAX_LEVELS>,
    /// Amount not yet written to any level
    pending: i64,
    /// Start of the finest-level bucket `pending` belongs to
    pending_time: Instant,
    /// Most recent event time ever inserted
    latest: Instant,
}

impl<C: Clock> TimeSeries<C> {
    /// Build a series with one level per granularity
    ///
    /// Fails with [`SeriesError::BadGranularities`] unless the list is
    /// non-empty, strictly increasing and every count is non-zero.
    pub fn new(clock: C, granularities: &[Granularity]) -> SeriesResult<Self> {
        validate(granularities)?;

        let mut levels = Vec::new();
        for granularity in granularities {
            debug!(
                "Allocating level: {} x {}ms buckets",
                granularity.count,
                granularity.width.as_millis()
            );
            levels
                .push(Level::new(granularity.width, granularity.count))
                .map_err(|_| SeriesError::BadGranularities {
                    reason: "too many levels",
                })?;
        }

        Ok(Self {
            clock,
            levels,
            pending: 0,
            pending_time: Instant::from_ticks(0),
            latest: Instant::from_ticks(0),
        })
    }

    /// Build a series with [`DEFAULT_GRANULARITIES`]
    pub fn with_defaults(clock: C) -> SeriesResult<Self> {
        Self::new(clock, &DEFAULT_GRANULARITIES)
    }

    pub fn from_config(clock: C, config: &SeriesConfig) -> SeriesResult<Self> {
        Self::new(clock, &config.granularities)
    }

    /// Configured granularities, finest first
    pub fn granularities(&self) -> impl Iterator<Item = Granularity> + '_ {
        self.levels
            .iter()
            .map(|level| Granularity::new(level.granularity(), level.len()))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Most recent event time seen so far
    pub fn latest(&self) -> Instant {
        self.latest
    }

    /// Add `amount` at the clock's current time
    pub fn increase(&mut self, amount: i64) -> SeriesResult<()> {
        let now = self.clock.now();
        self.increase_at_time(amount, now)
    }

    /// Add `amount` at `at`, which may lie in the past
    ///
    /// Events older than a level's window are not counted by that level.
    pub fn increase_at_time(&mut self, amount: i64, at: Instant) -> SeriesResult<()> {
        if at > self.latest {
            self.latest = at;
        }

        let bucket = self.finest().bucket_start(at);
        if bucket > self.pending_time {
            self.advance(at)?;
            self.pending = amount;
        } else if bucket == self.pending_time {
            self.pending += amount;
        } else {
            self.write_levels(amount, at)?;
        }
        Ok(())
    }

    /// Approximate number of events in the last `duration`
    pub fn recent(&mut self, duration: Duration) -> SeriesResult<f64> {
        let now = self.clock.now();
        let start = now.checked_sub(duration).unwrap_or(Instant::from_ticks(0));
        self.range(start, now)
    }

    pub fn recent_window(&mut self, window: TimeWindow) -> SeriesResult<f64> {
        self.recent(window.duration())
    }

    /// Approximate number of events in `[start, end)`
    ///
    /// Brings every level up to the current time first and commits the
    /// pending amount in place, so writes to the current bucket are visible
    /// to the read. Buckets cut by the range edges are
    /// interpolated assuming events are spread evenly inside them, so the
    /// result is fractional and approximate.
    ///
    /// Fails with [`SeriesError::BadRange`] if `start > end` and with
    /// [`SeriesError::RangeNotCovered`] if no data can exist in the range
    /// any more (or yet).
    pub fn range(&mut self, start: Instant, end: Instant) -> SeriesResult<f64> {
        if start > end {
            return Err(SeriesError::BadRange);
        }

        let now = self.clock.now();
        self.advance(now)?;
        self.commit_pending()?;

        if end < self.coarsest().earliest()
            || start > self.finest().latest()
            || start > self.latest
        {
            return Err(SeriesError::RangeNotCovered);
        }

        let level = self
            .levels
            .iter()
            .find(|level| level.earliest() <= start)
            .unwrap_or(self.coarsest());
        Ok(level.sum_interval(start, end, self.latest))
    }

    fn finest(&self) -> &Level {
        &self.levels[0]
    }

    fn coarsest(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    /// Write straight into every level whose window still holds `at`
    fn write_levels(&mut self, amount: i64, at: Instant) -> SeriesResult<()> {
        for level in self.levels.iter_mut() {
            if at < level.earliest() {
                continue;
            }
            level.increase_at_time(amount, at)?;
        }
        Ok(())
    }

    /// Move every level forward to `target` and commit the pending bucket
    fn advance(&mut self, target: Instant) -> SeriesResult<()> {
        if self.finest().bucket_start(target) <= self.pending_time {
            return Ok(());
        }

        for level in self.levels.iter_mut() {
            if level.is_beyond_window(target) {
                debug!(
                    "Clearing {}ms level: jump past its whole window",
                    level.granularity().as_millis()
                );
                level.clear(target);
            } else {
                level.advance(target);
            }
        }

        self.commit_pending()?;
        self.pending_time = self.finest().latest();
        Ok(())
    }

    /// Write the pending amount at its bucket and empty the slot
    ///
    /// `pending_time` is left alone, so later writes to the same bucket keep
    /// coalescing.
    fn commit_pending(&mut self) -> SeriesResult<()> {
        if self.pending != 0 {
            self.write_levels(self.pending, self.pending_time)?;
            self.pending = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    /// Aligned to every default granularity
    const T0: Instant = Instant::from_secs(10 * 86400);

    fn second_minute() -> [Granularity; 2] {
        [
            Granularity::new(Duration::from_secs(1), 60),
            Granularity::new(Duration::from_secs(60), 60),
        ]
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = actual - expected;
        assert!(
            -1e-9 < diff && diff < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_new_with_defaults() {
        let clock = ManualClock::new(T0);
        let series = TimeSeries::with_defaults(&clock).unwrap();
        assert_eq!(series.level_count(), 3);
        assert!(series.granularities().eq(DEFAULT_GRANULARITIES.iter().copied()));
    }

    #[test]
    fn test_new_rejects_bad_granularities() {
        let clock = ManualClock::new(T0);

        let decreasing = [
            Granularity::new(secs(60), 60),
            Granularity::new(secs(1), 60),
        ];
        assert!(matches!(
            TimeSeries::new(&clock, &decreasing),
            Err(SeriesError::BadGranularities { .. })
        ));
        assert!(matches!(
            TimeSeries::new(&clock, &[]),
            Err(SeriesError::BadGranularities { .. })
        ));
        assert!(matches!(
            TimeSeries::new(&clock, &[Granularity::new(secs(1), 0)]),
            Err(SeriesError::BadGranularities { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let clock = ManualClock::new(T0);
        let config = SeriesConfig::new(second_minute().to_vec());
        let series = TimeSeries::from_config(&clock, &config).unwrap();
        assert_eq!(series.level_count(), 2);
    }

    #[test]
    fn test_bad_range() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();
        series.increase(1).unwrap();

        let result = series.range(T0 + secs(5), T0);
        assert_eq!(result, Err(SeriesError::BadRange));
    }

    #[test]
    fn test_aligned_bucket_is_exact() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(2).unwrap();
        clock.advance(secs(1));
        series.increase(1).unwrap();

        assert_eq!(series.range(T0, T0 + secs(1)), Ok(2.0));
    }

    #[test]
    fn test_recent() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        clock.advance(secs(300));
        series.increase(1).unwrap();
        clock.advance(secs(1));
        series.increase(2).unwrap();
        clock.advance(secs(1));
        series.increase(3).unwrap();

        assert_eq!(series.recent(secs(2)), Ok(3.0));
    }

    #[test]
    fn test_pending_coalesces_by_amount() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(5).unwrap();
        series.increase(7).unwrap();

        // Still buffered: no level has seen either write
        assert_eq!(series.pending, 12);
        assert!(series.levels.iter().all(|level| level.total() == 0));

        clock.advance(secs(1));
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(12.0));
        assert_eq!(series.pending, 0);
        assert_eq!(series.levels[0].total(), 12);
    }

    #[test]
    fn test_read_commits_current_bucket() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(5).unwrap();
        series.increase(7).unwrap();

        // Clock never leaves T0
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(12.0));
        assert_eq!(series.pending, 0);
        assert_eq!(series.pending_time, T0);
        assert_eq!(series.levels[0].total(), 12);
        assert_eq!(series.levels[1].total(), 12);

        // Later writes to the same bucket coalesce again on top
        series.increase(1).unwrap();
        assert_eq!(series.pending, 1);
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(13.0));

        clock.advance(secs(1));
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(13.0));
        assert_eq!(series.levels[0].total(), 13);
    }

    #[test]
    fn test_current_bucket_outside_range() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(1).unwrap();
        series.increase(1).unwrap();
        clock.advance(secs(1));
        series.increase(1).unwrap();

        // Committed by the read, but [T0, now) stops before it
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(2.0));
        assert_eq!(series.pending, 0);
        assert_eq!(series.levels[0].total(), 3);
        assert_eq!(series.range(T0 + secs(1), T0 + secs(2)), Ok(1.0));
    }

    #[test]
    fn test_unaligned_writes_share_bucket() {
        let clock = ManualClock::new(T0 + millis(300));
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(2).unwrap();
        clock.set(T0 + millis(700));
        series.increase(3).unwrap();
        assert_eq!(series.pending, 5);
        assert_eq!(series.pending_time, T0);

        // Nothing can exist past 700ms yet, so the whole bucket counts
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(5.0));

        clock.set(T0 + millis(999));
        series.increase(1).unwrap();
        assert_eq!(series.pending, 1);
        assert_eq!(series.pending_time, T0);
        assert_eq!(series.levels[0].total(), 5);

        clock.advance(secs(1));
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(6.0));
    }

    #[test]
    fn test_write_on_next_bucket_boundary() {
        let clock = ManualClock::new(T0 + millis(500));
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(5).unwrap();
        // Exactly one bucket later: a new bucket, not the pending one
        clock.set(T0 + secs(1));
        series.increase(4).unwrap();

        assert_eq!(series.pending, 4);
        assert_eq!(series.pending_time, T0 + secs(1));
        assert_eq!(series.levels[0].latest(), T0 + secs(1));
        assert_eq!(series.levels[0].total(), 5);

        clock.advance(secs(1));
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(5.0));
        assert_eq!(series.range(T0 + secs(1), T0 + secs(2)), Ok(4.0));
    }

    #[test]
    fn test_increase_at_past_time() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(1).unwrap();
        clock.advance(secs(40));
        series.increase(1).unwrap();
        // Older than the pending bucket: goes straight to the levels
        series.increase_at_time(5, T0 + secs(10)).unwrap();
        assert_eq!(series.levels[0].total(), 6);
        clock.advance(secs(1));

        assert_eq!(series.range(T0, T0 + secs(41)), Ok(7.0));
        assert_eq!(series.range(T0 + secs(10), T0 + secs(11)), Ok(5.0));
        assert_eq!(series.recent(secs(60)), Ok(7.0));
    }

    #[test]
    fn test_past_write_lands_in_coarse_level_only() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        clock.advance(secs(600));
        series.increase(1).unwrap();
        // Older than the 1s window, still inside the 1m window
        series.increase_at_time(4, T0 + secs(300)).unwrap();

        assert_eq!(series.levels[0].total(), 0);
        assert_eq!(series.levels[1].total(), 4);
        assert_eq!(series.range(T0 + secs(300), T0 + secs(360)), Ok(4.0));
    }

    #[test]
    fn test_multi_level_scenario() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(2).unwrap();
        clock.advance(secs(60));
        series.increase(4).unwrap();
        clock.advance(secs(60));
        series.increase(6).unwrap();
        for _ in 0..6 {
            clock.advance(secs(10));
            series.increase(2).unwrap();
        }
        let now = clock.now();
        assert_eq!(now, T0 + secs(180));

        // 0.5 * 2 + 4 + 0.5 * 16
        assert_eq!(series.range(now - secs(150), now - secs(30)), Ok(13.0));
        assert_eq!(series.range(now - secs(120), now - secs(60)), Ok(4.0));
    }

    #[test]
    fn test_recent_prefers_finest_level() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(10).unwrap();
        clock.advance(secs(30));
        series.increase(1).unwrap();
        clock.advance(secs(1));

        // The 1s level still holds T0, so the 10 is not smeared over a minute
        assert_eq!(series.range(T0 + secs(1), T0 + secs(31)), Ok(1.0));
        assert_eq!(series.recent(secs(31)), Ok(11.0));
    }

    #[test]
    fn test_half_bucket_interpolation() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        // One event per second across a whole minute bucket
        for _ in 0..60 {
            series.increase(1).unwrap();
            clock.advance(secs(1));
        }
        clock.advance(secs(120));

        let half = series.range(T0, T0 + secs(30)).unwrap();
        assert_close(half, 30.0);
    }

    #[test]
    fn test_full_window_jump_evicts() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(3).unwrap();
        clock.advance(secs(1));
        assert_eq!(series.range(T0, T0 + secs(1)), Ok(3.0));

        clock.advance(secs(2 * 3600));
        series.increase(1).unwrap();

        assert_eq!(
            series.range(T0, T0 + secs(1)),
            Err(SeriesError::RangeNotCovered)
        );
        assert!(series.levels.iter().all(|level| level.total() <= 1));
    }

    #[test]
    fn test_end_past_now_is_clipped() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(3).unwrap();
        clock.advance(secs(5));

        assert_eq!(series.range(T0, T0 + secs(3600)), Ok(3.0));
    }

    #[test]
    fn test_open_ended_range() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(3).unwrap();
        clock.advance(secs(5));

        assert_eq!(series.range(T0, Instant::MAX), Ok(3.0));
    }

    #[test]
    fn test_start_after_latest_insert_not_covered() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::new(&clock, &second_minute()).unwrap();

        series.increase(3).unwrap();
        clock.advance(secs(10));

        assert_eq!(
            series.range(T0 + secs(5), T0 + secs(8)),
            Err(SeriesError::RangeNotCovered)
        );
    }

    #[test]
    fn test_empty_series_not_covered() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::with_defaults(&clock).unwrap();

        assert_eq!(
            series.recent_window(TimeWindow::OneMinute),
            Err(SeriesError::RangeNotCovered)
        );
    }

    #[test]
    fn test_recent_window_uses_coarse_levels() {
        let clock = ManualClock::new(T0);
        let mut series = TimeSeries::with_defaults(&clock).unwrap();

        for _ in 0..90 {
            series.increase(2).unwrap();
            clock.advance(secs(60));
        }
        series.increase(0).unwrap();

        assert_eq!(series.recent_window(TimeWindow::OneDay), Ok(180.0));
        assert_eq!(series.recent_window(TimeWindow::ThirtyMinutes), Ok(60.0));
    }
}
