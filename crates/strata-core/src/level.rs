//! Single-resolution ring of time buckets
//!
//! A [`Level`] is a fixed-length circular array of counters. Each counter
//! covers one half-open bucket `[start, start + granularity)`. The ring is
//! addressed with two cursors over the array, the way the storage ring
//! buffers are:
//!
//! ```text
//!   index:   0     1     2     3     4
//!          +-----+-----+-----+-----+-----+
//!          |  t4 |  t0 |  t1 |  t2 |  t3 |
//!          +-----+-----+-----+-----+-----+
//!             ^     ^
//!        newest     oldest            end = start of t4
//! ```
//!
//! Moving forward by one bucket zeroes the oldest counter and makes it the
//! newest, so nothing is ever shifted or reallocated.

use alloc::boxed::Box;
use alloc::vec;

use embassy_time::{Duration, Instant};
use log::trace;

use crate::error::{SeriesError, SeriesResult};

/// One resolution of a time series
#[derive(Debug)]
pub struct Level {
    /// Width of one bucket
    granularity: Duration,
    /// Bucket counters, allocated once
    buckets: Box<[i64]>,
    /// Start of the newest bucket, always a multiple of `granularity`
    end: Instant,
    /// Ring index of the oldest bucket
    oldest: usize,
    /// Ring index of the newest bucket, always one behind `oldest`
    newest: usize,
}

impl Level {
    /// Create an empty level of `length` buckets, each `granularity` wide
    ///
    /// Both values are validated by the caller (see
    /// [`validate`](crate::granularity::validate)).
    pub fn new(granularity: Duration, length: usize) -> Self {
        let mut level = Self {
            granularity,
            buckets: vec![0; length].into_boxed_slice(),
            end: Instant::from_ticks(0),
            oldest: 0,
            newest: 0,
        };
        level.clear(Instant::from_ticks(0));
        level
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Number of buckets in the ring
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Reset to an empty window whose newest bucket contains `t`
    ///
    /// Used instead of [`advance`](Self::advance) when the jump is larger than
    /// the window, where stepping would only zero every bucket one by one.
    pub fn clear(&mut self, t: Instant) {
        self.buckets.fill(0);
        self.end = self.bucket_start(t);
        self.newest = 0;
        self.oldest = 1 % self.buckets.len();
    }

    /// Span from the start of the oldest bucket to the start of the newest
    pub fn duration(&self) -> Duration {
        Duration::from_ticks(self.granularity.as_ticks() * (self.buckets.len() as u64 - 1))
    }

    /// Start of the oldest retained bucket
    ///
    /// Saturates at the zero instant while the window still reaches before it.
    pub fn earliest(&self) -> Instant {
        self.end
            .checked_sub(self.duration())
            .unwrap_or(Instant::from_ticks(0))
    }

    /// Start of the newest bucket
    pub fn latest(&self) -> Instant {
        self.end
    }

    /// Start of the bucket that contains `t`
    pub fn bucket_start(&self, t: Instant) -> Instant {
        let ticks = t.as_ticks();
        Instant::from_ticks(ticks - ticks % self.granularity.as_ticks())
    }

    /// True if rolling forward to `target` would evict every retained bucket
    pub fn is_beyond_window(&self, target: Instant) -> bool {
        let target = self.bucket_start(target);
        target > self.end && target.as_ticks() - self.end.as_ticks() > self.duration().as_ticks()
    }

    /// Add `amount` to the bucket containing `t`
    ///
    /// `t` must not be after the newest bucket. A later time means the level
    /// was not advanced first; the write is rejected with
    /// [`SeriesError::AheadOfLevel`] and no counter changes. A time older than
    /// the window has nowhere to go and is dropped.
    pub fn increase_at_time(&mut self, amount: i64, t: Instant) -> SeriesResult<()> {
        let bucket = self.bucket_start(t);
        if bucket > self.end {
            return Err(SeriesError::AheadOfLevel {
                ahead_ticks: bucket.as_ticks() - self.end.as_ticks(),
            });
        }

        let length = self.buckets.len();
        let steps_back = ((self.end.as_ticks() - bucket.as_ticks())
            / self.granularity.as_ticks()) as usize;
        if steps_back >= length {
            trace!(
                "Dropping write {} buckets behind a {}-bucket level",
                steps_back, length
            );
            return Ok(());
        }

        let index = (self.newest + length - steps_back) % length;
        self.buckets[index] += amount;
        Ok(())
    }

    /// Roll forward until the newest bucket contains `target`
    ///
    /// Costs one step per bucket crossed. Jumps larger than the window should
    /// go through [`clear`](Self::clear) instead.
    pub fn advance(&mut self, target: Instant) {
        let target = self.bucket_start(target);
        while self.end < target {
            self.end = self.end + self.granularity;
            self.buckets[self.oldest] = 0;
            self.newest = self.oldest;
            self.oldest = (self.oldest + 1) % self.buckets.len();
        }
    }

    /// Approximate sum over `[start, end)`
    ///
    /// The range is clamped to what the ring holds, from the oldest bucket up
    /// to the end of the newest one. No bucket can hold data newer than
    /// `latest_seen` (the most recent insert), so a bucket's upper edge is
    /// pulled back to it.
    ///
    /// A bucket that only partially overlaps the range contributes
    /// `count × overlap / granularity`. This assumes events are spread
    /// uniformly inside a bucket and is an approximation, not exact
    /// accounting.
    pub fn sum_interval(&self, start: Instant, end: Instant, latest_seen: Instant) -> f64 {
        let width = signed_ticks_of(self.granularity);
        let length = self.buckets.len();

        // Signed ticks: the oldest bucket may start before the zero instant
        let newest = signed_ticks(self.end);
        let earliest = newest - signed_ticks_of(self.duration());
        let horizon = newest.saturating_add(width);
        let latest_seen = signed_ticks(latest_seen);

        let start = signed_ticks(start).max(earliest);
        let end = signed_ticks(end).min(horizon);
        if start >= end {
            return 0.0;
        }

        let mut idx = ((start - earliest) / width) as usize;
        let mut bucket_start = earliest + idx as i64 * width;

        let mut sum = 0.0;
        while idx < length && bucket_start < end {
            let bucket_end = (bucket_start + width).min(latest_seen);
            if bucket_end < bucket_start.max(start) {
                // Nothing was inserted past this point
                break;
            }

            let mut count = self.buckets[(self.oldest + idx) % length] as f64;
            if bucket_start < start || bucket_end > end {
                let overlap = bucket_end.min(end) - bucket_start.max(start);
                count *= overlap as f64 / width as f64;
            }
            sum += count;

            idx += 1;
            bucket_start += width;
        }
        sum
    }

    /// Sum of every retained counter
    pub fn total(&self) -> i64 {
        self.buckets.iter().sum()
    }
}

/// Instants past `i64::MAX` ticks (e.g. `Instant::MAX`) saturate
fn signed_ticks(t: Instant) -> i64 {
    i64::try_from(t.as_ticks()).unwrap_or(i64::MAX)
}

fn signed_ticks_of(d: Duration) -> i64 {
    i64::try_from(d.as_ticks()).unwrap_or(i64::MAX)
}
