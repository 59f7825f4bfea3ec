//! Desktop traffic simulator for strata.
//!
//! Feeds a [`TimeSeries`] with synthetic request traffic on an accelerated
//! [`ManualClock`] and logs the approximate count of every look-back window
//! next to the exact count, so interpolation error can be eyeballed.
//!
//! # Environment
//!
//! | Variable            | Meaning                               | Default |
//! |---------------------|---------------------------------------|---------|
//! | `STRATA_SIM_HOURS`  | Simulated hours of traffic            | 3       |
//! | `RUST_LOG`          | Log filter (`debug` shows level work) | `info`  |

use std::collections::VecDeque;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant};
use log::{debug, error, info};

use strata_core::{
    Clock, ManualClock, SeriesConfig, SeriesError, SeriesResult, SharedSeries, TimeSeries,
    TimeWindow,
};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Simulated start time, aligned to a whole day.
const SIM_EPOCH: Instant = Instant::from_secs(86400);

/// One simulation step.
const STEP: Duration = Duration::from_secs(1);

/// Simulated time between two reports.
const REPORT_INTERVAL_SECS: u64 = 300;

/// How late a delayed event arrives.
const LATE_DELIVERY: Duration = Duration::from_secs(3);

/// Every Nth step, a share of that step's requests arrives late.
const LATE_EVERY_STEPS: u64 = 7;

/// Exact per-second history kept for comparison (one hour).
const EXACT_HISTORY_SECS: usize = 3600;

const DEFAULT_SIM_HOURS: u64 = 3;

// ---------------------------------------------------------------------------
// Mock traffic generation
// ---------------------------------------------------------------------------

/// Generates a deterministic request rate that varies over time.
struct MockTrafficGenerator {
    /// Seconds since the simulation started.
    elapsed_secs: f64,
    /// Fractional requests carried into the next step.
    carry: f64,
}

impl MockTrafficGenerator {
    fn new() -> Self {
        Self {
            elapsed_secs: 0.0,
            carry: 0.0,
        }
    }

    /// Advance the internal clock and return the number of requests.
    fn next_count(&mut self, dt_secs: f64) -> i64 {
        self.elapsed_secs += dt_secs;
        let t = self.elapsed_secs;

        // 5–35 requests/s: a slow ten-minute swell with a faster ripple
        let rate = 20.0 + 12.0 * (t / 600.0).sin() + 3.0 * (t / 97.0).cos();

        let due = rate * dt_secs + self.carry;
        let whole = due.floor();
        self.carry = due - whole;
        whole as i64
    }
}

/// Per-second request counts for the last hour, newest at the back.
struct ExactHistory {
    seconds: VecDeque<i64>,
}

impl ExactHistory {
    fn new() -> Self {
        Self {
            seconds: VecDeque::with_capacity(EXACT_HISTORY_SECS),
        }
    }

    fn push(&mut self, count: i64) {
        if self.seconds.len() >= EXACT_HISTORY_SECS {
            self.seconds.pop_front();
        }
        self.seconds.push_back(count);
    }

    /// Exact sum over the last `secs` completed seconds, if still held.
    fn last(&self, secs: u64) -> Option<i64> {
        let secs = secs as usize;
        (secs <= self.seconds.len()).then(|| self.seconds.iter().rev().take(secs).sum())
    }
}

fn sim_hours() -> u64 {
    std::env::var("STRATA_SIM_HOURS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_SIM_HOURS)
}

fn report(series: &SharedSeries<CriticalSectionRawMutex, &ManualClock>, exact: &ExactHistory) {
    for window in TimeWindow::ALL {
        match series.recent_window(window) {
            Ok(approx) => match exact.last(window.duration_secs()) {
                Some(exact) => info!(
                    "  {:>4}: {:>10.1} (exact {})",
                    window.label(),
                    approx,
                    exact
                ),
                None => info!("  {:>4}: {:>10.1}", window.label(), approx),
            },
            Err(SeriesError::RangeNotCovered) => {
                debug!("  {:>4}: no data", window.label());
            }
            Err(e) => error!("  {:>4}: query failed: {}", window.label(), e),
        }
    }
}

fn main() -> SeriesResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hours = sim_hours();
    let config = SeriesConfig::default();
    for granularity in &config.granularities {
        info!(
            "Level: {} buckets of {}s",
            granularity.count,
            granularity.width.as_secs()
        );
    }

    let clock = ManualClock::new(SIM_EPOCH);
    let series: SharedSeries<CriticalSectionRawMutex, _> =
        SharedSeries::new(TimeSeries::from_config(&clock, &config)?);

    let mut traffic = MockTrafficGenerator::new();
    let mut exact = ExactHistory::new();
    // (event time, amount) waiting to be delivered late
    let mut delayed: VecDeque<(Instant, i64)> = VecDeque::new();

    info!("Simulating {} hours of traffic", hours);
    for step in 1..=hours * 3600 {
        let event_time = clock.now();
        let count = traffic.next_count(STEP.as_secs() as f64);
        exact.push(count);

        if step % LATE_EVERY_STEPS == 0 {
            let late = count / 4;
            delayed.push_back((event_time, late));
            series.increase(count - late)?;
        } else {
            series.increase(count)?;
        }

        clock.advance(STEP);

        while let Some(&(at, amount)) = delayed.front() {
            if at + LATE_DELIVERY > clock.now() {
                break;
            }
            series.increase_at_time(amount, at)?;
            delayed.pop_front();
        }

        if step % REPORT_INTERVAL_SECS == 0 {
            info!("t = {}s", step);
            report(&series, &exact);
        }
    }

    let series = series.into_inner();
    info!(
        "Done: {} levels, last event at {}s",
        series.level_count(),
        (series.latest().as_secs() - SIM_EPOCH.as_secs())
    );
    Ok(())
}
