//! Error types for time series operations

use thiserror_no_std::Error;

/// Errors returned by [`TimeSeries`](crate::TimeSeries) and [`Level`](crate::Level)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeriesError {
    /// The granularity list was rejected at construction time
    #[error("Granularities must be non-empty and strictly increasing: {reason}")]
    BadGranularities {
        /// Which rule the list broke
        reason: &'static str,
    },

    /// Range start is after range end
    #[error("Invalid range (start > end)")]
    BadRange,

    /// The requested range lies outside what any level still retains
    #[error("Range is not covered by the time series")]
    RangeNotCovered,

    /// An insert landed after the newest bucket of a level.
    ///
    /// Levels must be advanced before they are written to. Seeing this means
    /// the orchestrator broke its own ordering, so the write is rejected.
    #[error("Insert is {ahead_ticks} ticks ahead of the newest bucket")]
    AheadOfLevel {
        /// Distance between the insert's bucket and the level's newest bucket
        ahead_ticks: u64,
    },
}

/// Result type for time series operations
pub type SeriesResult<T> = Result<T, SeriesError>;
