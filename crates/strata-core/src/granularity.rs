//! Level configuration descriptors

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{SeriesError, SeriesResult};

/// Maximum number of levels a single time series can hold
pub const MAX_LEVELS: usize = 8;

/// Granularities used when the caller asks for the defaults
///
/// - 60 × 1s buckets: the last minute at one second resolution
/// - 60 × 1m buckets: the last hour at one minute resolution
/// - 24 × 1h buckets: the last day at one hour resolution
pub const DEFAULT_GRANULARITIES: [Granularity; 3] = [
    Granularity::new(Duration::from_secs(1), 60),
    Granularity::new(Duration::from_secs(60), 60),
    Granularity::new(Duration::from_secs(3600), 24),
];

/// Bucket width and bucket count of one level
///
/// On the wire the width is encoded as whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Granularity {
    /// Width of one bucket
    #[serde(with = "duration_millis")]
    pub width: Duration,
    /// Number of buckets in the ring (must be non-zero)
    pub count: usize,
}

impl Granularity {
    pub const fn new(width: Duration, count: usize) -> Self {
        Self { width, count }
    }

    /// Span from the start of the oldest bucket to the start of the newest
    pub fn window(&self) -> Duration {
        Duration::from_ticks(self.width.as_ticks() * self.count.saturating_sub(1) as u64)
    }
}

/// Check a granularity list before any level is allocated
///
/// The list must be non-empty, hold at most [`MAX_LEVELS`] entries, have
/// non-zero counts and strictly increasing widths. Since widths start above
/// zero, a zero width is rejected too.
pub fn validate(granularities: &[Granularity]) -> SeriesResult<()> {
    if granularities.is_empty() {
        return Err(SeriesError::BadGranularities {
            reason: "no granularities given",
        });
    }
    if granularities.len() > MAX_LEVELS {
        return Err(SeriesError::BadGranularities {
            reason: "too many levels",
        });
    }

    let mut last = Duration::from_ticks(0);
    for granularity in granularities {
        if granularity.count == 0 {
            return Err(SeriesError::BadGranularities {
                reason: "bucket count is zero",
            });
        }
        if granularity.width <= last {
            return Err(SeriesError::BadGranularities {
                reason: "widths are not strictly increasing",
            });
        }
        last = granularity.width;
    }
    Ok(())
}

mod duration_millis {
    use embassy_time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(width: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(width.as_millis())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
