use embassy_time::Duration;

/// Named look-back windows for "recent" queries
///
/// Each window maps onto whichever level covers it; with the default
/// granularities the first is answered at one second resolution, the middle
/// ones at one minute and the longest at one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Last minute
    OneMinute,
    /// Last 5 minutes
    FiveMinutes,
    /// Last 30 minutes
    ThirtyMinutes,
    /// Last hour
    OneHour,
    /// Last 12 hours
    TwelveHours,
    /// Last day
    OneDay,
}

impl TimeWindow {
    /// Every window, shortest first
    pub const ALL: [TimeWindow; 6] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwelveHours,
        Self::OneDay,
    ];

    /// Tag used in log lines and reports, e.g. `"5m"`
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
        }
    }

    const fn minutes(self) -> u64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::TwelveHours => 12 * 60,
            Self::OneDay => 24 * 60,
        }
    }

    /// How far back a query for this window reaches, in whole seconds
    pub const fn duration_secs(self) -> u64 {
        self.minutes() * 60
    }

    /// Look-back span handed to [`TimeSeries::recent`](crate::TimeSeries::recent)
    pub const fn duration(self) -> Duration {
        Duration::from_secs(self.duration_secs())
    }
}
