use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::SeriesResult;
use crate::granularity::{DEFAULT_GRANULARITIES, Granularity, validate};

/// Serializable time series layout
///
/// Wraps the granularity list so it can be stored next to other device
/// settings and handed to [`TimeSeries::from_config`](crate::TimeSeries::from_config).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SeriesConfig {
    pub granularities: Vec<Granularity>,
}

impl SeriesConfig {
    pub fn new(granularities: Vec<Granularity>) -> Self {
        Self { granularities }
    }

    /// Validate without building anything
    pub fn validate(&self) -> SeriesResult<()> {
        validate(&self.granularities)
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITIES.to_vec())
    }
}
