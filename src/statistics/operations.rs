//! Core statistical operations and traits
//!
//! This module defines the reductions a pipeline can request and the
//! per-cell interface the parallel kernels implement.

use chrono::NaiveDateTime;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Per-cell statistic over a set of time samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Population variance (ddof = 0)
    Variance,
    /// Population standard deviation (ddof = 0)
    Std,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl Statistic {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Variance => "variance",
            Self::Std => "std",
            Self::Sum => "sum",
            Self::Min => "minimum",
            Self::Max => "maximum",
        }
    }
}

/// Calendar key used by group-then-reduce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Year,
    Month,
    DayOfYear,
}

/// Bucket width for resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFreq {
    Daily,
    Monthly,
    Yearly,
}

/// What happens to a cell with no valid sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Abort with an empty-reduction error
    Strict,
    /// Leave the cell missing
    #[default]
    Lenient,
}

/// How the time axis of a grid is collapsed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Mean,
    Variance,
    Std,
    Sum,
    Min,
    Max,
    /// A single time step, by position or by exact timestamp
    Instant {
        #[serde(default)]
        time_index: Option<usize>,
        #[serde(default)]
        time: Option<NaiveDateTime>,
    },
    /// One field per calendar key (all Januaries, all 1995s, ...)
    Group {
        group_key: GroupKey,
        #[serde(default)]
        statistic: Statistic,
    },
    /// One field per consecutive calendar period
    Resample {
        frequency: ResampleFreq,
        #[serde(default = "default_resample_statistic")]
        statistic: Statistic,
    },
}

fn default_resample_statistic() -> Statistic {
    Statistic::Sum
}

impl Reduction {
    /// The plain statistic for the non-grouping kinds
    #[must_use]
    pub const fn as_statistic(&self) -> Option<Statistic> {
        match self {
            Self::Mean => Some(Statistic::Mean),
            Self::Variance => Some(Statistic::Variance),
            Self::Std => Some(Statistic::Std),
            Self::Sum => Some(Statistic::Sum),
            Self::Min => Some(Statistic::Min),
            Self::Max => Some(Statistic::Max),
            Self::Instant { .. } | Self::Group { .. } | Self::Resample { .. } => None,
        }
    }

    /// Whether the reduction yields a sequence of fields
    #[must_use]
    pub const fn is_grouped(&self) -> bool {
        matches!(self, Self::Group { .. } | Self::Resample { .. })
    }
}

/// Trait for arrays that can collapse their leading (time) axis
pub trait StatisticalReduction {
    /// Reduce every `(lat, lon)` lane, row-major, `None` where the lane has
    /// no finite sample.
    fn reduce_time_axis(&self, statistic: Statistic) -> Vec<Option<f32>>;
}

impl StatisticalReduction for Array3<f32> {
    fn reduce_time_axis(&self, statistic: Statistic) -> Vec<Option<f32>> {
        super::parallel::parallel_reduce_time(self, statistic)
    }
}
