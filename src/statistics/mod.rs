//! Statistical computations and parallel reduction operations
//!
//! This module collapses the time axis of a [`Grid`](crate::grid::Grid)
//! into 2-D fields using NaN-skipping statistics.
//!
//! # Organization
//!
//! - [`operations`]: reduction kinds, policies and the reduction trait
//! - [`parallel`]: per-cell parallel kernels
//! - [`reducer`]: [`TemporalReducer`], grouping and resampling

pub mod operations;
pub mod parallel;
pub mod reducer;

pub use operations::{
    GroupKey, MissingPolicy, Reduction, ResampleFreq, Statistic, StatisticalReduction,
};
pub use parallel::{lane_statistic, parallel_reduce_time};
pub use reducer::{ReductionOutput, TemporalReducer};
