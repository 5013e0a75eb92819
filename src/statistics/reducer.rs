//! Temporal reduction of a [`Grid`] into one or more [`ReducedField`]s

use super::operations::{
    GroupKey, MissingPolicy, Reduction, ResampleFreq, Statistic, StatisticalReduction,
};
use crate::errors::{ClimGridError, Result};
use crate::grid::{Grid, GroupLabel, ReducedField};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info};
use ndarray::{Array2, Array3, Axis};
use std::collections::BTreeMap;

/// Result of a reduction: one field, or ordered groups of fields
#[derive(Debug, Clone, PartialEq)]
pub enum ReductionOutput {
    Field(ReducedField),
    Groups(Vec<(GroupLabel, ReducedField)>),
}

impl ReductionOutput {
    /// The single field, or the group at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Config`] if a grouped output is asked for a
    /// group index it does not have.
    pub fn into_field(self, group_index: Option<usize>) -> Result<ReducedField> {
        match self {
            Self::Field(field) => Ok(field),
            Self::Groups(mut groups) => {
                let index = group_index.unwrap_or(0);
                if index >= groups.len() {
                    return Err(ClimGridError::config(format!(
                        "group index {index} out of range for {} groups",
                        groups.len()
                    )));
                }
                Ok(groups.swap_remove(index).1)
            }
        }
    }
}

/// Collapses the time axis under a missing-data policy
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalReducer {
    policy: MissingPolicy,
}

impl TemporalReducer {
    #[must_use]
    pub const fn new(policy: MissingPolicy) -> Self {
        Self { policy }
    }

    /// # Errors
    ///
    /// Returns [`ClimGridError::EmptyReduction`] under the strict policy when
    /// a cell has no valid sample, and [`ClimGridError::Load`] when an
    /// instant selection does not exist.
    pub fn reduce(&self, grid: &Grid, reduction: &Reduction) -> Result<ReductionOutput> {
        info!("Reducing '{}' with {reduction:?}", grid.variable);
        match reduction {
            Reduction::Instant { time_index, time } => {
                let field = match (time_index, time) {
                    (_, Some(stamp)) => grid.select_time(*stamp)?,
                    (Some(index), None) => grid.select_time_index(*index)?,
                    (None, None) => {
                        return Err(ClimGridError::config(
                            "instant reduction needs a time_index or a time",
                        ))
                    }
                };
                self.check_policy(&field.values)?;
                Ok(ReductionOutput::Field(field))
            }
            Reduction::Group { group_key, statistic } => {
                Ok(ReductionOutput::Groups(self.group(grid, *group_key, *statistic)?))
            }
            Reduction::Resample { frequency, statistic } => {
                Ok(ReductionOutput::Groups(self.resample(grid, *frequency, *statistic)?))
            }
            other => {
                let statistic = other.as_statistic().ok_or_else(|| {
                    ClimGridError::config(format!("unsupported reduction {other:?}"))
                })?;
                Ok(ReductionOutput::Field(self.statistic(grid, statistic)?))
            }
        }
    }

    /// Collapse the whole time axis with one statistic.
    ///
    /// # Errors
    ///
    /// See [`TemporalReducer::reduce`].
    pub fn statistic(&self, grid: &Grid, statistic: Statistic) -> Result<ReducedField> {
        let name = format!("{}_{}_over_time", grid.variable, statistic.as_str());
        self.reduce_block(grid, &grid.values, statistic, name)
    }

    /// Group time steps by a calendar key and reduce each group.
    ///
    /// # Errors
    ///
    /// See [`TemporalReducer::reduce`].
    pub fn group(
        &self,
        grid: &Grid,
        key: GroupKey,
        statistic: Statistic,
    ) -> Result<Vec<(GroupLabel, ReducedField)>> {
        self.reduce_buckets(grid, statistic, |t| match key {
            GroupKey::Year => GroupLabel::Year(t.year()),
            GroupKey::Month => GroupLabel::Month(t.month()),
            GroupKey::DayOfYear => GroupLabel::DayOfYear(t.ordinal()),
        })
    }

    /// Bucket time steps into consecutive calendar periods and reduce each.
    ///
    /// # Errors
    ///
    /// See [`TemporalReducer::reduce`].
    pub fn resample(
        &self,
        grid: &Grid,
        frequency: ResampleFreq,
        statistic: Statistic,
    ) -> Result<Vec<(GroupLabel, ReducedField)>> {
        self.reduce_buckets(grid, statistic, |t| GroupLabel::Period(period_start(t, frequency)))
    }

    fn reduce_buckets(
        &self,
        grid: &Grid,
        statistic: Statistic,
        label_of: impl Fn(&NaiveDateTime) -> GroupLabel,
    ) -> Result<Vec<(GroupLabel, ReducedField)>> {
        let mut buckets: BTreeMap<GroupLabel, Vec<usize>> = BTreeMap::new();
        for (index, stamp) in grid.time.iter().enumerate() {
            buckets.entry(label_of(stamp)).or_default().push(index);
        }
        debug!("'{}' split into {} groups", grid.variable, buckets.len());

        buckets
            .into_iter()
            .map(|(label, indices)| {
                let block = grid.values.select(Axis(0), &indices);
                let name = format!("{}_{}_{}", grid.variable, statistic.as_str(), label_slug(label));
                self.reduce_block(grid, &block, statistic, name).map(|f| (label, f))
            })
            .collect()
    }

    fn reduce_block(
        &self,
        grid: &Grid,
        block: &Array3<f32>,
        statistic: Statistic,
        name: String,
    ) -> Result<ReducedField> {
        let (_, nlat, nlon) = block.dim();
        let cells = block.reduce_time_axis(statistic);

        if self.policy == MissingPolicy::Strict {
            if let Some(flat) = cells.iter().position(Option::is_none) {
                return Err(ClimGridError::EmptyReduction {
                    lat_index: flat / nlon,
                    lon_index: flat % nlon,
                });
            }
        }

        let values: Vec<f32> = cells.into_iter().map(|c| c.unwrap_or(f32::NAN)).collect();
        let values = Array2::from_shape_vec((nlat, nlon), values)?;
        Ok(ReducedField::new(name, grid.lat.clone(), grid.lon.clone(), values)?
            .with_units(units_for(grid.units.as_deref(), statistic))
            .with_crs(grid.crs.clone()))
    }

    fn check_policy(&self, values: &Array2<f32>) -> Result<()> {
        if self.policy == MissingPolicy::Lenient {
            return Ok(());
        }
        match values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            Some(((lat_index, lon_index), _)) => Err(ClimGridError::EmptyReduction { lat_index, lon_index }),
            None => Ok(()),
        }
    }
}

fn period_start(stamp: &NaiveDateTime, frequency: ResampleFreq) -> NaiveDate {
    let date = stamp.date();
    match frequency {
        ResampleFreq::Daily => date,
        ResampleFreq::Monthly => date.with_day(1).unwrap_or(date),
        ResampleFreq::Yearly => date.with_ordinal(1).unwrap_or(date),
    }
}

fn label_slug(label: GroupLabel) -> String {
    match label {
        GroupLabel::Year(y) => format!("{y}"),
        GroupLabel::Month(m) => format!("month{m:02}"),
        GroupLabel::DayOfYear(d) => format!("doy{d:03}"),
        GroupLabel::Period(date) => date.format("%Y%m%d").to_string(),
    }
}

fn units_for(units: Option<&str>, statistic: Statistic) -> Option<String> {
    let units = units?;
    Some(match statistic {
        Statistic::Variance => format!("({units})^2"),
        _ => units.to_string(),
    })
}
