//! Loading NetCDF grids and collapsing their time axis

mod common;

use chrono::NaiveDate;
use climgrid::errors::{ClimGridError, Result};
use climgrid::grid::GroupLabel;
use climgrid::netcdf_io::{load_grid, DimNames};
use climgrid::statistics::{
    GroupKey, MissingPolicy, Reduction, ReductionOutput, ResampleFreq, Statistic, TemporalReducer,
};
use common::{repeated_field, write_grid, write_rainfall, LAT, LON};
use float_cmp::approx_eq;
use ndarray::Array3;
use netcdf::create;
use tempfile::tempdir;

#[test]
fn mean_skips_the_missing_sample() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");

    // Cell (1, 2) is missing at the third time step only
    let mut values = repeated_field(4);
    values[2 * 9 + 5] = f32::NAN;
    write_rainfall(&path, "rf", &[0.0, 1.0, 2.0, 3.0], &values)?;

    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;
    assert_eq!(grid.dim(), (4, 3, 3));

    let mean = TemporalReducer::default().statistic(&grid, Statistic::Mean)?;
    assert_eq!(mean.values.dim(), (3, 3));
    for ((i, j), value) in mean.values.indexed_iter() {
        let expected = (i * 3 + j + 1) as f64;
        assert!(approx_eq!(f64, f64::from(*value), expected, epsilon = 1e-9));
    }
    assert_eq!(mean.name, "rf_mean_over_time");
    assert_eq!(mean.units.as_deref(), Some("mm/day"));
    Ok(())
}

#[test]
fn mean_matches_arithmetic_mean_of_valid_samples() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");

    // One cell, samples 1, 2, NaN, 3, 6
    write_grid(&path, "rf", &[0.0, 1.0, 2.0, 3.0, 4.0], &[10.0], &[70.0], &[1.0, 2.0, f32::NAN, 3.0, 6.0], None)?;

    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;
    let reducer = TemporalReducer::new(MissingPolicy::Strict);
    let mean = reducer.statistic(&grid, Statistic::Mean)?;
    let sum = reducer.statistic(&grid, Statistic::Sum)?;
    let variance = reducer.statistic(&grid, Statistic::Variance)?;

    assert!(approx_eq!(f64, f64::from(mean.values[[0, 0]]), 3.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, f64::from(sum.values[[0, 0]]), 12.0, epsilon = 1e-9));
    // ((1-3)^2 + (2-3)^2 + 0 + (6-3)^2) / 4
    assert!(approx_eq!(f64, f64::from(variance.values[[0, 0]]), 3.5, epsilon = 1e-9));
    assert_eq!(variance.units.as_deref(), Some("(mm/day)^2"));
    Ok(())
}

#[test]
fn all_missing_cell_depends_on_policy() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");

    let mut values = repeated_field(3);
    for t in 0..3 {
        values[t * 9 + 7] = f32::NAN;
    }
    write_rainfall(&path, "rf", &[0.0, 1.0, 2.0], &values)?;
    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;

    let strict = TemporalReducer::new(MissingPolicy::Strict).reduce(&grid, &Reduction::Mean);
    assert!(matches!(
        strict,
        Err(ClimGridError::EmptyReduction { lat_index: 2, lon_index: 1 })
    ));

    let lenient = TemporalReducer::new(MissingPolicy::Lenient)
        .reduce(&grid, &Reduction::Variance)?
        .into_field(None)?;
    assert!(lenient.values[[2, 1]].is_nan());
    assert_eq!(lenient.valid_count(), 8);
    assert_eq!(lenient.values[[0, 0]], 0.0);
    Ok(())
}

#[test]
fn glob_matches_are_joined_along_time() -> Result<()> {
    let temp_dir = tempdir()?;
    let dir = temp_dir.path();
    // 2001 is written first so the sort order, not creation order, must win
    write_rainfall(&dir.join("rf_2001.nc"), "rf", &[366.0, 367.0], &repeated_field(2))?;
    write_rainfall(&dir.join("rf_2000.nc"), "rf", &[0.0, 1.0], &repeated_field(2))?;

    let pattern = dir.join("rf_*.nc");
    let grid = load_grid(&[pattern.to_str().unwrap()], "rf", &DimNames::default())?;

    assert_eq!(grid.dim(), (4, 3, 3));
    assert_eq!(grid.lat, LAT.to_vec());
    assert_eq!(grid.lon, LON.to_vec());
    let years: Vec<String> = grid.time.iter().map(|t| t.format("%Y-%m-%d").to_string()).collect();
    assert_eq!(years, ["2000-01-01", "2000-01-02", "2001-01-01", "2001-01-02"]);
    Ok(())
}

#[test]
fn overlapping_time_is_a_load_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let dir = temp_dir.path();
    let late = dir.join("late.nc");
    let early = dir.join("early.nc");
    write_rainfall(&late, "rf", &[10.0, 11.0], &repeated_field(2))?;
    write_rainfall(&early, "rf", &[0.0, 1.0], &repeated_field(2))?;

    let inputs = [late.to_str().unwrap(), early.to_str().unwrap()];
    let result = load_grid(&inputs, "rf", &DimNames::default());
    assert!(matches!(result, Err(ClimGridError::Load(_))));
    Ok(())
}

#[test]
fn missing_inputs_variables_and_dimensions_are_load_errors() -> Result<()> {
    let temp_dir = tempdir()?;
    let dir = temp_dir.path();
    let path = dir.join("rf.nc");
    write_rainfall(&path, "rf", &[0.0], &repeated_field(1))?;

    let nothing = dir.join("nothing_*.nc");
    let unmatched = load_grid(&[nothing.to_str().unwrap()], "rf", &DimNames::default());
    assert!(matches!(unmatched, Err(ClimGridError::Load(_))));

    let absent = load_grid(&[path.to_str().unwrap()], "spi", &DimNames::default());
    assert!(matches!(absent, Err(ClimGridError::Load(_))));

    let renamed = DimNames {
        lat: "latitude".to_string(),
        ..DimNames::default()
    };
    let wrong_dims = load_grid(&[path.to_str().unwrap()], "rf", &renamed);
    assert!(matches!(wrong_dims, Err(ClimGridError::Load(_))));

    // A variable on unrelated dimensions
    let other = dir.join("other.nc");
    {
        let mut file = create(&other)?;
        file.add_dimension("x", 2)?;
        file.add_dimension("y", 2)?;
        file.add_dimension("z", 2)?;
        let mut var = file.add_variable::<f32>("rf", &["x", "y", "z"])?;
        var.put(Array3::<f32>::zeros((2, 2, 2)).view(), ..)?;
    }
    let unrelated = load_grid(&[other.to_str().unwrap()], "rf", &DimNames::default());
    assert!(matches!(unrelated, Err(ClimGridError::Load(_))));
    Ok(())
}

#[test]
fn fill_values_become_missing() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");
    let values = [1.0, -999.0, 3.0, 5.0];
    write_grid(&path, "rf", &[0.0, 1.0, 2.0, 3.0], &[10.0], &[70.0], &values, Some(-999.0))?;

    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;
    assert!(grid.values[[1, 0, 0]].is_nan());

    let mean = TemporalReducer::default().statistic(&grid, Statistic::Mean)?;
    assert!(approx_eq!(f64, f64::from(mean.values[[0, 0]]), 3.0, epsilon = 1e-9));
    Ok(())
}

#[test]
fn discard_below_masks_small_values_before_reduction() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("spi.nc");
    write_grid(&path, "spi", &[0.0, 1.0, 2.0], &[10.0], &[70.0], &[-3.5, 1.0, 2.0], None)?;

    let mut grid = load_grid(&[path.to_str().unwrap()], "spi", &DimNames::default())?;
    grid.discard_below(-3.08);
    let min = TemporalReducer::default().statistic(&grid, Statistic::Min)?;
    assert_eq!(min.values[[0, 0]], 1.0);
    Ok(())
}

#[test]
fn groups_by_month_and_resamples_by_month() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");
    // 2000-01-01, 2000-01-31, 2000-02-01, 2001-01-01
    let days = [0.0, 30.0, 31.0, 366.0];
    let values: Vec<f32> = [1.0, 2.0, 4.0, 8.0]
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(9))
        .collect();
    write_rainfall(&path, "rf", &days, &values)?;
    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;
    let reducer = TemporalReducer::default();

    let by_month = reducer.group(&grid, GroupKey::Month, Statistic::Mean)?;
    let labels: Vec<GroupLabel> = by_month.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, [GroupLabel::Month(1), GroupLabel::Month(2)]);
    // January: 1, 2 and 8
    assert!(approx_eq!(f64, f64::from(by_month[0].1.values[[1, 1]]), 11.0 / 3.0, epsilon = 1e-6));
    assert_eq!(by_month[1].1.values[[0, 0]], 4.0);

    let monthly = reducer.resample(&grid, ResampleFreq::Monthly, Statistic::Sum)?;
    let periods: Vec<GroupLabel> = monthly.iter().map(|(label, _)| *label).collect();
    let date = |y, m| GroupLabel::Period(NaiveDate::from_ymd_opt(y, m, 1).unwrap());
    assert_eq!(periods, [date(2000, 1), date(2000, 2), date(2001, 1)]);
    assert_eq!(monthly[0].1.values[[2, 2]], 3.0);
    assert_eq!(monthly[2].1.values[[2, 2]], 8.0);

    let yearly = reducer.reduce(
        &grid,
        &Reduction::Group { group_key: GroupKey::Year, statistic: Statistic::Max },
    )?;
    let ReductionOutput::Groups(years) = yearly else {
        panic!("grouping must yield groups");
    };
    assert_eq!(years.len(), 2);
    assert_eq!(years[0].0, GroupLabel::Year(2000));
    assert_eq!(years[0].1.values[[0, 0]], 4.0);
    Ok(())
}

#[test]
fn instant_selection_and_point_series() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("rf.nc");
    let values: Vec<f32> = (0..27).map(|v| v as f32).collect();
    write_rainfall(&path, "rf", &[0.0, 1.0, 2.0], &values)?;
    let grid = load_grid(&[path.to_str().unwrap()], "rf", &DimNames::default())?;

    let second = TemporalReducer::default()
        .reduce(&grid, &Reduction::Instant { time_index: Some(1), time: None })?
        .into_field(None)?;
    assert_eq!(second.values[[0, 0]], 9.0);
    assert_eq!(second.name, "rf_20000102");

    let stamp = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert_eq!(grid.select_time(stamp)?.values[[2, 2]], 26.0);
    assert!(grid.select_time_index(3).is_err());

    let series: Vec<f32> = grid
        .point_series(11.2, 71.9)
        .expect("grid has cells")
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    assert_eq!(series, [5.0, 14.0, 23.0]);
    Ok(())
}
