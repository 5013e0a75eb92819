//! NetCDF I/O: loading gridded datasets and writing reduced fields
//!
//! [`load_grid`] resolves paths and glob patterns, reads one variable from
//! every matching file, decodes CF time, and concatenates the pieces along
//! time into a single [`Grid`]. [`NetCDFWriter`] persists a 2-D field with
//! its coordinates.

use crate::errors::{ClimGridError, Result};
use crate::grid::{Crs, Grid, ReducedField};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info};
use ndarray::{concatenate, Array1, Array3, ArrayD, Axis, Ix3};
use netcdf::{create, AttributeValue, Variable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Names of the time/latitude/longitude dimensions in the input files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimNames {
    pub time: String,
    pub lat: String,
    pub lon: String,
}

impl Default for DimNames {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            lat: "lat".to_string(),
            lon: "lon".to_string(),
        }
    }
}

/// Resolve literal paths and glob patterns into an ordered list of files.
///
/// Glob matches are sorted; duplicates across patterns are dropped.
///
/// # Errors
///
/// Returns [`ClimGridError::Load`] when a pattern matches nothing or a
/// literal path does not exist.
pub fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>> {
    if inputs.is_empty() {
        return Err(ClimGridError::load("no input paths given"));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let matches = if input.contains(['*', '?', '[']) {
            let mut found = Vec::new();
            for entry in glob::glob(input)? {
                found.push(entry.map_err(|e| ClimGridError::load(e.to_string()))?);
            }
            found.sort();
            if found.is_empty() {
                return Err(ClimGridError::load(format!("no file matches pattern '{input}'")));
            }
            found
        } else {
            let path = PathBuf::from(input);
            if !path.exists() {
                return Err(ClimGridError::load(format!("input file '{input}' does not exist")));
            }
            vec![path]
        };

        for path in matches {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Load `variable` from every input and concatenate along time.
///
/// # Errors
///
/// Returns [`ClimGridError::Load`] when inputs are missing, the variable or
/// its dimensions are absent, spatial coordinates disagree between files, or
/// the combined time axis is not strictly increasing.
pub fn load_grid<S: AsRef<str>>(inputs: &[S], variable: &str, dims: &DimNames) -> Result<Grid> {
    let files = expand_inputs(inputs)?;
    info!("Loading '{variable}' from {} file(s)", files.len());

    let mut parts = Vec::with_capacity(files.len());
    for path in &files {
        parts.push(read_part(path, variable, dims)?);
    }

    let first = &parts[0];
    for (part, path) in parts.iter().zip(&files).skip(1) {
        if !same_coords(&part.lat, &first.lat) || !same_coords(&part.lon, &first.lon) {
            return Err(ClimGridError::load(format!(
                "spatial coordinates of '{}' differ from '{}'",
                path.display(),
                files[0].display()
            )));
        }
    }

    let lat = first.lat.clone();
    let lon = first.lon.clone();
    let units = first.units.clone();
    let time: Vec<NaiveDateTime> = parts.iter().flat_map(|p| p.time.iter().copied()).collect();
    let values = if parts.len() == 1 {
        parts.swap_remove(0).values
    } else {
        let views: Vec<_> = parts.iter().map(|p| p.values.view()).collect();
        concatenate(Axis(0), &views)?
    };

    debug!(
        "Grid '{variable}': {} time steps, {} x {} cells",
        time.len(),
        lat.len(),
        lon.len()
    );

    Ok(Grid::new(variable, time, lat, lon, values)?.with_units(units))
}

struct FilePart {
    time: Vec<NaiveDateTime>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    values: Array3<f32>,
    units: Option<String>,
}

fn read_part(path: &Path, variable: &str, dims: &DimNames) -> Result<FilePart> {
    let file = netcdf::open(path)?;
    let var = file.variable(variable).ok_or_else(|| {
        ClimGridError::load(format!("variable '{variable}' not found in '{}'", path.display()))
    })?;

    let dim_names: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    if dim_names.len() != 3 {
        return Err(ClimGridError::load(format!(
            "variable '{variable}' has dimensions {dim_names:?}, expected ({}, {}, {})",
            dims.time, dims.lat, dims.lon
        )));
    }
    let axis_of = |name: &str| {
        dim_names.iter().position(|d| d == name).ok_or_else(|| {
            ClimGridError::load(format!(
                "dimension '{name}' not declared by variable '{variable}' in '{}'",
                path.display()
            ))
        })
    };
    let order = [axis_of(&dims.time)?, axis_of(&dims.lat)?, axis_of(&dims.lon)?];

    let shape: Vec<usize> = var.dimensions().iter().map(netcdf::Dimension::len).collect();
    let raw = var.get_values::<f32, _>(..)?;
    let data = ArrayD::from_shape_vec(shape, raw)?
        .permuted_axes(order.to_vec())
        .into_dimensionality::<Ix3>()?;
    let mut values = data.as_standard_layout().to_owned();

    let fill = numeric_attribute(&var, "_FillValue");
    let missing = numeric_attribute(&var, "missing_value");
    let scale = numeric_attribute(&var, "scale_factor").unwrap_or(1.0);
    let offset = numeric_attribute(&var, "add_offset").unwrap_or(0.0);
    let (fill, missing) = (fill.map(|v| v as f32), missing.map(|v| v as f32));
    values.mapv_inplace(|v| {
        if Some(v) == fill || Some(v) == missing || !v.is_finite() {
            f32::NAN
        } else {
            (f64::from(v) * scale + offset) as f32
        }
    });

    let lat = coordinate(&file, &dims.lat, path)?;
    let lon = coordinate(&file, &dims.lon, path)?;
    let time = decode_time(&file, &dims.time, path)?;

    Ok(FilePart {
        time,
        lat,
        lon,
        values,
        units: string_attribute(&var, "units"),
    })
}

fn coordinate(file: &netcdf::File, name: &str, path: &Path) -> Result<Vec<f64>> {
    let var = file.variable(name).ok_or_else(|| {
        ClimGridError::load(format!("coordinate variable '{name}' missing in '{}'", path.display()))
    })?;
    Ok(var.get_values::<f64, _>(..)?)
}

fn decode_time(file: &netcdf::File, name: &str, path: &Path) -> Result<Vec<NaiveDateTime>> {
    let var = file.variable(name).ok_or_else(|| {
        ClimGridError::load(format!("time coordinate '{name}' missing in '{}'", path.display()))
    })?;

    if let Some(calendar) = string_attribute(&var, "calendar") {
        let calendar = calendar.to_ascii_lowercase();
        if !matches!(calendar.as_str(), "standard" | "gregorian" | "proleptic_gregorian") {
            return Err(ClimGridError::load(format!("unsupported calendar '{calendar}'")));
        }
    }

    let units = string_attribute(&var, "units")
        .ok_or_else(|| ClimGridError::load(format!("time coordinate '{name}' has no units")))?;
    let units = TimeUnits::parse(&units)?;
    var.get_values::<f64, _>(..)?
        .into_iter()
        .map(|offset| units.decode(offset))
        .collect()
}

/// CF `<unit> since <epoch>` time encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    seconds_per_unit: i64,
    epoch: NaiveDateTime,
}

impl TimeUnits {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] for anything that is not a CF time unit.
    pub fn parse(units: &str) -> Result<Self> {
        let bad = || ClimGridError::load(format!("unrecognised time units '{units}'"));
        let (unit, since) = units.split_once(" since ").ok_or_else(bad)?;

        let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => 86_400,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600,
            "minutes" | "minute" | "mins" | "min" => 60,
            "seconds" | "second" | "secs" | "sec" | "s" => 1,
            _ => return Err(bad()),
        };

        let since = since.trim().trim_end_matches('Z');
        let (date_part, time_part) = match since.split_once(['T', ' ']) {
            Some((d, rest)) => (d, rest.split_whitespace().next()),
            None => (since, None),
        };
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| bad())?;
        let time = match time_part {
            Some(t) if t.contains(':') => NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
                .map_err(|_| bad())?,
            _ => NaiveTime::default(),
        };

        Ok(Self {
            seconds_per_unit,
            epoch: date.and_time(time),
        })
    }

    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] if the offset overflows the date range.
    pub fn decode(&self, offset: f64) -> Result<NaiveDateTime> {
        let millis = (offset * self.seconds_per_unit as f64 * 1000.0).round() as i64;
        Duration::try_milliseconds(millis)
            .and_then(|d| self.epoch.checked_add_signed(d))
            .ok_or_else(|| ClimGridError::load(format!("time offset {offset} out of range")))
    }
}

fn numeric_attribute(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Floats(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn same_coords(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
}

/// Writes 2-D fields to NetCDF with lat/lon coordinate variables
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    #[must_use]
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write every field into one file; all fields must share their grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields disagree on coordinates or the file
    /// cannot be written.
    pub fn write_fields(&self, fields: &[&ReducedField]) -> Result<()> {
        let Some(first) = fields.first() else {
            return Err(ClimGridError::config("nothing to write"));
        };
        if fields
            .iter()
            .any(|f| !same_coords(&f.lat, &first.lat) || !same_coords(&f.lon, &first.lon))
        {
            return Err(ClimGridError::config(format!(
                "fields written to '{}' must share one grid",
                self.output_path.display()
            )));
        }

        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        let mut file = create(self.output_path)?;
        file.add_dimension("lat", first.lat.len())?;
        file.add_dimension("lon", first.lon.len())?;

        {
            let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
            lat_var.put_attribute("units", "degrees_north")?;
            lat_var.put_attribute("standard_name", "latitude")?;
            lat_var.put(Array1::from(first.lat.clone()).view(), ..)?;
        }
        {
            let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
            lon_var.put_attribute("units", "degrees_east")?;
            lon_var.put_attribute("standard_name", "longitude")?;
            lon_var.put(Array1::from(first.lon.clone()).view(), ..)?;
        }

        for field in fields {
            let mut var = file.add_variable::<f32>(&field.name, &["lat", "lon"])?;
            var.put_attribute("_FillValue", f32::NAN)?;
            if let Some(units) = &field.units {
                var.put_attribute("units", units.as_str())?;
            }
            var.put_attribute("crs", field.crs.to_string())?;
            var.put(field.values.view(), ..)?;
        }

        file.add_attribute(
            "history",
            format!("Created by climgrid on {}", Utc::now().to_rfc3339()),
        )?;

        info!(
            "Saved {} field(s) to {}",
            fields.len(),
            self.output_path.display()
        );
        Ok(())
    }
}

/// Writes one field to a new NetCDF file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_field_to_netcdf(field: &ReducedField, output_path: &Path) -> Result<()> {
    NetCDFWriter::new(output_path).write_fields(&[field])
}

/// Guess a field CRS from a NetCDF `crs`/`spatial_ref` variable, else WGS 84.
#[must_use]
pub fn detect_crs(path: &Path) -> Crs {
    let Ok(file) = netcdf::open(path) else {
        return Crs::default();
    };
    ["crs", "spatial_ref"]
        .iter()
        .filter_map(|name| file.variable(name))
        .find_map(|var| {
            string_attribute(&var, "crs_wkt")
                .or_else(|| string_attribute(&var, "spatial_ref"))
                .map(|wkt| Crs::from_wkt(&wkt))
                .or_else(|| {
                    numeric_attribute(&var, "epsg_code").map(|code| Crs::Epsg(code as u32))
                })
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cf_time_units() {
        let units = TimeUnits::parse("days since 1900-01-01 00:00:00").unwrap();
        let t = units.decode(1.5).unwrap();
        assert_eq!(t.to_string(), "1900-01-02 12:00:00");

        let units = TimeUnits::parse("hours since 1995-5-17T06:00:00Z").unwrap();
        assert_eq!(units.decode(6.0).unwrap().to_string(), "1995-05-17 12:00:00");

        let units = TimeUnits::parse("minutes since 2000-01-01").unwrap();
        assert_eq!(units.decode(90.0).unwrap().to_string(), "2000-01-01 01:30:00");
    }

    #[test]
    fn rejects_non_cf_time_units() {
        assert!(TimeUnits::parse("days").is_err());
        assert!(TimeUnits::parse("fortnights since 2000-01-01").is_err());
        assert!(TimeUnits::parse("days since yesterday").is_err());
    }
}
