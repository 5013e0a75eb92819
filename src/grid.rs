//! In-memory gridded data: the time-indexed [`Grid`] and the 2-D [`ReducedField`]
//!
//! Both types validate their shape against their coordinate vectors on
//! construction, so every other module can index them without checks.

use crate::errors::{ClimGridError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{s, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Crs {
    Epsg(u32),
    /// Anything that could not be normalised to an EPSG code
    Named(String),
}

impl Crs {
    /// Geographic lat/lon on WGS 84
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Parse an authority string (`EPSG:4326`, `urn:ogc:def:crs:EPSG::3857`, `CRS84`)
    /// or a WKT definition.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Self::WGS84;
        }
        if let Some(code) = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.rsplit_once("EPSG::").map(|(_, c)| c))
        {
            if let Ok(code) = code.trim().parse::<u32>() {
                return Self::Epsg(code);
            }
        }
        if upper.starts_with("GEOGCS") || upper.starts_with("PROJCS") || upper.starts_with("GEOGCRS") {
            return Self::from_wkt(trimmed);
        }
        Self::Named(trimmed.to_string())
    }

    /// Normalise a WKT string, as found in shapefile `.prj` sidecars.
    ///
    /// Only plain geographic WGS 84 is recognised; projected systems keep
    /// their WKT name.
    pub fn from_wkt(wkt: &str) -> Self {
        let upper = wkt.to_ascii_uppercase();
        let projected = upper.contains("PROJCS") || upper.contains("PROJCRS");
        let wgs84 = upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84");
        if !projected && wgs84 {
            return Self::WGS84;
        }
        let name = wkt
            .split('"')
            .nth(1)
            .map(str::to_string)
            .unwrap_or_else(|| wkt.trim().to_string());
        Self::Named(name)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for Crs {
    fn from(value: String) -> Self {
        Crs::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

/// A `(time, lat, lon)` block of one measurement variable
#[derive(Debug, Clone)]
pub struct Grid {
    pub variable: String,
    pub units: Option<String>,
    pub crs: Crs,
    pub time: Vec<NaiveDateTime>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub values: Array3<f32>,
}

impl Grid {
    /// Build a grid, checking shape and coordinate ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] if the array shape does not match the
    /// coordinates, if lat/lon are not strictly monotonic, or if time is not
    /// strictly increasing.
    pub fn new(
        variable: impl Into<String>,
        time: Vec<NaiveDateTime>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        values: Array3<f32>,
    ) -> Result<Self> {
        let variable = variable.into();
        let expected = (time.len(), lat.len(), lon.len());
        if values.dim() != expected {
            return Err(ClimGridError::load(format!(
                "variable '{variable}' has shape {:?} but coordinates give {expected:?}",
                values.shape()
            )));
        }
        if !is_strictly_monotonic(&lat) {
            return Err(ClimGridError::load("latitude is not strictly monotonic"));
        }
        if !is_strictly_monotonic(&lon) {
            return Err(ClimGridError::load("longitude is not strictly monotonic"));
        }
        if let Some(pair) = time.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ClimGridError::load(format!(
                "time is not strictly increasing ({} followed by {})",
                pair[0], pair[1]
            )));
        }

        Ok(Self {
            variable,
            units: None,
            crs: Crs::default(),
            time,
            lat,
            lon,
            values,
        })
    }

    #[must_use]
    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// `(time, lat, lon)` lengths
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    /// Replace every sample `<= threshold` with NaN.
    pub fn discard_below(&mut self, threshold: f32) {
        self.values.mapv_inplace(|v| if v <= threshold { f32::NAN } else { v });
    }

    /// The 2-D field at position `index` on the time axis.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] if `index` is past the end of the time axis.
    pub fn select_time_index(&self, index: usize) -> Result<ReducedField> {
        let stamp = self.time.get(index).ok_or_else(|| {
            ClimGridError::load(format!(
                "time index {index} out of range for {} steps",
                self.time.len()
            ))
        })?;
        let slice = self.values.slice(s![index, .., ..]).to_owned();
        ReducedField::new(
            format!("{}_{}", self.variable, stamp.format("%Y%m%d")),
            self.lat.clone(),
            self.lon.clone(),
            slice,
        )
        .map(|f| f.with_units(self.units.clone()).with_crs(self.crs.clone()))
    }

    /// The 2-D field at exactly `stamp`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] if no time step equals `stamp`.
    pub fn select_time(&self, stamp: NaiveDateTime) -> Result<ReducedField> {
        let index = self
            .time
            .binary_search(&stamp)
            .map_err(|_| ClimGridError::load(format!("time {stamp} not present in '{}'", self.variable)))?;
        self.select_time_index(index)
    }

    /// Time series at the cell whose centre is nearest to `(lat, lon)`,
    /// `None` when the grid has no cells.
    #[must_use]
    pub fn point_series(&self, lat: f64, lon: f64) -> Option<Vec<(NaiveDateTime, f32)>> {
        let i = nearest_index(&self.lat, lat)?;
        let j = nearest_index(&self.lon, lon)?;
        let series = self
            .time
            .iter()
            .zip(self.values.slice(s![.., i, j]).iter())
            .map(|(t, v)| (*t, *v))
            .collect();
        Some(series)
    }
}

/// A `(lat, lon)` field produced by collapsing the time axis of a [`Grid`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedField {
    pub name: String,
    pub units: Option<String>,
    pub crs: Crs,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub values: Array2<f32>,
}

/// A [`ReducedField`] with the cells outside a boundary set to NaN
pub type MaskedField = ReducedField;

impl ReducedField {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] if the shape does not match `(lat, lon)`.
    pub fn new(name: impl Into<String>, lat: Vec<f64>, lon: Vec<f64>, values: Array2<f32>) -> Result<Self> {
        let name = name.into();
        if values.dim() != (lat.len(), lon.len()) {
            return Err(ClimGridError::load(format!(
                "field '{name}' has shape {:?} but coordinates give ({}, {})",
                values.shape(),
                lat.len(),
                lon.len()
            )));
        }
        Ok(Self {
            name,
            units: None,
            crs: Crs::default(),
            lat,
            lon,
            values,
        })
    }

    #[must_use]
    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Number of finite cells
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Smallest and largest finite value, `None` if every cell is missing
    #[must_use]
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Key of one group produced by group-then-reduce or resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupLabel {
    Year(i32),
    Month(u32),
    DayOfYear(u32),
    /// Start of a resampling period
    Period(NaiveDate),
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupLabel::Year(y) => write!(f, "{y}"),
            GroupLabel::Month(m) => write!(f, "month {m:02}"),
            GroupLabel::DayOfYear(d) => write!(f, "day {d:03}"),
            GroupLabel::Period(date) => write!(f, "{date}"),
        }
    }
}

fn is_strictly_monotonic(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1]) || values.windows(2).all(|w| w[0] > w[1])
}

fn nearest_index(coords: &[f64], target: f64) -> Option<usize> {
    coords
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_crs_spellings() {
        assert_eq!(Crs::parse("epsg:4326"), Crs::WGS84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84"), Crs::WGS84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:EPSG::32644"), Crs::Epsg(32644));
        let prj = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(Crs::parse(prj), Crs::WGS84);
        let utm = r#"PROJCS["WGS_1984_UTM_Zone_44N",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(Crs::parse(utm), Crs::Named("WGS_1984_UTM_Zone_44N".to_string()));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let t = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let result = Grid::new("rf", vec![t], vec![0.0, 1.0], vec![0.0], Array3::zeros((1, 3, 1)));
        assert!(matches!(result, Err(ClimGridError::Load(_))));
    }

    #[test]
    fn accepts_descending_latitude() {
        let t = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let grid = Grid::new("rf", vec![t], vec![1.0, 0.0], vec![0.0], Array3::zeros((1, 2, 1)));
        assert!(grid.is_ok());
    }

    #[test]
    fn point_series_on_an_empty_grid_is_none() {
        let t = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let grid = Grid::new("rf", vec![t], Vec::new(), vec![0.0], Array3::zeros((1, 0, 1))).unwrap();
        assert!(grid.point_series(0.0, 0.0).is_none());

        let grid = Grid::new("rf", vec![t], vec![5.0, 6.0], vec![0.0], Array3::ones((1, 2, 1))).unwrap();
        assert_eq!(grid.point_series(5.9, 10.0).unwrap(), vec![(t, 1.0)]);
    }
}
