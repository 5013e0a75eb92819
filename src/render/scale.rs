//! Per-panel render settings and the level scale derived from them.

use super::palette::Palette;
use crate::errors::{ClimGridError, Result};
use crate::grid::ReducedField;
use image::Rgba;
use serde::{Deserialize, Serialize};

/// Levels above this count are almost certainly a typo in the step
const MAX_LEVELS: usize = 256;

/// Colorbar arrows for values outside the level range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extend {
    #[default]
    Neither,
    Min,
    Max,
    Both,
}

impl Extend {
    #[must_use]
    pub const fn below(self) -> bool {
        matches!(self, Self::Min | Self::Both)
    }

    #[must_use]
    pub const fn above(self) -> bool {
        matches!(self, Self::Max | Self::Both)
    }
}

/// How cell values become pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStyle {
    /// Flat colour per cell
    #[default]
    Pcolormesh,
    /// Bilinear interpolation between cell centres, then level bins
    Contourf,
}

/// Geographic window of a panel, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Extent {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] for empty or out-of-range windows.
    pub fn validate(&self) -> Result<()> {
        if !(self.lon_min < self.lon_max && self.lat_min < self.lat_max) {
            return Err(ClimGridError::render(format!("empty extent {self:?}")));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(ClimGridError::render(format!("latitude outside [-90, 90] in {self:?}")));
        }
        Ok(())
    }

    /// Outer cell edges of a field
    #[must_use]
    pub fn of_field(field: &ReducedField) -> Self {
        let (lon_min, lon_max) = edge_span(&field.lon);
        let (lat_min, lat_max) = edge_span(&field.lat);
        Self {
            lon_min,
            lon_max,
            lat_min: lat_min.max(-90.0),
            lat_max: lat_max.min(90.0),
        }
    }

    #[must_use]
    pub fn aspect(&self) -> f64 {
        (self.lat_max - self.lat_min) / (self.lon_max - self.lon_min)
    }
}

fn edge_span(centres: &[f64]) -> (f64, f64) {
    let lo = centres.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = centres.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let half = if centres.len() > 1 {
        (hi - lo) / (centres.len() - 1) as f64 / 2.0
    } else {
        0.5
    };
    (lo - half, hi + half)
}

/// Settings for one panel; every field is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSpec {
    pub value_range: Option<(f64, f64)>,
    pub level_step: Option<f64>,
    pub levels: Option<Vec<f64>>,
    pub palette: String,
    pub extend: Extend,
    pub extent: Option<Extent>,
    pub title: Option<String>,
    pub label: Option<String>,
    pub style: DrawStyle,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            value_range: None,
            level_step: None,
            levels: None,
            palette: "viridis".to_string(),
            extend: Extend::Neither,
            extent: None,
            title: None,
            label: None,
            style: DrawStyle::Pcolormesh,
        }
    }
}

impl RenderSpec {
    /// Resolve the level boundaries for `field`.
    ///
    /// Precedence: explicit levels, then `arange(min, max, step)`, then ten
    /// equal bins over the range, then ten bins over the field's own range.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] for reversed ranges, non-positive
    /// steps or fewer than two levels.
    pub fn levels_for(&self, field: &ReducedField) -> Result<Vec<f64>> {
        if let Some(levels) = &self.levels {
            if levels.len() < 2 || levels.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ClimGridError::render("levels must be at least two increasing values"));
            }
            return Ok(levels.clone());
        }

        let (lo, hi) = match self.value_range {
            Some((lo, hi)) => {
                if lo >= hi {
                    return Err(ClimGridError::render(format!("value range ({lo}, {hi}) is empty")));
                }
                (lo, hi)
            }
            None => match field.finite_range() {
                Some((lo, hi)) if lo < hi => (f64::from(lo), f64::from(hi)),
                Some((v, _)) => (f64::from(v) - 0.5, f64::from(v) + 0.5),
                None => (0.0, 1.0),
            },
        };

        let levels = match self.level_step {
            Some(step) if step <= 0.0 => {
                return Err(ClimGridError::render(format!("level step {step} must be positive")))
            }
            Some(step) => {
                let count = ((hi - lo) / step).ceil() as usize;
                if count > MAX_LEVELS {
                    return Err(ClimGridError::render(format!("{count} levels is too many")));
                }
                (0..count).map(|i| lo + i as f64 * step).collect::<Vec<_>>()
            }
            None => (0..=10).map(|i| lo + (hi - lo) * f64::from(i) / 10.0).collect(),
        };

        if levels.len() < 2 {
            return Err(ClimGridError::render(format!(
                "range ({lo}, {hi}) with step {:?} gives fewer than two levels",
                self.level_step
            )));
        }
        Ok(levels)
    }

    /// # Errors
    ///
    /// See [`RenderSpec::levels_for`] and [`Palette::by_name`].
    pub fn scale_for(&self, field: &ReducedField) -> Result<LevelScale> {
        LevelScale::new(self.levels_for(field)?, &Palette::by_name(&self.palette)?, self.extend)
    }
}

/// Maps values to the colour of their level bin
#[derive(Debug, Clone, PartialEq)]
pub struct LevelScale {
    levels: Vec<f64>,
    extend: Extend,
    colors: Vec<Rgba<u8>>,
}

impl LevelScale {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] if fewer than two levels are given.
    pub fn new(levels: Vec<f64>, palette: &Palette, extend: Extend) -> Result<Self> {
        if levels.len() < 2 {
            return Err(ClimGridError::render("a level scale needs at least two levels"));
        }
        let bins = levels.len() - 1 + usize::from(extend.below()) + usize::from(extend.above());
        Ok(Self {
            colors: palette.discrete(bins),
            levels,
            extend,
        })
    }

    #[must_use]
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    #[must_use]
    pub const fn extend(&self) -> Extend {
        self.extend
    }

    /// Colours of the interior bins, lowest first
    #[must_use]
    pub fn interior_colors(&self) -> &[Rgba<u8>] {
        let start = usize::from(self.extend.below());
        &self.colors[start..start + self.levels.len() - 1]
    }

    #[must_use]
    pub fn under_color(&self) -> Option<Rgba<u8>> {
        self.extend.below().then(|| self.colors[0])
    }

    #[must_use]
    pub fn over_color(&self) -> Option<Rgba<u8>> {
        self.extend.above().then(|| self.colors[self.colors.len() - 1])
    }

    /// Colour for `value`; `None` for NaN and for out-of-range values
    /// without an extend arrow on that side.
    #[must_use]
    pub fn color_of(&self, value: f64) -> Option<Rgba<u8>> {
        if !value.is_finite() {
            return None;
        }
        let first = self.levels[0];
        let last = self.levels[self.levels.len() - 1];
        if value < first {
            return self.under_color();
        }
        if value > last {
            return self.over_color();
        }
        let bin = self.levels.partition_point(|&l| l <= value).saturating_sub(1);
        let bin = bin.min(self.levels.len() - 2);
        Some(self.interior_colors()[bin])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn field() -> ReducedField {
        ReducedField::new("f", vec![0.0, 1.0], vec![0.0, 1.0], Array2::from_elem((2, 2), 2.0)).unwrap()
    }

    #[test]
    fn step_levels_follow_arange() {
        let spec = RenderSpec {
            value_range: Some((0.0, 10.0)),
            level_step: Some(1.0),
            ..RenderSpec::default()
        };
        let levels = spec.levels_for(&field()).unwrap();
        assert_eq!(levels, (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let spec = RenderSpec {
            value_range: Some((5.0, 1.0)),
            ..RenderSpec::default()
        };
        assert!(matches!(spec.levels_for(&field()), Err(ClimGridError::Render(_))));
    }

    #[test]
    fn extend_controls_out_of_range_colours() {
        let palette = Palette::by_name("viridis").unwrap();
        let neither = LevelScale::new(vec![0.0, 1.0, 2.0], &palette, Extend::Neither).unwrap();
        assert_eq!(neither.color_of(-1.0), None);
        assert_eq!(neither.color_of(2.0), Some(neither.interior_colors()[1]));

        let both = LevelScale::new(vec![0.0, 1.0, 2.0], &palette, Extend::Both).unwrap();
        assert_eq!(both.color_of(-1.0), Some(palette.sample(0.0)));
        assert_eq!(both.color_of(9.0), Some(palette.sample(1.0)));
        assert_eq!(both.interior_colors().len(), 2);
        assert_eq!(both.color_of(f64::NAN), None);
    }
}
