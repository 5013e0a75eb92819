//! Pipeline configuration file
//!
//! The configuration uses [YAML](https://yaml.org) and `serde` so that every
//! path, extent, palette and reduction that the analysis scripts used to
//! hard-code is typed and checked before any data is read.
//!
//! The structures and their fields correspond directly to the keys of the
//! configuration file:
//!
//! ```yaml
//! output_path: plots/spi.png
//! figure: { ncols: 2, suptitle: SPI Demo, abc: true, colorbar: shared }
//! boundaries:
//!   - { name: india, path: shapes/india.shp, crs: "EPSG:4326" }
//! panels:
//!   - input_paths: ["data/spi_gamma_01.nc"]
//!     variable_name: spi_gamma_01
//!     reduction: { kind: instant, time_index: 100 }
//!     overlays: [india]
//!     render: { value_range: [-3, 3], level_step: 0.3, palette: RdYlBu, extend: both }
//! ```

use crate::errors::{ClimGridError, Result};
use crate::grid::Crs;
use crate::netcdf_io::DimNames;
use crate::render::{FigureSpec, RenderSpec};
use crate::statistics::{GroupKey, MissingPolicy, Reduction, Statistic};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A named boundary file, usable as a clip region and as an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySource {
    pub name: String,

    /// `.shp`, `.geojson` or `.json` file
    pub path: PathBuf,

    /// _(Optional)_ Replaces the reference system declared by the file.
    #[serde(default)]
    pub crs: Option<Crs>,

    /// _(Optional)_ Outline colour as `[r, g, b]`. Defaults to black.
    #[serde(default = "BoundarySource::default_color")]
    pub color: [u8; 3],

    /// _(Optional)_ Outline width in pixels. Defaults to `1`.
    #[serde(default = "BoundarySource::default_width")]
    pub width: u32,
}

impl BoundarySource {
    fn default_color() -> [u8; 3] {
        [0, 0, 0]
    }

    fn default_width() -> u32 {
        1
    }
}

/// One subplot: where the data comes from and how it is reduced, clipped
/// and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Literal paths or glob patterns; multiple files are joined along time.
    pub input_paths: Vec<String>,

    pub variable_name: String,

    /// _(Optional)_ Dimension names in the input files.
    #[serde(default)]
    pub dims: DimNames,

    /// _(Optional)_ Reference system of the data. Read from a `crs` or
    /// `spatial_ref` variable when absent, else WGS 84.
    #[serde(default)]
    pub field_crs: Option<Crs>,

    /// _(Optional)_ Defaults to the mean over time.
    #[serde(default)]
    pub reduction: Reduction,

    /// _(Optional)_ Which group or resampling period to draw. Defaults to the first.
    #[serde(default)]
    pub group_index: Option<usize>,

    /// _(Optional)_ Samples at or below this value are treated as missing.
    #[serde(default)]
    pub discard_below: Option<f32>,

    #[serde(default)]
    pub missing_policy: MissingPolicy,

    /// _(Optional)_ Boundary name; cells whose centre is outside become missing.
    #[serde(default)]
    pub clip_to: Option<String>,

    /// _(Optional)_ Boundary names drawn as outlines.
    #[serde(default)]
    pub overlays: Vec<String>,

    #[serde(default)]
    pub render: RenderSpec,
}

impl PanelConfig {
    /// Checks the panel against the limits that serde cannot express.
    pub fn check_bounds(&self) -> Result<()> {
        if self.input_paths.is_empty() {
            return Err(ClimGridError::config(format!(
                "panel '{}' has no input paths",
                self.variable_name
            )));
        }

        if self.variable_name.trim().is_empty() {
            return Err(ClimGridError::config("variable name cannot be empty"));
        }

        if let Some((min, max)) = self.render.value_range {
            if min >= max {
                return Err(ClimGridError::config(format!(
                    "value range ({min}, {max}) must have min < max"
                )));
            }
        }

        if let Some(threshold) = self.discard_below {
            if !threshold.is_finite() {
                return Err(ClimGridError::config("discard_below must be a finite number"));
            }
        }

        if let Some(extent) = &self.render.extent {
            extent
                .validate()
                .map_err(|e| ClimGridError::config(e.to_string()))?;
        }

        match self.reduction {
            Reduction::Instant { time_index: None, time: None } => {
                return Err(ClimGridError::config(
                    "instant reduction needs a time_index or a time",
                ));
            }
            Reduction::Instant { time_index: Some(_), time: Some(_) } => {
                return Err(ClimGridError::config(
                    "instant reduction takes either a time_index or a time, not both",
                ));
            }
            _ => {}
        }

        if self.group_index.is_some() && !self.reduction.is_grouped() {
            return Err(ClimGridError::config(
                "group_index only applies to group and resample reductions",
            ));
        }

        Ok(())
    }
}

/// Main config structure representing the fields in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raster image written once every panel has been processed.
    pub output_path: PathBuf,

    /// _(Optional)_ Also write the drawn fields to this NetCDF file.
    #[serde(default)]
    pub netcdf_output: Option<PathBuf>,

    /// _(Optional)_ Worker threads for reductions and rasterisation.
    /// Defaults to the rayon default (one per core).
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub figure: FigureSpec,

    #[serde(default)]
    pub boundaries: Vec<BoundarySource>,

    pub panels: Vec<PanelConfig>,
}

impl PipelineConfig {
    /// Deserializes a configuration file and checks it.
    ///
    /// # Errors
    ///
    /// Returns the I/O or YAML error, or [`ClimGridError::Config`] if the
    /// content is out of bounds.
    pub fn new_from_file(file_path: &Path) -> Result<Self> {
        let data = fs::read(file_path)?;
        let config: Self = serde_yaml::from_slice(data.as_slice())?;
        config.check_bounds()?;

        debug!(
            "Configuration {} read: {} panel(s), {} boundar(ies)",
            file_path.display(),
            config.panels.len(),
            config.boundaries.len()
        );
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ClimGridError::Config`] on the first violated limit.
    pub fn check_bounds(&self) -> Result<()> {
        if self.panels.is_empty() {
            return Err(ClimGridError::config("at least one panel is required"));
        }

        self.figure
            .validate()
            .map_err(|e| ClimGridError::config(e.to_string()))?;

        if self.panels.len() as u64 > self.figure.capacity() {
            return Err(ClimGridError::config(format!(
                "{} panels do not fit a {}x{} figure",
                self.panels.len(),
                self.figure.nrows,
                self.figure.ncols
            )));
        }

        if self.threads == Some(0) {
            return Err(ClimGridError::config("threads cannot be less than 1"));
        }

        let mut names = HashSet::new();
        for boundary in &self.boundaries {
            if !names.insert(boundary.name.as_str()) {
                return Err(ClimGridError::config(format!(
                    "boundary '{}' is defined twice",
                    boundary.name
                )));
            }
        }

        for panel in &self.panels {
            panel.check_bounds()?;
            for name in panel.clip_to.iter().chain(&panel.overlays) {
                if !names.contains(name.as_str()) {
                    return Err(ClimGridError::config(format!(
                        "panel '{}' refers to unknown boundary '{name}'",
                        panel.variable_name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Temporal reductions available in the flat configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionKind {
    Mean,
    Variance,
    Sum,
    Group,
}

/// The flat single-panel analysis record: one dataset, one optional clip
/// region, one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub input_paths: Vec<String>,
    pub variable_name: String,
    #[serde(default)]
    pub region_boundary_path: Option<PathBuf>,
    pub reduction_kind: ReductionKind,
    #[serde(default)]
    pub group_key: Option<GroupKey>,
    pub value_range: (f64, f64),
    pub palette: String,
    pub output_path: PathBuf,
}

impl TryFrom<AnalysisConfig> for PipelineConfig {
    type Error = ClimGridError;

    fn try_from(flat: AnalysisConfig) -> Result<Self> {
        let reduction = match (flat.reduction_kind, flat.group_key) {
            (ReductionKind::Mean, _) => Reduction::Mean,
            (ReductionKind::Variance, _) => Reduction::Variance,
            (ReductionKind::Sum, _) => Reduction::Sum,
            (ReductionKind::Group, Some(group_key)) => Reduction::Group {
                group_key,
                statistic: Statistic::Mean,
            },
            (ReductionKind::Group, None) => {
                return Err(ClimGridError::config("group reduction needs a group_key"))
            }
        };

        let boundaries: Vec<BoundarySource> = flat
            .region_boundary_path
            .into_iter()
            .map(|path| BoundarySource {
                name: "region".to_string(),
                path,
                crs: None,
                color: BoundarySource::default_color(),
                width: BoundarySource::default_width(),
            })
            .collect();
        let region = boundaries.first().map(|b| b.name.clone());

        let config = Self {
            output_path: flat.output_path,
            netcdf_output: None,
            threads: None,
            figure: FigureSpec::default(),
            panels: vec![PanelConfig {
                input_paths: flat.input_paths,
                variable_name: flat.variable_name,
                dims: DimNames::default(),
                field_crs: None,
                reduction,
                group_index: None,
                discard_below: None,
                missing_policy: MissingPolicy::default(),
                clip_to: region.clone(),
                overlays: region.into_iter().collect(),
                render: RenderSpec {
                    value_range: Some(flat.value_range),
                    palette: flat.palette,
                    ..RenderSpec::default()
                },
            }],
            boundaries,
        };
        config.check_bounds()?;
        Ok(config)
    }
}
