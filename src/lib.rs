//! climgrid: temporal reduction, region clipping and mapping of gridded climate data
//!
//! climgrid turns gridded NetCDF datasets (rainfall, drought indices such as
//! SPI) into map figures. Every run follows the same forward pass:
//!
//! 1. load one variable from one or more files, joined along time
//! 2. optionally discard samples below a threshold
//! 3. collapse the time axis (mean, variance, sum, grouped or resampled)
//! 4. optionally clip the field to a polygon boundary
//! 5. render one or more panels with colorbars and outlines, and save the image
//!
//! ## Module Organization
//!
//! - [`grid`]: the [`Grid`](grid::Grid) and [`ReducedField`](grid::ReducedField) types
//! - [`netcdf_io`]: dataset loading, CF time decoding and NetCDF output
//! - [`statistics`]: NaN-skipping temporal reductions in parallel
//! - [`boundary`]: shapefile and GeoJSON boundaries
//! - [`mask`]: centre-point clipping of fields to boundaries
//! - [`render`]: multi-panel plate carrée figures
//! - [`config`]: the YAML pipeline configuration
//! - [`pipeline`]: runs a configuration end to end
//! - [`metadata`]: file inspection
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use climgrid::prelude::*;
//! use std::path::Path;
//!
//! let grid = load_grid(&["data/rf_*.nc"], "rf", &DimNames::default()).unwrap();
//! let mean = TemporalReducer::new(MissingPolicy::Lenient)
//!     .statistic(&grid, Statistic::Mean)
//!     .unwrap();
//! let region = BoundaryPolygon::load(Path::new("shapes/andhra.shp"), None).unwrap();
//! let clipped = mask_field(&mean, &region).unwrap();
//! write_field_to_netcdf(&clipped, Path::new("rf_mean.nc")).unwrap();
//! ```

pub mod boundary;
pub mod config;
pub mod errors;
pub mod grid;
pub mod mask;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod render;
pub mod statistics;

pub use errors::{ClimGridError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::boundary::{BoundaryPolygon, Polygon};
    pub use crate::config::{AnalysisConfig, PipelineConfig};
    pub use crate::errors::{ClimGridError, Result};
    pub use crate::grid::{Crs, Grid, GroupLabel, MaskedField, ReducedField};
    pub use crate::mask::{mask_field, mask_field_reprojected};
    pub use crate::netcdf_io::{load_grid, write_field_to_netcdf, DimNames, NetCDFWriter};
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{run_pipeline, PipelineReport};
    pub use crate::render::{FigureSpec, Panel, RenderSpec, Renderer};
    pub use crate::statistics::{
        GroupKey, MissingPolicy, Reduction, ResampleFreq, Statistic, TemporalReducer,
    };
}
