//! Centralized error handling for climgrid
//!
//! Every stage of the pipeline reports through [`ClimGridError`]. Errors are
//! never recovered from inside the crate: the first one aborts the run.

use thiserror::Error;

/// Main error type for climgrid operations
#[derive(Error, Debug)]
pub enum ClimGridError {
    /// Missing or unreadable inputs, absent dimensions, bad coordinates
    #[error("Load error: {0}")]
    Load(String),

    /// A spatial cell had no valid sample to reduce under the strict policy
    #[error("Empty reduction: cell (lat={lat_index}, lon={lon_index}) has no valid time samples")]
    EmptyReduction { lat_index: usize, lon_index: usize },

    /// Field and boundary disagree on the reference system
    #[error("CRS mismatch: field is {field}, boundary is {boundary} and no reprojection was supplied")]
    CrsMismatch { field: String, boundary: String },

    /// Invalid palette, range, extent or output format
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    #[error("Cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Cannot parse GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ClimGridError {
    pub(crate) fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub(crate) fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for climgrid operations
pub type Result<T> = std::result::Result<T, ClimGridError>;
