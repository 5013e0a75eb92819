//! Load → filter → reduce → clip → render, for every panel of a figure
//!
//! The run is a single forward pass. The first error aborts it and nothing
//! is written: the image and then the NetCDF output are only produced after
//! every panel has been processed and the figure has been encoded, and the
//! image is removed again if the NetCDF output cannot be written.

use crate::boundary::BoundaryPolygon;
use crate::config::{BoundarySource, PanelConfig, PipelineConfig};
use crate::errors::{ClimGridError, Result};
use crate::grid::{GroupLabel, ReducedField};
use crate::mask::mask_field;
use crate::netcdf_io::{detect_crs, expand_inputs, load_grid, NetCDFWriter};
use crate::parallel::ParallelConfig;
use crate::render::{encode, format_for_path, Overlay, Panel, Renderer};
use crate::statistics::{ReductionOutput, TemporalReducer};
use image::Rgba;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// What one panel ended up drawing
#[derive(Debug, Clone, PartialEq)]
pub struct PanelReport {
    pub field_name: String,
    pub title: Option<String>,
    /// Label of the drawn group for grouped reductions
    pub group: Option<GroupLabel>,
    /// Number of groups the reduction produced
    pub group_count: usize,
    pub valid_cells: usize,
    pub total_cells: usize,
    pub value_range: Option<(f32, f32)>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub output_path: PathBuf,
    pub netcdf_output: Option<PathBuf>,
    pub panels: Vec<PanelReport>,
}

/// A panel's field after reduction and clipping
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPanel {
    pub field: ReducedField,
    pub report: PanelReport,
}

/// Run every panel of `config` and write the figure.
///
/// # Errors
///
/// Returns the first error of any stage; no output file is written then.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    config.check_bounds()?;
    let parallel = ParallelConfig::new(config.threads);
    parallel.install(|| execute(config))
}

fn execute(config: &PipelineConfig) -> Result<PipelineReport> {
    let format = format_for_path(&config.output_path)?;
    let renderer = Renderer::new(config.figure.clone())?;
    let boundaries = load_boundaries(&config.boundaries)?;

    let mut processed = Vec::with_capacity(config.panels.len());
    for (index, panel) in config.panels.iter().enumerate() {
        info!(
            "Panel {}/{}: '{}'",
            index + 1,
            config.panels.len(),
            panel.variable_name
        );
        processed.push(process_panel(panel, &boundaries)?);
    }

    let panels: Vec<Panel<'_>> = processed
        .iter()
        .zip(&config.panels)
        .map(|(done, panel)| {
            let overlays = panel
                .overlays
                .iter()
                .map(|name| overlay_for(name, &boundaries, &config.boundaries))
                .collect::<Result<Vec<_>>>()?;
            Ok(Panel {
                field: done.field.clone(),
                spec: panel.render.clone(),
                overlays,
            })
        })
        .collect::<Result<_>>()?;

    let image = renderer.render(&panels)?;
    let bytes = encode(&image, format)?;

    create_parent(&config.output_path)?;
    fs::write(&config.output_path, bytes)?;
    info!("Saved figure to {}", config.output_path.display());

    if let Some(path) = &config.netcdf_output {
        let fields = unique_names(processed.iter().map(|p| p.field.clone()).collect());
        let refs: Vec<&ReducedField> = fields.iter().collect();
        let written = create_parent(path).and_then(|()| NetCDFWriter::new(path).write_fields(&refs));
        if let Err(err) = written {
            discard(path);
            discard(&config.output_path);
            return Err(err);
        }
    }

    Ok(PipelineReport {
        output_path: config.output_path.clone(),
        netcdf_output: config.netcdf_output.clone(),
        panels: processed.into_iter().map(|p| p.report).collect(),
    })
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Remove an output of a failed run.
fn discard(path: &Path) {
    if path.is_file() {
        if let Err(err) = fs::remove_file(path) {
            warn!("Could not remove {}: {err}", path.display());
        }
    }
}

/// Load every configured boundary, keyed by name.
///
/// # Errors
///
/// Returns the first boundary that cannot be read.
pub fn load_boundaries(sources: &[BoundarySource]) -> Result<BTreeMap<String, BoundaryPolygon>> {
    sources
        .iter()
        .map(|source| {
            BoundaryPolygon::load(&source.path, source.crs.as_ref()).map(|b| (source.name.clone(), b))
        })
        .collect()
}

/// Load, filter, reduce and clip the data of one panel.
///
/// # Errors
///
/// Returns load, reduction or CRS errors, and [`ClimGridError::Config`] for
/// a clip region missing from `boundaries`.
pub fn process_panel(
    panel: &PanelConfig,
    boundaries: &BTreeMap<String, BoundaryPolygon>,
) -> Result<ProcessedPanel> {
    let crs = match &panel.field_crs {
        Some(crs) => crs.clone(),
        None => {
            let files = expand_inputs(&panel.input_paths)?;
            detect_crs(&files[0])
        }
    };
    let mut grid = load_grid(&panel.input_paths, &panel.variable_name, &panel.dims)?.with_crs(crs);

    if let Some(threshold) = panel.discard_below {
        debug!("Discarding '{}' samples <= {threshold}", grid.variable);
        grid.discard_below(threshold);
    }

    let output = TemporalReducer::new(panel.missing_policy).reduce(&grid, &panel.reduction)?;
    let (group, group_count) = match &output {
        ReductionOutput::Field(_) => (None, 1),
        ReductionOutput::Groups(groups) => {
            let index = panel.group_index.unwrap_or(0);
            (groups.get(index).map(|(label, _)| *label), groups.len())
        }
    };
    let mut field = output.into_field(panel.group_index)?;

    if let Some(name) = &panel.clip_to {
        let boundary = boundaries
            .get(name)
            .ok_or_else(|| ClimGridError::config(format!("unknown boundary '{name}'")))?;
        field = mask_field(&field, boundary)?;
    }

    let report = PanelReport {
        field_name: field.name.clone(),
        title: panel.render.title.clone(),
        group,
        group_count,
        valid_cells: field.valid_count(),
        total_cells: field.values.len(),
        value_range: field.finite_range(),
    };
    info!(
        "'{}': {} of {} cells valid",
        report.field_name, report.valid_cells, report.total_cells
    );

    Ok(ProcessedPanel { field, report })
}

fn overlay_for<'a>(
    name: &str,
    boundaries: &'a BTreeMap<String, BoundaryPolygon>,
    sources: &[BoundarySource],
) -> Result<Overlay<'a>> {
    let boundary = boundaries
        .get(name)
        .ok_or_else(|| ClimGridError::config(format!("unknown boundary '{name}'")))?;
    let source = sources.iter().find(|s| s.name == name);
    let [r, g, b] = source.map_or([0, 0, 0], |s| s.color);
    Ok(Overlay {
        boundary,
        color: Rgba([r, g, b, 255]),
        width: source.map_or(1, |s| s.width),
    })
}

/// Suffix repeated field names with their panel position.
fn unique_names(mut fields: Vec<ReducedField>) -> Vec<ReducedField> {
    let mut seen = HashSet::new();
    for (index, field) in fields.iter_mut().enumerate() {
        if !seen.insert(field.name.clone()) {
            field.name = format!("{}_panel{}", field.name, index + 1);
            seen.insert(field.name.clone());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn repeated_names_get_panel_suffix() {
        let field = ReducedField::new("rf_mean_over_time", vec![0.0], vec![0.0], Array2::zeros((1, 1))).unwrap();
        let named = unique_names(vec![field.clone(), field.clone(), field]);
        let names: Vec<&str> = named.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["rf_mean_over_time", "rf_mean_over_time_panel2", "rf_mean_over_time_panel3"]);
    }
}
