//! Clipping a reduced field to a region boundary
//!
//! A cell is kept iff its centre point lies inside the boundary. Cells that
//! straddle the outline are not area-weighted.

use crate::boundary::BoundaryPolygon;
use crate::errors::{ClimGridError, Result};
use crate::grid::{MaskedField, ReducedField};
use log::info;
use ndarray::Array2;
use rayon::prelude::*;

/// Set every cell whose centre is outside `boundary` to NaN.
///
/// # Errors
///
/// Returns [`ClimGridError::CrsMismatch`] if the field and boundary are in
/// different reference systems.
pub fn mask_field(field: &ReducedField, boundary: &BoundaryPolygon) -> Result<MaskedField> {
    if field.crs != boundary.crs {
        return Err(ClimGridError::CrsMismatch {
            field: field.crs.to_string(),
            boundary: boundary.crs.to_string(),
        });
    }

    let inside = inside_cells(field, boundary);
    let mut masked = field.clone();
    masked
        .values
        .zip_mut_with(&inside, |v, &keep| if !keep { *v = f32::NAN });
    masked.name = format!("{}_clipped", field.name);

    info!(
        "Clipped '{}': {} of {} cells inside boundary",
        field.name,
        inside.iter().filter(|&&k| k).count(),
        inside.len()
    );
    Ok(masked)
}

/// Reproject `boundary` into the field's CRS with `transform`, then mask.
///
/// # Errors
///
/// Never fails on CRS grounds; see [`mask_field`].
pub fn mask_field_reprojected(
    field: &ReducedField,
    boundary: &BoundaryPolygon,
    transform: impl Fn(f64, f64) -> (f64, f64),
) -> Result<MaskedField> {
    let reprojected = boundary.reproject(field.crs.clone(), transform);
    mask_field(field, &reprojected)
}

/// Boolean `(lat, lon)` grid, `true` where the cell centre is inside.
///
/// Longitudes past 180 are also tested shifted by -360 so 0..360 grids
/// match -180..180 outlines.
#[must_use]
pub fn inside_cells(field: &ReducedField, boundary: &BoundaryPolygon) -> Array2<bool> {
    let shape = field.values.dim();
    let flags: Vec<bool> = field
        .lat
        .par_iter()
        .flat_map_iter(|&lat| {
            field.lon.iter().map(move |&lon| {
                boundary.contains(lon, lat) || (lon > 180.0 && boundary.contains(lon - 360.0, lat))
            })
        })
        .collect();
    // lat.len() * lon.len() flags, matching the validated field shape
    Array2::from_shape_vec(shape, flags).unwrap_or_else(|_| Array2::from_elem(shape, false))
}
