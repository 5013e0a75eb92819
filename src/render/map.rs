//! Plate carrée rasterisation of one map panel.

use super::scale::{DrawStyle, Extent, LevelScale};
use crate::boundary::BoundaryPolygon;
use crate::grid::ReducedField;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use rayon::prelude::*;

const GRID_COLOR: Rgba<u8> = Rgba([150, 150, 150, 255]);
const FRAME_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Locates positions along one monotonic coordinate axis
#[derive(Debug, Clone)]
pub struct CellAxis {
    centres: Vec<f64>,
    descending: bool,
}

impl CellAxis {
    #[must_use]
    pub fn new(centres: &[f64]) -> Self {
        let descending = centres.len() > 1 && centres[0] > centres[centres.len() - 1];
        let mut centres = centres.to_vec();
        if descending {
            centres.reverse();
        }
        Self { centres, descending }
    }

    fn to_original(&self, index: usize) -> usize {
        if self.descending {
            self.centres.len() - 1 - index
        } else {
            index
        }
    }

    fn end_half_spacing(&self, index: usize) -> f64 {
        let c = &self.centres;
        match c.len() {
            0 | 1 => 0.5,
            _ if index == 0 => (c[1] - c[0]) / 2.0,
            n => (c[n - 1] - c[n - 2]) / 2.0,
        }
    }

    /// Index of the cell containing `x`, `None` past the outer edges
    #[must_use]
    pub fn locate(&self, x: f64) -> Option<usize> {
        let c = &self.centres;
        if c.is_empty() {
            return None;
        }
        let upper = c.partition_point(|&v| v < x);
        let last = c.len() - 1;
        let index = if upper == 0 {
            if c[0] - x > self.end_half_spacing(0) {
                return None;
            }
            0
        } else if upper == c.len() {
            if x - c[last] > self.end_half_spacing(last) {
                return None;
            }
            last
        } else if x - c[upper - 1] <= c[upper] - x {
            upper - 1
        } else {
            upper
        };
        Some(self.to_original(index))
    }

    /// Bracketing cells and weight of the second, for bilinear sampling.
    /// Positions between the outer centres and edges clamp to the edge cell.
    #[must_use]
    pub fn bracket(&self, x: f64) -> Option<(usize, usize, f64)> {
        let c = &self.centres;
        let nearest = self.locate(x)?;
        if c.len() < 2 {
            return Some((nearest, nearest, 0.0));
        }
        let upper = c.partition_point(|&v| v <= x);
        if upper == 0 || upper == c.len() {
            return Some((nearest, nearest, 0.0));
        }
        let (lo, hi) = (upper - 1, upper);
        let t = (x - c[lo]) / (c[hi] - c[lo]);
        Some((self.to_original(lo), self.to_original(hi), t))
    }
}

/// Pixel geometry of a panel
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Longitude and latitude at the centre of pixel `(px, py)`
    #[must_use]
    pub fn unproject(&self, px: u32, py: u32) -> (f64, f64) {
        let e = &self.extent;
        let lon = e.lon_min + (f64::from(px) + 0.5) / f64::from(self.width) * (e.lon_max - e.lon_min);
        let lat = e.lat_max - (f64::from(py) + 0.5) / f64::from(self.height) * (e.lat_max - e.lat_min);
        (lon, lat)
    }

    /// Pixel position of `(lon, lat)`, possibly outside the panel
    #[must_use]
    pub fn project(&self, lon: f64, lat: f64) -> (f32, f32) {
        let e = &self.extent;
        let x = (lon - e.lon_min) / (e.lon_max - e.lon_min) * f64::from(self.width);
        let y = (e.lat_max - lat) / (e.lat_max - e.lat_min) * f64::from(self.height);
        (x as f32, y as f32)
    }
}

/// Fill the panel with the field's colours; rows are rendered in parallel.
pub fn rasterize(
    image: &mut RgbaImage,
    view: &Viewport,
    field: &ReducedField,
    scale: &LevelScale,
    style: DrawStyle,
) {
    let lat_axis = CellAxis::new(&field.lat);
    let lon_axis = CellAxis::new(&field.lon);
    let width = view.width as usize;

    image
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(py, row)| {
            for px in 0..view.width {
                let (lon, lat) = view.unproject(px, py as u32);
                let value = match style {
                    DrawStyle::Pcolormesh => nearest_value(field, &lat_axis, &lon_axis, lat, lon),
                    DrawStyle::Contourf => bilinear_value(field, &lat_axis, &lon_axis, lat, lon),
                };
                if let Some(color) = value.and_then(|v| scale.color_of(f64::from(v))) {
                    let offset = px as usize * 4;
                    row[offset..offset + 4].copy_from_slice(&color.0);
                }
            }
        });
}

fn nearest_value(field: &ReducedField, lat_axis: &CellAxis, lon_axis: &CellAxis, lat: f64, lon: f64) -> Option<f32> {
    let i = lat_axis.locate(lat)?;
    let j = lon_axis.locate(lon)?;
    Some(field.values[[i, j]])
}

fn bilinear_value(field: &ReducedField, lat_axis: &CellAxis, lon_axis: &CellAxis, lat: f64, lon: f64) -> Option<f32> {
    let (i0, i1, ty) = lat_axis.bracket(lat)?;
    let (j0, j1, tx) = lon_axis.bracket(lon)?;
    let v = &field.values;
    let corners = [v[[i0, j0]], v[[i0, j1]], v[[i1, j0]], v[[i1, j1]]];
    if corners.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let (tx, ty) = (tx as f32, ty as f32);
    let top = corners[0] * (1.0 - tx) + corners[1] * tx;
    let bottom = corners[2] * (1.0 - tx) + corners[3] * tx;
    Some(top * (1.0 - ty) + bottom * ty)
}

/// Dashed graticule every `lat_step`/`lon_step` degrees
pub fn draw_graticule(image: &mut RgbaImage, view: &Viewport, lat_step: Option<f64>, lon_step: Option<f64>) {
    let e = view.extent;
    let dashed = |i: u32| i % 15 < 5;

    if let Some(step) = lon_step.filter(|s| *s > 0.0) {
        let mut lon = (e.lon_min / step).ceil() * step;
        while lon <= e.lon_max {
            let (x, _) = view.project(lon, e.lat_max);
            let x = x.round() as i64;
            if (0..i64::from(view.width)).contains(&x) {
                for y in (0..view.height).filter(|&y| dashed(y)) {
                    image.put_pixel(x as u32, y, GRID_COLOR);
                }
            }
            lon += step;
        }
    }

    if let Some(step) = lat_step.filter(|s| *s > 0.0) {
        let mut lat = (e.lat_min / step).ceil() * step;
        while lat <= e.lat_max {
            let (_, y) = view.project(e.lon_min, lat);
            let y = y.round() as i64;
            if (0..i64::from(view.height)).contains(&y) {
                for x in (0..view.width).filter(|&x| dashed(x)) {
                    image.put_pixel(x, y as u32, GRID_COLOR);
                }
            }
            lat += step;
        }
    }
}

/// Outline every ring of `boundary`; `width` > 1 is drawn as offset strokes.
pub fn draw_outline(image: &mut RgbaImage, view: &Viewport, boundary: &BoundaryPolygon, color: Rgba<u8>, width: u32) {
    let offsets: Vec<(f32, f32)> = if width <= 1 {
        vec![(0.0, 0.0)]
    } else {
        let half = (width / 2) as i32;
        (-half..=half)
            .flat_map(|dx| (-half..=half).map(move |dy| (dx as f32, dy as f32)))
            .collect()
    };

    for ring in boundary.rings() {
        for pair in ring.windows(2) {
            let a = view.project(pair[0].0, pair[0].1);
            let b = view.project(pair[1].0, pair[1].1);
            for &(dx, dy) in &offsets {
                draw_line_segment_mut(image, (a.0 + dx, a.1 + dy), (b.0 + dx, b.1 + dy), color);
            }
        }
    }
}

/// One-pixel black frame around the panel
pub fn draw_frame(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    draw_hollow_rect_mut(image, Rect::at(0, 0).of_size(w, h), FRAME_COLOR);
}
