//! Horizontal colorbars with optional extend arrows.

use super::scale::LevelScale;
use super::text::{format_level, TextPainter};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

const EDGE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TICK_FONT_SIZE: f32 = 12.0;
const LABEL_FONT_SIZE: f32 = 13.0;
const MAX_TICK_LABELS: usize = 11;

/// Where a colorbar goes on the canvas
#[derive(Debug, Clone, Copy)]
pub struct ColorbarGeometry {
    pub x: i32,
    pub y: i32,
    pub length: u32,
    pub thickness: u32,
}

impl ColorbarGeometry {
    /// Vertical space taken by the bar, its ticks and label
    #[must_use]
    pub const fn band_height(thickness: u32, with_text: bool) -> u32 {
        if with_text {
            thickness + 40
        } else {
            thickness + 8
        }
    }
}

pub fn draw_colorbar(
    image: &mut RgbaImage,
    scale: &LevelScale,
    geometry: ColorbarGeometry,
    draw_edges: bool,
    text: Option<&TextPainter>,
    label: Option<&str>,
) {
    let ColorbarGeometry { x, y, length, thickness } = geometry;
    let t = thickness as i32;
    let arrow = |on: bool| if on { t } else { 0 };
    let left_arrow = arrow(scale.under_color().is_some());
    let right_arrow = arrow(scale.over_color().is_some());

    let bar_x0 = x + left_arrow;
    let bar_len = (length as i32 - left_arrow - right_arrow).max(1);
    let colors = scale.interior_colors();
    let bins = colors.len() as i32;
    let edge_at = |k: i32| bar_x0 + k * bar_len / bins;

    for (k, color) in colors.iter().enumerate() {
        let k = k as i32;
        let (x0, x1) = (edge_at(k), edge_at(k + 1));
        if x1 > x0 {
            draw_filled_rect_mut(image, Rect::at(x0, y).of_size((x1 - x0) as u32, thickness), *color);
        }
    }

    let mid = y + t / 2;
    if let Some(color) = scale.under_color() {
        let points = [Point::new(x, mid), Point::new(bar_x0, y), Point::new(bar_x0, y + t - 1)];
        draw_polygon_mut(image, &points, color);
    }
    if let Some(color) = scale.over_color() {
        let end = bar_x0 + bar_len;
        let points = [Point::new(end, y), Point::new(end + right_arrow, mid), Point::new(end, y + t - 1)];
        draw_polygon_mut(image, &points, color);
    }

    if draw_edges {
        for k in 1..bins {
            let ex = edge_at(k) as f32;
            draw_line_segment_mut(image, (ex, y as f32), (ex, (y + t - 1) as f32), EDGE_COLOR);
        }
    }
    draw_hollow_rect_mut(image, Rect::at(bar_x0, y).of_size(bar_len as u32, thickness), EDGE_COLOR);

    let Some(text) = text else {
        return;
    };
    let levels = scale.levels();
    let stride = levels.len().div_ceil(MAX_TICK_LABELS).max(1);
    for (k, level) in levels.iter().enumerate().step_by(stride) {
        let tx = edge_at(k as i32);
        draw_line_segment_mut(image, (tx as f32, (y + t) as f32), (tx as f32, (y + t + 3) as f32), EDGE_COLOR);
        text.draw_centered(image, &format_level(*level), tx, y + t + 4, TICK_FONT_SIZE, EDGE_COLOR);
    }
    if let Some(label) = label {
        text.draw_centered(image, label, bar_x0 + bar_len / 2, y + t + 22, LABEL_FONT_SIZE, EDGE_COLOR);
    }
}
