//! Multi-panel map figures
//!
//! A figure is an `nrows × ncols` grid of plate carrée panels, each showing
//! one 2-D field coloured by discrete level bins, with boundary outlines,
//! an optional graticule and colorbars. Text is only drawn when a TrueType
//! font is configured.
//!
//! # Organization
//!
//! - [`palette`]: named colormaps
//! - [`scale`]: [`RenderSpec`], levels and the value → colour mapping
//! - [`map`]: rasterisation of one panel and its overlays
//! - [`colorbar`]: horizontal colorbars with extend arrows
//! - [`text`]: font loading and label formatting

pub mod colorbar;
pub mod map;
pub mod palette;
pub mod scale;
pub mod text;

pub use palette::Palette;
pub use scale::{DrawStyle, Extend, Extent, LevelScale, RenderSpec};

use crate::boundary::BoundaryPolygon;
use crate::errors::{ClimGridError, Result};
use crate::grid::{MaskedField, ReducedField};
use colorbar::{draw_colorbar, ColorbarGeometry};
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::{debug, info};
use map::Viewport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use text::TextPainter;

const MARGIN: u32 = 12;
const GAP: u32 = 16;
const TITLE_BAND: u32 = 24;
const SUPTITLE_BAND: u32 = 32;
const COLORBAR_THICKNESS: u32 = 14;
/// Largest map panel side in pixels
const MAX_PANEL_SIDE: u32 = 16_384;
/// Largest figure side in pixels
const MAX_CANVAS_SIDE: u64 = 32_768;
/// Finest graticule spacing in degrees
const MIN_GRATICULE_STEP: f64 = 0.01;
const TITLE_FONT_SIZE: f32 = 15.0;
const SUPTITLE_FONT_SIZE: f32 = 18.0;
const ABC_FONT_SIZE: f32 = 13.0;
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Where colorbars are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorbarMode {
    /// One bar under the figure, using the first panel's levels
    #[default]
    Shared,
    /// One bar under every panel
    Panel,
    None,
}

/// Figure-wide layout and decoration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureSpec {
    pub nrows: u32,
    pub ncols: u32,
    /// Width of each map panel in pixels; heights follow the extent's aspect
    pub panel_width: u32,
    pub suptitle: Option<String>,
    pub font_path: Option<PathBuf>,
    pub colorbar: ColorbarMode,
    /// Label under the shared colorbar
    pub colorbar_label: Option<String>,
    /// Separator lines between colorbar bins
    pub draw_edges: bool,
    /// Letter panels `(a)`, `(b)`, ... in their lower-left corner
    pub abc: bool,
    pub background: [u8; 3],
    /// Graticule spacing in degrees
    pub lat_lines: Option<f64>,
    pub lon_lines: Option<f64>,
}

impl Default for FigureSpec {
    fn default() -> Self {
        Self {
            nrows: 1,
            ncols: 1,
            panel_width: 480,
            suptitle: None,
            font_path: None,
            colorbar: ColorbarMode::Shared,
            colorbar_label: None,
            draw_edges: true,
            abc: false,
            background: [255, 255, 255],
            lat_lines: None,
            lon_lines: None,
        }
    }
}

impl FigureSpec {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] for an empty layout, a panel width
    /// outside 16..=16384 pixels, a figure wider than 32768 pixels, or a
    /// graticule step below 0.01 degrees.
    pub fn validate(&self) -> Result<()> {
        if self.nrows == 0 || self.ncols == 0 {
            return Err(ClimGridError::render("figure needs at least one row and one column"));
        }
        if !(16..=MAX_PANEL_SIDE).contains(&self.panel_width) {
            return Err(ClimGridError::render(format!(
                "panel width {} is outside 16..={MAX_PANEL_SIDE}",
                self.panel_width
            )));
        }
        let width = self.canvas_width();
        if width > MAX_CANVAS_SIDE {
            return Err(ClimGridError::render(format!(
                "{} columns of {} px make a {width} px wide figure",
                self.ncols, self.panel_width
            )));
        }
        for (name, step) in [("lat_lines", self.lat_lines), ("lon_lines", self.lon_lines)] {
            if let Some(step) = step {
                if !step.is_finite() || step < MIN_GRATICULE_STEP {
                    return Err(ClimGridError::render(format!(
                        "{name} must be at least {MIN_GRATICULE_STEP} degrees, got {step}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of panels the layout holds
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.nrows) * u64::from(self.ncols)
    }

    fn canvas_width(&self) -> u64 {
        let ncols = u64::from(self.ncols);
        2 * u64::from(MARGIN) + ncols * u64::from(self.panel_width) + ncols.saturating_sub(1) * u64::from(GAP)
    }

    fn background(&self) -> Rgba<u8> {
        let [r, g, b] = self.background;
        Rgba([r, g, b, 255])
    }
}

/// A boundary drawn as an outline on top of a panel
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub boundary: &'a BoundaryPolygon,
    pub color: Rgba<u8>,
    pub width: u32,
}

/// One subplot: a field, how to draw it, and what to draw on top
#[derive(Debug, Clone)]
pub struct Panel<'a> {
    pub field: ReducedField,
    pub spec: RenderSpec,
    pub overlays: Vec<Overlay<'a>>,
}

impl<'a> Panel<'a> {
    #[must_use]
    pub fn new(field: ReducedField, spec: RenderSpec) -> Self {
        Self {
            field,
            spec,
            overlays: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: Overlay<'a>) -> Self {
        self.overlays.push(overlay);
        self
    }

    fn extent(&self) -> Result<Extent> {
        let extent = self.spec.extent.unwrap_or_else(|| Extent::of_field(&self.field));
        extent.validate()?;
        Ok(extent)
    }
}

/// Draws figures according to a [`FigureSpec`]
pub struct Renderer {
    figure: FigureSpec,
    text: Option<TextPainter>,
}

impl Renderer {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] for an invalid layout or an
    /// unreadable font.
    pub fn new(figure: FigureSpec) -> Result<Self> {
        figure.validate()?;
        let text = match &figure.font_path {
            Some(path) => Some(TextPainter::from_file(path)?),
            None => {
                debug!("No font configured, titles and labels are skipped");
                None
            }
        };
        Ok(Self { figure, text })
    }

    /// Draw `panels` row by row into one image.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] if there are more panels than the
    /// layout holds, or if any panel has an invalid palette, range or extent.
    pub fn render(&self, panels: &[Panel<'_>]) -> Result<RgbaImage> {
        let fig = &self.figure;
        if panels.is_empty() {
            return Err(ClimGridError::render("nothing to render"));
        }
        if panels.len() as u64 > fig.capacity() {
            return Err(ClimGridError::render(format!(
                "{} panels do not fit a {}x{} layout",
                panels.len(),
                fig.nrows,
                fig.ncols
            )));
        }

        let scales = panels
            .iter()
            .map(|p| p.spec.scale_for(&p.field))
            .collect::<Result<Vec<_>>>()?;
        let extents = panels.iter().map(Panel::extent).collect::<Result<Vec<_>>>()?;
        let heights = extents
            .iter()
            .map(|e| panel_height(fig.panel_width, e))
            .collect::<Result<Vec<u32>>>()?;

        let has_text = self.text.is_some();
        let title_band = if has_text { TITLE_BAND } else { 0 };
        let panel_bar = if fig.colorbar == ColorbarMode::Panel {
            ColorbarGeometry::band_height(COLORBAR_THICKNESS, has_text) + GAP / 2
        } else {
            0
        };
        let suptitle_band = if has_text && fig.suptitle.is_some() { SUPTITLE_BAND } else { 0 };
        let shared_bar = if fig.colorbar == ColorbarMode::Shared {
            ColorbarGeometry::band_height(COLORBAR_THICKNESS, has_text) + GAP
        } else {
            0
        };

        let ncols = fig.ncols as usize;
        let used_rows = panels.len().div_ceil(ncols);
        let row_heights: Vec<u32> = (0..used_rows)
            .map(|r| {
                let tallest = heights.iter().skip(r * ncols).take(ncols).copied().max().unwrap_or(0);
                title_band + tallest + panel_bar
            })
            .collect();

        let (width, height) = canvas_size(
            fig.canvas_width(),
            u64::from(2 * MARGIN + suptitle_band + shared_bar)
                + row_heights.iter().map(|&h| u64::from(h)).sum::<u64>()
                + (used_rows as u64).saturating_sub(1) * u64::from(GAP),
        )?;
        let mut canvas = RgbaImage::from_pixel(width, height, fig.background());

        if let (Some(text), Some(suptitle)) = (&self.text, &fig.suptitle) {
            text.draw_centered(&mut canvas, suptitle, width as i32 / 2, MARGIN as i32, SUPTITLE_FONT_SIZE, TEXT_COLOR);
        }

        let mut row_top = MARGIN + suptitle_band;
        for (r, row_height) in row_heights.iter().enumerate() {
            for c in 0..ncols {
                let k = r * ncols + c;
                let Some(panel) = panels.get(k) else {
                    break;
                };
                let x = MARGIN + c as u32 * (fig.panel_width + GAP);
                let view = Viewport {
                    extent: extents[k],
                    width: fig.panel_width,
                    height: heights[k],
                };

                if let (Some(text), Some(title)) = (&self.text, &panel.spec.title) {
                    let cx = (x + fig.panel_width / 2) as i32;
                    text.draw_centered(&mut canvas, title, cx, row_top as i32 + 2, TITLE_FONT_SIZE, TEXT_COLOR);
                }

                let map_top = row_top + title_band;
                let tile = self.draw_panel(panel, &view, &scales[k], k);
                imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(map_top));

                if fig.colorbar == ColorbarMode::Panel {
                    let geometry = ColorbarGeometry {
                        x: (x + fig.panel_width / 10) as i32,
                        y: (map_top + heights[k] + GAP / 2) as i32,
                        length: fig.panel_width * 4 / 5,
                        thickness: COLORBAR_THICKNESS,
                    };
                    draw_colorbar(
                        &mut canvas,
                        &scales[k],
                        geometry,
                        fig.draw_edges,
                        self.text.as_ref(),
                        panel.spec.label.as_deref(),
                    );
                }
            }
            row_top += row_height + GAP;
        }

        if fig.colorbar == ColorbarMode::Shared {
            let inner = width - 2 * MARGIN;
            let length = inner * 85 / 100;
            let geometry = ColorbarGeometry {
                x: (MARGIN + (inner - length) / 2) as i32,
                y: (height - MARGIN - shared_bar + GAP) as i32,
                length,
                thickness: COLORBAR_THICKNESS,
            };
            let label = fig.colorbar_label.as_deref().or(panels[0].spec.label.as_deref());
            draw_colorbar(&mut canvas, &scales[0], geometry, fig.draw_edges, self.text.as_ref(), label);
        }

        info!("Rendered {} panel(s) into a {width}x{height} image", panels.len());
        Ok(canvas)
    }

    fn draw_panel(&self, panel: &Panel<'_>, view: &Viewport, scale: &LevelScale, index: usize) -> RgbaImage {
        let mut tile = RgbaImage::from_pixel(view.width, view.height, self.figure.background());
        map::rasterize(&mut tile, view, &panel.field, scale, panel.spec.style);
        map::draw_graticule(&mut tile, view, self.figure.lat_lines, self.figure.lon_lines);
        for overlay in &panel.overlays {
            map::draw_outline(&mut tile, view, overlay.boundary, overlay.color, overlay.width);
        }
        map::draw_frame(&mut tile);

        if let (Some(text), true) = (&self.text, self.figure.abc) {
            let letter = format!("({})", abc_letter(index));
            let (_, h) = text.measure(&letter, ABC_FONT_SIZE);
            text.draw(&mut tile, &letter, 4, view.height as i32 - h - 4, ABC_FONT_SIZE, TEXT_COLOR);
        }
        tile
    }

    /// Render and write to `path`; the format follows the extension.
    ///
    /// # Errors
    ///
    /// See [`Renderer::render`] and [`format_for_path`].
    pub fn render_to_file(&self, panels: &[Panel<'_>], path: &Path) -> Result<()> {
        let format = format_for_path(path)?;
        let image = self.render(panels)?;
        let bytes = encode(&image, format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        info!("Saved figure to {}", path.display());
        Ok(())
    }
}

/// Pixel height of a panel `width` pixels wide showing `extent`.
fn panel_height(width: u32, extent: &Extent) -> Result<u32> {
    let height = (f64::from(width) * extent.aspect()).round();
    if !height.is_finite() || height > f64::from(MAX_PANEL_SIDE) {
        return Err(ClimGridError::render(format!(
            "extent {extent:?} needs a panel taller than {MAX_PANEL_SIDE} px at width {width}"
        )));
    }
    Ok((height as u32).max(1))
}

fn canvas_size(width: u64, height: u64) -> Result<(u32, u32)> {
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return Err(ClimGridError::render(format!(
            "a {width}x{height} figure exceeds {MAX_CANVAS_SIDE} px per side"
        )));
    }
    Ok((width as u32, height as u32))
}

/// `a`, `b`, ..., `z`, `aa`, `ab`, ...
fn abc_letter(index: usize) -> String {
    let letter = char::from(b'a' + (index % 26) as u8);
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{letter}", abc_letter(index / 26 - 1))
    }
}

/// Raster format for an output path.
///
/// # Errors
///
/// Returns [`ClimGridError::Render`] for vector formats and unknown extensions.
pub fn format_for_path(path: &Path) -> Result<ImageFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "bmp" => Ok(ImageFormat::Bmp),
        "tif" | "tiff" => Ok(ImageFormat::Tiff),
        "svg" | "pdf" | "eps" | "ps" => Err(ClimGridError::render(format!(
            "vector output '.{extension}' is not supported, use png, jpg, bmp or tiff"
        ))),
        _ => Err(ClimGridError::render(format!(
            "cannot infer an image format from '{}'",
            path.display()
        ))),
    }
}

/// Encode an image in memory; JPEG drops the alpha channel.
///
/// # Errors
///
/// Returns the encoder error.
pub fn encode(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let dynamic = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(dynamic.to_rgb8())
    } else {
        dynamic
    };
    let mut buffer = Cursor::new(Vec::new());
    dynamic.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

/// Render one panel per field, laid out in a single row, and encode it.
///
/// # Errors
///
/// Returns [`ClimGridError::Render`] if `fields` and `specs` differ in
/// length, plus any rendering or encoding error.
pub fn render_fields(
    fields: &[MaskedField],
    specs: &[RenderSpec],
    figure: FigureSpec,
    format: ImageFormat,
) -> Result<Vec<u8>> {
    if fields.len() != specs.len() {
        return Err(ClimGridError::render(format!(
            "{} fields but {} render specs",
            fields.len(),
            specs.len()
        )));
    }
    let figure = FigureSpec {
        nrows: 1,
        ncols: (fields.len() as u32).max(1),
        ..figure
    };
    let panels: Vec<Panel<'_>> = fields
        .iter()
        .zip(specs)
        .map(|(field, spec)| Panel::new(field.clone(), spec.clone()))
        .collect();
    let image = Renderer::new(figure)?.render(&panels)?;
    encode(&image, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Polygon;
    use crate::grid::Crs;
    use ndarray::Array2;

    fn field() -> ReducedField {
        let values = Array2::from_shape_fn((4, 6), |(i, j)| (i * 6 + j) as f32);
        ReducedField::new(
            "f",
            vec![10.0, 11.0, 12.0, 13.0],
            vec![70.0, 71.0, 72.0, 73.0, 74.0, 75.0],
            values,
        )
        .unwrap()
    }

    #[test]
    fn layout_grows_with_panels() {
        let renderer = Renderer::new(FigureSpec {
            ncols: 2,
            panel_width: 120,
            colorbar: ColorbarMode::None,
            ..FigureSpec::default()
        })
        .unwrap();
        let one = renderer.render(&[Panel::new(field(), RenderSpec::default())]).unwrap();
        let two = renderer
            .render(&[
                Panel::new(field(), RenderSpec::default()),
                Panel::new(field(), RenderSpec::default()),
            ])
            .unwrap();
        assert_eq!(one.dimensions(), two.dimensions());
        assert_eq!(one.width(), 2 * MARGIN + 2 * 120 + GAP);
        // 4 x 6 cells spanning 4 x 6 degrees
        assert_eq!(one.height(), 2 * MARGIN + 80);
    }

    #[test]
    fn too_many_panels_is_a_render_error() {
        let renderer = Renderer::new(FigureSpec::default()).unwrap();
        let panels = vec![
            Panel::new(field(), RenderSpec::default()),
            Panel::new(field(), RenderSpec::default()),
        ];
        assert!(matches!(renderer.render(&panels), Err(ClimGridError::Render(_))));
    }

    #[test]
    fn nan_cells_show_background() {
        let mut f = field();
        f.values.fill(f32::NAN);
        f.values[[0, 0]] = 1.0;
        let renderer = Renderer::new(FigureSpec {
            panel_width: 60,
            colorbar: ColorbarMode::None,
            ..FigureSpec::default()
        })
        .unwrap();
        let image = renderer.render(&[Panel::new(f, RenderSpec::default())]).unwrap();
        let centre = image.get_pixel(MARGIN + 30, MARGIN + 20);
        assert_eq!(*centre, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn outlines_are_drawn_over_the_field() {
        let boundary = BoundaryPolygon::new(vec![Polygon::rectangle(71.0, 11.0, 73.0, 12.0)], Crs::WGS84);
        let renderer = Renderer::new(FigureSpec {
            panel_width: 60,
            colorbar: ColorbarMode::None,
            ..FigureSpec::default()
        })
        .unwrap();
        let panel = Panel::new(field(), RenderSpec::default()).with_overlay(Overlay {
            boundary: &boundary,
            color: Rgba([255, 0, 0, 255]),
            width: 1,
        });
        let image = renderer.render(&[panel]).unwrap();
        assert!(image.pixels().any(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn picks_formats_from_extensions() {
        assert_eq!(format_for_path(Path::new("a/b.PNG")).unwrap(), ImageFormat::Png);
        assert_eq!(format_for_path(Path::new("b.jpeg")).unwrap(), ImageFormat::Jpeg);
        assert!(matches!(format_for_path(Path::new("b.svg")), Err(ClimGridError::Render(_))));
        assert!(format_for_path(Path::new("noext")).is_err());
    }

    #[test]
    fn rendering_twice_gives_identical_bytes() {
        let spec = RenderSpec {
            value_range: Some((0.0, 24.0)),
            level_step: Some(3.0),
            palette: "RdYlBu_r".to_string(),
            extend: Extend::Both,
            style: DrawStyle::Contourf,
            ..RenderSpec::default()
        };
        let fields = [field(), field()];
        let specs = [spec.clone(), spec];
        let first = render_fields(&fields, &specs, FigureSpec::default(), ImageFormat::Png).unwrap();
        let second = render_fields(&fields, &specs, FigureSpec::default(), ImageFormat::Png).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert!(render_fields(&fields, &specs[..1], FigureSpec::default(), ImageFormat::Png).is_err());
    }

    #[test]
    fn needle_thin_extent_is_a_render_error() {
        let renderer = Renderer::new(FigureSpec::default()).unwrap();
        let spec = RenderSpec {
            extent: Some(Extent {
                lon_min: 70.0,
                lon_max: 70.0 + 1e-9,
                lat_min: -90.0,
                lat_max: 90.0,
            }),
            ..RenderSpec::default()
        };
        let result = renderer.render(&[Panel::new(field(), spec)]);
        assert!(matches!(result, Err(ClimGridError::Render(_))));
    }

    #[test]
    fn oversized_layouts_are_render_errors() {
        let wide = FigureSpec {
            ncols: u32::MAX,
            nrows: u32::MAX,
            ..FigureSpec::default()
        };
        assert!(matches!(Renderer::new(wide), Err(ClimGridError::Render(_))));

        let tall_rows = Renderer::new(FigureSpec {
            nrows: 200,
            panel_width: 16_000,
            colorbar: ColorbarMode::None,
            ..FigureSpec::default()
        })
        .unwrap();
        let spec = RenderSpec {
            extent: Some(Extent {
                lon_min: 70.0,
                lon_max: 71.0,
                lat_min: 0.0,
                lat_max: 1.0,
            }),
            ..RenderSpec::default()
        };
        let panels = vec![Panel::new(field(), spec); 3];
        assert!(matches!(tall_rows.render(&panels), Err(ClimGridError::Render(_))));
    }

    #[test]
    fn graticule_step_has_a_floor() {
        let dense = FigureSpec {
            lat_lines: Some(1e-12),
            ..FigureSpec::default()
        };
        assert!(matches!(dense.validate(), Err(ClimGridError::Render(_))));
        let nan = FigureSpec {
            lon_lines: Some(f64::NAN),
            ..FigureSpec::default()
        };
        assert!(nan.validate().is_err());
        let fine = FigureSpec {
            lat_lines: Some(0.5),
            lon_lines: Some(0.5),
            ..FigureSpec::default()
        };
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn render_to_file_writes_rasters_and_refuses_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(FigureSpec {
            panel_width: 60,
            ..FigureSpec::default()
        })
        .unwrap();
        let panels = [Panel::new(field(), RenderSpec::default())];

        let png = dir.path().join("maps").join("f.png");
        renderer.render_to_file(&panels, &png).unwrap();
        let written = image::open(&png).unwrap();
        assert_eq!(written.width(), 2 * MARGIN + 60);

        let svg = dir.path().join("f.svg");
        let result = renderer.render_to_file(&panels, &svg);
        assert!(matches!(result, Err(ClimGridError::Render(_))));
        assert!(!svg.exists());
    }

    #[test]
    fn letters_continue_past_z() {
        assert_eq!(abc_letter(0), "a");
        assert_eq!(abc_letter(25), "z");
        assert_eq!(abc_letter(26), "aa");
    }
}
