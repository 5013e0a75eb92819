//! TrueType text for titles, labels and colorbar ticks.

use crate::errors::{ClimGridError, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;

pub struct TextPainter {
    font: Font<'static>,
}

impl TextPainter {
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] if the file is not a usable font.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| ClimGridError::render(format!("'{}' is not a TrueType font", path.display())))?;
        Ok(Self { font })
    }

    /// Width and height of `text` at `size` pixels
    #[must_use]
    pub fn measure(&self, text: &str, size: f32) -> (i32, i32) {
        text_size(Scale::uniform(size), &self.font, text)
    }

    pub fn draw(&self, image: &mut RgbaImage, text: &str, x: i32, y: i32, size: f32, color: Rgba<u8>) {
        draw_text_mut(image, color, x, y, Scale::uniform(size), &self.font, text);
    }

    /// Draw `text` horizontally centred on `cx`
    pub fn draw_centered(&self, image: &mut RgbaImage, text: &str, cx: i32, y: i32, size: f32, color: Rgba<u8>) {
        let (w, _) = self.measure(text, size);
        self.draw(image, text, cx - w / 2, y, size, color);
    }
}

/// Level value without trailing zeros: `3`, `0.3`, `-2.75`
#[must_use]
pub fn format_level(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::format_level;

    #[test]
    fn trims_level_labels() {
        assert_eq!(format_level(3.0), "3");
        assert_eq!(format_level(0.30000000000000004), "0.3");
        assert_eq!(format_level(-2.75), "-2.75");
        assert_eq!(format_level(-0.0001), "0");
    }
}
