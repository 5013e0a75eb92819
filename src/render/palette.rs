//! Named colormaps sampled at discrete level bins.

use crate::errors::{ClimGridError, Result};
use image::Rgba;

const VIRIDIS: &[[u8; 3]] = &[
    [68, 1, 84],
    [72, 40, 120],
    [62, 74, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [109, 205, 89],
    [180, 222, 44],
    [253, 231, 37],
];

const JET: &[[u8; 3]] = &[
    [0, 0, 143],
    [0, 0, 255],
    [0, 127, 255],
    [0, 255, 255],
    [127, 255, 127],
    [255, 255, 0],
    [255, 127, 0],
    [255, 0, 0],
    [128, 0, 0],
];

const RAINBOW: &[[u8; 3]] = &[
    [128, 0, 255],
    [64, 98, 251],
    [0, 180, 235],
    [64, 236, 210],
    [128, 255, 180],
    [191, 236, 139],
    [255, 180, 98],
    [255, 98, 50],
    [255, 0, 0],
];

const RD_YL_BU: &[[u8; 3]] = &[
    [165, 0, 38],
    [215, 48, 39],
    [244, 109, 67],
    [253, 174, 97],
    [254, 224, 144],
    [255, 255, 191],
    [224, 243, 248],
    [171, 217, 233],
    [116, 173, 209],
    [69, 117, 180],
    [49, 54, 149],
];

const RD_BU: &[[u8; 3]] = &[
    [103, 0, 31],
    [178, 24, 43],
    [214, 96, 77],
    [244, 165, 130],
    [253, 219, 199],
    [247, 247, 247],
    [209, 229, 240],
    [146, 197, 222],
    [67, 147, 195],
    [33, 102, 172],
    [5, 48, 97],
];

const BLUES: &[[u8; 3]] = &[
    [247, 251, 255],
    [222, 235, 247],
    [198, 219, 239],
    [158, 202, 225],
    [107, 174, 214],
    [66, 146, 198],
    [33, 113, 181],
    [8, 81, 156],
    [8, 48, 107],
];

const YL_GN_BU: &[[u8; 3]] = &[
    [255, 255, 217],
    [237, 248, 177],
    [199, 233, 180],
    [127, 205, 187],
    [65, 182, 196],
    [29, 145, 192],
    [34, 94, 168],
    [37, 52, 148],
    [8, 29, 88],
];

/// A continuous colormap defined by evenly spaced stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    stops: Vec<[u8; 3]>,
}

impl Palette {
    /// Look up a palette by its matplotlib name; a `_r` suffix reverses it.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Render`] for unknown names.
    pub fn by_name(name: &str) -> Result<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let stops = match base.to_ascii_lowercase().as_str() {
            "viridis" => VIRIDIS,
            "jet" => JET,
            "rainbow" => RAINBOW,
            "rdylbu" => RD_YL_BU,
            "rdbu" => RD_BU,
            "blues" => BLUES,
            "ylgnbu" => YL_GN_BU,
            _ => return Err(ClimGridError::render(format!("unknown palette '{name}'"))),
        };

        let mut stops = stops.to_vec();
        if reversed {
            stops.reverse();
        }
        Ok(Self { stops })
    }

    /// Linear interpolation between stops, `t` clamped to `[0, 1]`
    #[must_use]
    pub fn sample(&self, t: f64) -> Rgba<u8> {
        let t = t.clamp(0.0, 1.0);
        let position = t * (self.stops.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(self.stops.len() - 1);
        let frac = position - position.floor();

        let a = self.stops[lower];
        let b = self.stops[upper];
        let mix = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * frac).round() as u8;
        Rgba([mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 255])
    }

    /// `count` colours spread evenly over the whole palette
    #[must_use]
    pub fn discrete(&self, count: usize) -> Vec<Rgba<u8>> {
        match count {
            0 => Vec::new(),
            1 => vec![self.sample(0.5)],
            n => (0..n)
                .map(|i| self.sample(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_palette_swaps_ends() {
        let forward = Palette::by_name("RdYlBu").unwrap();
        let reversed = Palette::by_name("RdYlBu_r").unwrap();
        assert_eq!(forward.sample(0.0), reversed.sample(1.0));
        assert_eq!(forward.sample(1.0), Rgba([49, 54, 149, 255]));
    }

    #[test]
    fn unknown_palette_is_a_render_error() {
        assert!(matches!(Palette::by_name("plasma-ish"), Err(ClimGridError::Render(_))));
    }
}
