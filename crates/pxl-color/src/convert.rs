//! Per-pixel conversions and the color space graph.
//!
//! Every color space of the RGB family is one or more edges away from RGB.
//! [`conversion_path`] finds the shortest chain of edges between two spaces
//! and [`convert_pixel`] runs a triplet along it.
//!
//! ```text
//!   HSV ── RGB ── HSI
//!          │ \
//!     CIEXYZ  \
//!          │   \
//!     CIELab ── CIELch
//! ```
//!
//! Grayscale is not part of the graph: gray to color and color to gray
//! change the number of channels and are handled at the image level.

use std::collections::VecDeque;

use pxl_core::{ColorSpace, Error, Result};

use crate::system::RgbColorSystem;

// ============================================================================
// HSV / HSI
// ============================================================================

/// Hue of an RGB triplet as a fraction of a turn, given its max and delta.
#[inline]
fn hue(rgb: [f64; 3], max: f64, delta: f64) -> f64 {
    let [r, g, b] = rgb;
    let mut h = if r == max {
        (g - b) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    h /= 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    h
}

#[inline]
fn min_max(rgb: [f64; 3]) -> (f64, f64) {
    let [r, g, b] = rgb;
    (r.min(g).min(b), r.max(g).max(b))
}

/// RGB to hue, saturation, value.
pub fn rgb_to_hsv(rgb: [f64; 3]) -> [f64; 3] {
    let (min, max) = min_max(rgb);
    let delta = max - min;
    if delta == 0.0 {
        return [0.0, 0.0, max];
    }
    [hue(rgb, max, delta), delta / max, max]
}

/// Hue, saturation, value to RGB.
pub fn hsv_to_rgb(hsv: [f64; 3]) -> [f64; 3] {
    let [h, s, v] = hsv;
    if s == 0.0 {
        return [v; 3];
    }
    let h = h * 6.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i64 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        5 => [v, p, q],
        _ => [v; 3],
    }
}

/// Intensity: the mean of the largest and smallest components.
#[inline]
pub fn intensity(rgb: [f64; 3]) -> f64 {
    let (min, max) = min_max(rgb);
    0.5 * (min + max)
}

/// RGB to hue, saturation, intensity.
pub fn rgb_to_hsi(rgb: [f64; 3]) -> [f64; 3] {
    let (min, max) = min_max(rgb);
    let delta = max - min;
    let sum = min + max;
    let i = 0.5 * sum;
    if delta == 0.0 {
        return [0.0, 0.0, i];
    }
    let s = delta / if sum <= 1.0 { sum } else { 2.0 - sum };
    [hue(rgb, max, delta), s, i]
}

/// Hue, saturation, intensity to RGB.
pub fn hsi_to_rgb(hsi: [f64; 3]) -> [f64; 3] {
    let [h, s, i] = hsi;
    if s == 0.0 {
        return [i; 3];
    }
    let v2 = if i < 0.5 { i * (1.0 + s) } else { i + s - s * i };
    let v1 = 2.0 * i - v2;
    let channel = |mut h: f64| {
        if h < 0.0 {
            h += 1.0;
        } else if h > 1.0 {
            h -= 1.0;
        }
        if h < 1.0 / 6.0 {
            v1 + 6.0 * h * (v2 - v1)
        } else if h < 0.5 {
            v2
        } else if h < 2.0 / 3.0 {
            v1 + 6.0 * (2.0 / 3.0 - h) * (v2 - v1)
        } else {
            v1
        }
    };
    [channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0)]
}

// ============================================================================
// Conversion graph
// ============================================================================

const EDGES: [(ColorSpace, ColorSpace); 7] = [
    (ColorSpace::Rgb, ColorSpace::Hsv),
    (ColorSpace::Rgb, ColorSpace::Hsi),
    (ColorSpace::Rgb, ColorSpace::CieXyz),
    (ColorSpace::Rgb, ColorSpace::CieLab),
    (ColorSpace::Rgb, ColorSpace::CieLch),
    (ColorSpace::CieXyz, ColorSpace::CieLab),
    (ColorSpace::CieLab, ColorSpace::CieLch),
];

fn neighbors(cs: ColorSpace) -> impl Iterator<Item = ColorSpace> {
    EDGES.iter().filter_map(move |&(a, b)| {
        if a == cs {
            Some(b)
        } else if b == cs {
            Some(a)
        } else {
            None
        }
    })
}

/// Shortest chain of color spaces from `from` to `to`, both included.
///
/// Returns `None` when no chain exists, which is the case for every pair
/// involving grayscale (except a space with itself).
///
/// # Example
///
/// ```rust
/// use pxl_color::conversion_path;
/// use pxl_core::ColorSpace;
///
/// let path = conversion_path(ColorSpace::Hsv, ColorSpace::CieLab).unwrap();
/// assert_eq!(path, [ColorSpace::Hsv, ColorSpace::Rgb, ColorSpace::CieLab]);
/// assert!(conversion_path(ColorSpace::Gray, ColorSpace::Rgb).is_none());
/// ```
pub fn conversion_path(from: ColorSpace, to: ColorSpace) -> Option<Vec<ColorSpace>> {
    if from == to {
        return Some(vec![from]);
    }
    let mut previous: [Option<ColorSpace>; 7] = [None; 7];
    let mut queue = VecDeque::from([from]);
    previous[from.id() as usize] = Some(from);
    while let Some(cs) = queue.pop_front() {
        if cs == to {
            let mut path = vec![to];
            let mut at = to;
            while at != from {
                at = previous[at.id() as usize]?;
                path.push(at);
            }
            path.reverse();
            return Some(path);
        }
        for next in neighbors(cs) {
            let slot = &mut previous[next.id() as usize];
            if slot.is_none() {
                *slot = Some(cs);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Converts one triplet across a single edge of the graph.
fn step(system: &RgbColorSystem, from: ColorSpace, to: ColorSpace, px: [f64; 3]) -> Result<[f64; 3]> {
    use ColorSpace::*;
    Ok(match (from, to) {
        (Rgb, Hsv) => rgb_to_hsv(px),
        (Hsv, Rgb) => hsv_to_rgb(px),
        (Rgb, Hsi) => rgb_to_hsi(px),
        (Hsi, Rgb) => hsi_to_rgb(px),
        (Rgb, CieXyz) => system.rgb_to_xyz(px),
        (CieXyz, Rgb) => system.xyz_to_rgb(px),
        (Rgb, CieLab) => system.rgb_to_lab(px),
        (CieLab, Rgb) => system.lab_to_rgb(px),
        (Rgb, CieLch) => system.rgb_to_lch(px),
        (CieLch, Rgb) => system.lch_to_rgb(px),
        (CieXyz, CieLab) => system.xyz_to_lab(px),
        (CieLab, CieXyz) => system.lab_to_xyz(px),
        (CieLab, CieLch) => system.lab_to_lch(px),
        (CieLch, CieLab) => system.lch_to_lab(px),
        _ => return Err(Error::unsupported_conversion(from, to)),
    })
}

/// A resolved conversion between two color spaces of the RGB family.
#[derive(Debug, Clone)]
pub struct Conversion {
    path: Vec<ColorSpace>,
}

impl Conversion {
    /// Resolves the path from `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedConversion`] when no path exists.
    pub fn new(from: ColorSpace, to: ColorSpace) -> Result<Self> {
        let path = conversion_path(from, to).ok_or_else(|| Error::unsupported_conversion(from, to))?;
        Ok(Self { path })
    }

    /// Spaces visited, source and target included.
    pub fn path(&self) -> &[ColorSpace] {
        &self.path
    }

    /// Returns `true` when source and target are the same space.
    pub fn is_identity(&self) -> bool {
        self.path.len() == 1
    }

    /// Converts one triplet.
    pub fn apply(&self, system: &RgbColorSystem, px: [f64; 3]) -> Result<[f64; 3]> {
        self.path
            .windows(2)
            .try_fold(px, |px, edge| step(system, edge[0], edge[1], px))
    }
}

/// Converts one triplet from `from` to `to`.
pub fn convert_pixel(system: &RgbColorSystem, from: ColorSpace, to: ColorSpace, px: [f64; 3]) -> Result<[f64; 3]> {
    Conversion::new(from, to)?.apply(system, px)
}
