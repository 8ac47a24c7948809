//! RGB color systems.
//!
//! An [`RgbColorSystem`] is built from an [`RgbWorkingSpace`]: it holds the
//! RGB to CIE XYZ matrix and its inverse, the transfer function, and the
//! offsets used to map CIE a*, b* and c* into `[0, 1]`.
//!
//! All components handled here are normalized:
//!
//! | space   | components | range |
//! |---------|------------|-------|
//! | RGB     | R, G, B    | `[0, 1]`, nonlinear unless gamma is 1 |
//! | CIE XYZ | X, Y, Z    | `[0, 1]`, X and Z scaled by the white point |
//! | CIE Lab | L*, a*, b* | `[0, 1]` |
//! | CIE Lch | L*, c*, h* | `[0, 1]`, h* as a fraction of a turn |
//!
//! # Example
//!
//! ```rust
//! use pxl_color::RgbColorSystem;
//! use pxl_core::RgbWorkingSpace;
//!
//! let cs = RgbColorSystem::new(&RgbWorkingSpace::SRGB_D50).unwrap();
//! let white = cs.rgb_to_xyz([1.0, 1.0, 1.0]);
//! assert!((white[1] - 1.0).abs() < 1e-9);
//! assert!((cs.lightness([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-9);
//! ```

use std::f64::consts::TAU;

use glam::{DMat3, DVec3};
use pxl_core::{Error, Result, RgbWorkingSpace};
use tracing::debug;

// ============================================================================
// CIE constants
// ============================================================================

/// CIE epsilon (216/24389).
pub const CIE_EPSILON: f64 = 216.0 / 24389.0;

/// CIE kappa / 116 (24389/27/116).
pub const CIE_KAPPA_116: f64 = 7.787037037037037;

const LAB_OFFSET: f64 = 16.0 / 116.0;

/// Lab companding of a normalized X, Y or Z component.
#[inline]
pub fn xyz_lab(v: f64) -> f64 {
    if v > CIE_EPSILON {
        v.cbrt()
    } else {
        CIE_KAPPA_116 * v + LAB_OFFSET
    }
}

/// Inverse of [`xyz_lab`].
#[inline]
pub fn lab_xyz(v: f64) -> f64 {
    let cube = v * v * v;
    if cube > CIE_EPSILON {
        cube
    } else {
        (v - LAB_OFFSET) / CIE_KAPPA_116
    }
}

#[inline]
fn range(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[inline]
fn insignificant(v: f64) -> bool {
    1.0 + v == 1.0
}

// ============================================================================
// RgbColorSystem
// ============================================================================

/// Colorimetric description of an RGB working space.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbColorSystem {
    working_space: RgbWorkingSpace,
    luminance: [f64; 3],
    linear: bool,
    to_xyz: DMat3,
    from_xyz: DMat3,
    mx: f64,
    mz: f64,
    ab_offset: f64,
    ab_delta: f64,
    c_delta: f64,
}

impl RgbColorSystem {
    /// Builds a color system from working space parameters.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWorkingSpace`] when a chromaticity coordinate is
    /// insignificant, the luminance coefficients add up to nothing, the
    /// primaries are collinear or the gamma is not positive.
    pub fn new(ws: &RgbWorkingSpace) -> Result<Self> {
        if ws.x.iter().chain(&ws.y).any(|&v| insignificant(v)) {
            return Err(Error::InvalidWorkingSpace("insignificant chromaticity coordinate".into()));
        }
        let total: f64 = ws.luminance.iter().sum();
        if insignificant(total) {
            return Err(Error::InvalidWorkingSpace("insignificant luminance coefficients".into()));
        }
        if !ws.srgb && (ws.gamma <= 0.0 || insignificant(ws.gamma)) {
            return Err(Error::InvalidWorkingSpace(format!("invalid gamma {}", ws.gamma)));
        }
        let luminance = ws.luminance.map(|v| v / total);

        // Columns are the XYZ of each primary at its luminance.
        let column = |i: usize| {
            let (x, y, l) = (ws.x[i], ws.y[i], luminance[i]);
            DVec3::new(l * x / y, l, l * (1.0 - x - y) / y)
        };
        let to_xyz = DMat3::from_cols(column(0), column(1), column(2));
        if insignificant(to_xyz.determinant()) {
            return Err(Error::InvalidWorkingSpace("singular RGB to XYZ matrix".into()));
        }
        let from_xyz = to_xyz.inverse();
        let row0 = to_xyz.row(0);
        let row2 = to_xyz.row(2);

        let mut system = Self {
            working_space: *ws,
            luminance,
            linear: ws.is_linear(),
            to_xyz,
            from_xyz,
            mx: row0.x + row0.y + row0.z,
            mz: row2.x + row2.y + row2.z,
            ab_offset: 0.0,
            ab_delta: 1.0,
            c_delta: 1.0,
        };
        system.init_chrominance_ranges();
        debug!(
            gamma = ws.gamma,
            srgb = ws.srgb,
            ab_offset = system.ab_offset,
            ab_delta = system.ab_delta,
            c_delta = system.c_delta,
            "RGB color system"
        );
        Ok(system)
    }

    /// The working space this system was built from.
    pub fn working_space(&self) -> &RgbWorkingSpace {
        &self.working_space
    }

    /// Normalized luminance coefficients.
    pub fn luminance_coefficients(&self) -> [f64; 3] {
        self.luminance
    }

    /// Returns `true` when the transfer function is the identity.
    pub fn is_linear(&self) -> bool {
        self.linear
    }

    /// RGB to XYZ matrix for linear components.
    pub fn rgb_to_xyz_matrix(&self) -> DMat3 {
        self.to_xyz
    }

    /// XYZ to RGB matrix for linear components.
    pub fn xyz_to_rgb_matrix(&self) -> DMat3 {
        self.from_xyz
    }

    /// Offset and scale mapping CIE a* and b* into `[0, 1]`.
    pub fn ab_normalization(&self) -> (f64, f64) {
        (self.ab_offset, self.ab_delta)
    }

    /// Scale mapping CIE c* into `[0, 1]`.
    pub fn c_normalization(&self) -> f64 {
        self.c_delta
    }

    // ------------------------------------------------------------------------
    // Transfer function
    // ------------------------------------------------------------------------

    /// Nonlinear to linear component.
    #[inline]
    pub fn linear_component(&self, v: f64) -> f64 {
        if self.working_space.srgb {
            if v > 0.04045 { ((v + 0.055) / 1.055).powf(2.4) } else { v / 12.92 }
        } else if self.linear {
            v
        } else {
            v.powf(self.working_space.gamma)
        }
    }

    /// Linear to nonlinear component.
    #[inline]
    pub fn gamma_component(&self, v: f64) -> f64 {
        if self.working_space.srgb {
            if v > 0.0031308 { 1.055 * v.powf(1.0 / 2.4) - 0.055 } else { 12.92 * v }
        } else if self.linear {
            v
        } else {
            v.powf(1.0 / self.working_space.gamma)
        }
    }

    #[inline]
    fn linear_rgb(&self, rgb: [f64; 3]) -> DVec3 {
        DVec3::from_array(rgb.map(|v| self.linear_component(v)))
    }

    // ------------------------------------------------------------------------
    // CIE XYZ
    // ------------------------------------------------------------------------

    /// RGB to normalized CIE XYZ.
    pub fn rgb_to_xyz(&self, rgb: [f64; 3]) -> [f64; 3] {
        let xyz = self.to_xyz * self.linear_rgb(rgb);
        [range(xyz.x / self.mx), range(xyz.y), range(xyz.z / self.mz)]
    }

    /// Normalized CIE XYZ to RGB.
    pub fn xyz_to_rgb(&self, xyz: [f64; 3]) -> [f64; 3] {
        let v = DVec3::new(xyz[0] * self.mx, xyz[1], xyz[2] * self.mz);
        let rgb = self.from_xyz * v;
        rgb.to_array().map(|c| self.gamma_component(range(c)))
    }

    /// CIE Y of an RGB triplet.
    pub fn luminance(&self, rgb: [f64; 3]) -> f64 {
        range(self.to_xyz.row(1).dot(self.linear_rgb(rgb)))
    }

    /// CIE L* of an RGB triplet.
    pub fn lightness(&self, rgb: [f64; 3]) -> f64 {
        cie_y_to_l(self.luminance(rgb))
    }

    // ------------------------------------------------------------------------
    // CIE L*a*b* and L*c*h*
    // ------------------------------------------------------------------------

    /// Normalized CIE XYZ to normalized CIE L*a*b*.
    pub fn xyz_to_lab(&self, xyz: [f64; 3]) -> [f64; 3] {
        let [fx, fy, fz] = xyz.map(xyz_lab);
        [
            1.16 * fy - 0.16,
            (5.0 * (fx - fy) + self.ab_offset) / self.ab_delta,
            (2.0 * (fy - fz) + self.ab_offset) / self.ab_delta,
        ]
    }

    /// Normalized CIE L*a*b* to normalized CIE XYZ.
    pub fn lab_to_xyz(&self, lab: [f64; 3]) -> [f64; 3] {
        let fy = (lab[0] + 0.16) / 1.16;
        let fx = (self.ab_delta * lab[1] - self.ab_offset) / 5.0 + fy;
        let fz = fy - (self.ab_delta * lab[2] - self.ab_offset) / 2.0;
        [lab_xyz(fx), lab_xyz(fy), lab_xyz(fz)]
    }

    /// Normalized CIE L*a*b* to normalized CIE L*c*h*.
    pub fn lab_to_lch(&self, lab: [f64; 3]) -> [f64; 3] {
        let a = self.ab_delta * lab[1] - self.ab_offset;
        let b = self.ab_delta * lab[2] - self.ab_offset;
        let (c, h) = self.chroma_hue(a, b);
        [lab[0], c, h]
    }

    /// Normalized CIE L*c*h* to normalized CIE L*a*b*.
    pub fn lch_to_lab(&self, lch: [f64; 3]) -> [f64; 3] {
        let c = lch[1] * self.c_delta;
        let (sin, cos) = (TAU * lch[2]).sin_cos();
        [
            lch[0],
            (c * cos + self.ab_offset) / self.ab_delta,
            (c * sin + self.ab_offset) / self.ab_delta,
        ]
    }

    /// RGB to normalized CIE L*a*b*.
    pub fn rgb_to_lab(&self, rgb: [f64; 3]) -> [f64; 3] {
        self.xyz_to_lab(self.rgb_to_xyz(rgb))
    }

    /// Normalized CIE L*a*b* to RGB.
    pub fn lab_to_rgb(&self, lab: [f64; 3]) -> [f64; 3] {
        self.xyz_to_rgb(self.lab_to_xyz(lab))
    }

    /// RGB to normalized CIE L*c*h*.
    pub fn rgb_to_lch(&self, rgb: [f64; 3]) -> [f64; 3] {
        let [fx, fy, fz] = self.rgb_to_xyz(rgb).map(xyz_lab);
        let (c, h) = self.chroma_hue(5.0 * (fx - fy), 2.0 * (fy - fz));
        [1.16 * fy - 0.16, c, h]
    }

    /// Normalized CIE L*c*h* to RGB.
    pub fn lch_to_rgb(&self, lch: [f64; 3]) -> [f64; 3] {
        self.lab_to_rgb(self.lch_to_lab(lch))
    }

    /// Normalized c* and h* from raw a* and b*.
    fn chroma_hue(&self, a: f64, b: f64) -> (f64, f64) {
        let c = (a * a + b * b).sqrt() / self.c_delta;
        let mut h = b.atan2(a);
        if h < 0.0 {
            h += TAU;
        }
        (c, h / TAU)
    }

    /// Raw (a*, b*, c*) of an RGB triplet.
    fn raw_abc(&self, r: f64, g: f64, b: f64) -> (f64, f64, f64) {
        let [fx, fy, fz] = self.rgb_to_xyz([r, g, b]).map(xyz_lab);
        let a = 5.0 * (fx - fy);
        let b = 2.0 * (fy - fz);
        (a, b, (a * a + b * b).sqrt())
    }

    /// Finds the extremes of a*, b* and c* over the RGB cube: a coarse 10^3
    /// grid, then a 0.01 step search around each extreme.
    fn init_chrominance_ranges(&mut self) {
        let mut min_ab = 100.0;
        let mut max_ab = -100.0;
        let mut max_c = -100.0;
        let mut at_min = [0usize; 3];
        let mut at_max = [0usize; 3];
        let mut at_max_c = [0usize; 3];

        for ri in 0..10 {
            for gi in 0..10 {
                for bi in 0..10 {
                    let (a, b, c) = self.raw_abc(ri as f64 / 9.0, gi as f64 / 9.0, bi as f64 / 9.0);
                    if a.min(b) < min_ab {
                        min_ab = a.min(b);
                        at_min = [ri, gi, bi];
                    }
                    if a.max(b) > max_ab {
                        max_ab = a.max(b);
                        at_max = [ri, gi, bi];
                    }
                    if c > max_c {
                        max_c = c;
                        at_max_c = [ri, gi, bi];
                    }
                }
            }
        }

        self.refine(at_min, |a, b, _| {
            min_ab = f64::min(min_ab, a.min(b));
        });
        self.refine(at_max, |a, b, _| {
            max_ab = f64::max(max_ab, a.max(b));
        });
        self.refine(at_max_c, |_, _, c| {
            max_c = f64::max(max_c, c);
        });

        self.ab_offset = -min_ab + 0.05;
        self.ab_delta = max_ab - min_ab + 0.1;
        self.c_delta = max_c + 0.05;
    }

    fn refine(&self, cell: [usize; 3], mut visit: impl FnMut(f64, f64, f64)) {
        let bounds = cell.map(|i| (i.saturating_sub(1) as f64 / 9.0, (i + 1).min(9) as f64 / 9.0));
        let steps = |(lo, hi): (f64, f64)| {
            let n = ((hi - lo) / 0.01).ceil() as usize;
            (0..n).map(move |k| lo + k as f64 * 0.01).filter(move |&v| v < hi)
        };
        for r in steps(bounds[0]) {
            for g in steps(bounds[1]) {
                for b in steps(bounds[2]) {
                    let (a, bb, c) = self.raw_abc(r, g, b);
                    visit(a, bb, c);
                }
            }
        }
    }
}

/// CIE L* from CIE Y.
#[inline]
pub fn cie_y_to_l(y: f64) -> f64 {
    1.16 * xyz_lab(y) - 0.16
}

/// CIE Y from CIE L*.
#[inline]
pub fn cie_l_to_y(l: f64) -> f64 {
    lab_xyz((l + 0.16) / 1.16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn srgb() -> RgbColorSystem {
        RgbColorSystem::new(&RgbWorkingSpace::SRGB_D50).unwrap()
    }

    #[test]
    fn test_luminance_coefficients_normalized() {
        let ws = RgbWorkingSpace {
            luminance: [2.0, 6.0, 2.0],
            ..RgbWorkingSpace::SRGB_D50
        };
        let cs = RgbColorSystem::new(&ws).unwrap();
        assert_relative_eq!(cs.luminance_coefficients()[1], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_working_spaces() {
        let bad_x = RgbWorkingSpace {
            x: [0.0, 0.3, 0.15],
            ..RgbWorkingSpace::SRGB_D50
        };
        assert!(matches!(RgbColorSystem::new(&bad_x), Err(Error::InvalidWorkingSpace(_))));

        let bad_y = RgbWorkingSpace {
            luminance: [0.0; 3],
            ..RgbWorkingSpace::SRGB_D50
        };
        assert!(RgbColorSystem::new(&bad_y).is_err());

        let bad_gamma = RgbWorkingSpace {
            gamma: -1.0,
            srgb: false,
            ..RgbWorkingSpace::SRGB_D50
        };
        assert!(RgbColorSystem::new(&bad_gamma).is_err());

        let collinear = RgbWorkingSpace {
            x: [0.3, 0.3, 0.3],
            y: [0.3, 0.3, 0.3],
            ..RgbWorkingSpace::SRGB_D50
        };
        assert!(RgbColorSystem::new(&collinear).is_err());
    }

    #[test]
    fn test_matrix_inverse() {
        let cs = srgb();
        let id = cs.rgb_to_xyz_matrix() * cs.xyz_to_rgb_matrix();
        assert!(id.abs_diff_eq(DMat3::IDENTITY, 1e-12));
    }

    #[test]
    fn test_transfer_function_round_trip() {
        let cs = srgb();
        for v in [0.0, 0.002, 0.04, 0.2, 0.5, 1.0] {
            assert_relative_eq!(cs.gamma_component(cs.linear_component(v)), v, epsilon = 1e-12);
        }
        assert_relative_eq!(cs.linear_component(0.5), 0.214041140, epsilon = 1e-8);

        let g22 = RgbColorSystem::new(&RgbWorkingSpace::ADOBE_RGB_D50).unwrap();
        assert_relative_eq!(g22.linear_component(0.5), 0.5f64.powf(2.2), epsilon = 1e-12);

        let lin = RgbColorSystem::new(&RgbWorkingSpace::linear_srgb()).unwrap();
        assert!(lin.is_linear());
        assert_eq!(lin.linear_component(0.3), 0.3);
    }

    #[test]
    fn test_white_and_black() {
        let cs = srgb();
        let white = cs.rgb_to_xyz([1.0; 3]);
        for v in white {
            assert_relative_eq!(v, 1.0, epsilon = 1e-9);
        }
        assert_eq!(cs.rgb_to_xyz([0.0; 3]), [0.0; 3]);
        assert_relative_eq!(cs.lightness([1.0; 3]), 1.0, epsilon = 1e-9);
        assert_relative_eq!(cs.lightness([0.0; 3]), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_xyz_round_trip() {
        let cs = srgb();
        for rgb in [[0.2, 0.5, 0.8], [0.9, 0.1, 0.3], [0.5, 0.5, 0.5]] {
            let back = cs.xyz_to_rgb(cs.rgb_to_xyz(rgb));
            for i in 0..3 {
                assert_relative_eq!(back[i], rgb[i], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_lab_and_lch_round_trip() {
        let cs = srgb();
        for rgb in [[0.2, 0.5, 0.8], [0.9, 0.1, 0.3], [0.05, 0.6, 0.1]] {
            let lab = cs.rgb_to_lab(rgb);
            for v in lab {
                assert!((0.0..=1.0).contains(&v), "{lab:?}");
            }
            let back = cs.lab_to_rgb(lab);
            let lch = cs.rgb_to_lch(rgb);
            let via_lab = cs.lab_to_lch(lab);
            let back_lch = cs.lch_to_rgb(lch);
            for i in 0..3 {
                assert_relative_eq!(back[i], rgb[i], epsilon = 1e-7);
                assert_relative_eq!(lch[i], via_lab[i], epsilon = 1e-9);
                assert_relative_eq!(back_lch[i], rgb[i], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_neutral_has_no_chroma() {
        let cs = srgb();
        let lch = cs.rgb_to_lch([0.4; 3]);
        assert!(lch[1] < 1e-6);
        let (offset, delta) = cs.ab_normalization();
        let lab = cs.rgb_to_lab([0.4; 3]);
        assert_relative_eq!(lab[1], offset / delta, epsilon = 1e-6);
        assert!(cs.c_normalization() > 0.0);
    }

    #[test]
    fn test_l_y_inverse() {
        for y in [0.001, 0.2, 0.8, 1.0] {
            assert_relative_eq!(cie_l_to_y(cie_y_to_l(y)), y, epsilon = 1e-12);
        }
    }
}
