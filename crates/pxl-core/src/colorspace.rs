//! Color space identifiers and RGB working space parameters.
//!
//! An image's [`ColorSpace`] tells how its *nominal* channels are
//! interpreted. Channels beyond the nominal ones are alpha channels.
//!
//! | color space | nominal channels | id |
//! |-------------|------------------|----|
//! | Gray        | 1                | 0  |
//! | RGB         | 3                | 1  |
//! | CIEXYZ      | 3                | 2  |
//! | CIELab      | 3                | 3  |
//! | CIELch      | 3                | 4  |
//! | HSV         | 3                | 5  |
//! | HSI         | 3                | 6  |
//!
//! The numeric id is what the raw stream stores in its header.
//!
//! [`RgbWorkingSpace`] carries the chromaticity coordinates, luminance
//! coefficients and transfer function that define the reference RGB color
//! system of an image. The conversion math lives in `pxl-color`; this crate
//! only stores the parameters so that images can carry them around.

use std::fmt;

/// The color space of an image's nominal channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpace {
    /// Single-channel grayscale.
    #[default]
    Gray,
    /// RGB in the image's working space.
    Rgb,
    /// CIE XYZ, normalized to `[0, 1]`.
    CieXyz,
    /// CIE L*a*b*, normalized to `[0, 1]`.
    CieLab,
    /// CIE L*c*h*, normalized to `[0, 1]` (hue as a fraction of a turn).
    CieLch,
    /// Hue, saturation, value.
    Hsv,
    /// Hue, saturation, intensity.
    Hsi,
}

impl ColorSpace {
    /// Every color space, in id order.
    pub const ALL: [ColorSpace; 7] = [
        ColorSpace::Gray,
        ColorSpace::Rgb,
        ColorSpace::CieXyz,
        ColorSpace::CieLab,
        ColorSpace::CieLch,
        ColorSpace::Hsv,
        ColorSpace::Hsi,
    ];

    /// Number of nominal channels.
    pub const fn nominal_channels(self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            _ => 3,
        }
    }

    /// Returns `true` for every color space except grayscale.
    pub const fn is_color(self) -> bool {
        !matches!(self, ColorSpace::Gray)
    }

    /// Stable numeric id.
    pub const fn id(self) -> u32 {
        match self {
            ColorSpace::Gray => 0,
            ColorSpace::Rgb => 1,
            ColorSpace::CieXyz => 2,
            ColorSpace::CieLab => 3,
            ColorSpace::CieLch => 4,
            ColorSpace::Hsv => 5,
            ColorSpace::Hsi => 6,
        }
    }

    /// Looks up a color space by id.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cs| cs.id() == id)
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "Grayscale",
            ColorSpace::Rgb => "RGB",
            ColorSpace::CieXyz => "CIE XYZ",
            ColorSpace::CieLab => "CIE L*a*b*",
            ColorSpace::CieLch => "CIE L*c*h*",
            ColorSpace::Hsv => "HSV",
            ColorSpace::Hsi => "HSI",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of an RGB working space.
///
/// Chromaticities are CIE xy coordinates of the red, green and blue
/// primaries referred to D50. Luminance coefficients need not be
/// normalized; the color system normalizes them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RgbWorkingSpace {
    /// Gamma exponent, used when `srgb` is false.
    pub gamma: f64,
    /// Use the sRGB transfer function instead of a pure power law.
    pub srgb: bool,
    /// x chromaticity of R, G, B.
    pub x: [f64; 3],
    /// y chromaticity of R, G, B.
    pub y: [f64; 3],
    /// Luminance coefficients of R, G, B.
    pub luminance: [f64; 3],
}

impl RgbWorkingSpace {
    /// sRGB primaries adapted to D50, sRGB transfer function.
    pub const SRGB_D50: RgbWorkingSpace = RgbWorkingSpace {
        gamma: 2.2,
        srgb: true,
        x: [0.648431, 0.321152, 0.155886],
        y: [0.330856, 0.597871, 0.066044],
        luminance: [0.222491, 0.716888, 0.060621],
    };

    /// Adobe RGB (1998) primaries adapted to D50, gamma 2.2.
    pub const ADOBE_RGB_D50: RgbWorkingSpace = RgbWorkingSpace {
        gamma: 2.2,
        srgb: false,
        x: [0.648431, 0.230154, 0.155886],
        y: [0.330856, 0.701572, 0.066044],
        luminance: [0.311114, 0.625662, 0.063224],
    };

    /// A working space with linear (gamma 1) transfer and sRGB primaries.
    pub fn linear_srgb() -> Self {
        Self {
            gamma: 1.0,
            srgb: false,
            ..Self::SRGB_D50
        }
    }

    /// Returns `true` for a linear transfer function.
    pub fn is_linear(&self) -> bool {
        !self.srgb && self.gamma == 1.0
    }
}

impl Default for RgbWorkingSpace {
    fn default() -> Self {
        Self::SRGB_D50
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for cs in ColorSpace::ALL {
            assert_eq!(ColorSpace::from_id(cs.id()), Some(cs));
        }
        assert_eq!(ColorSpace::from_id(42), None);
    }

    #[test]
    fn test_nominal_channels() {
        assert_eq!(ColorSpace::Gray.nominal_channels(), 1);
        assert_eq!(ColorSpace::CieLch.nominal_channels(), 3);
        assert!(!ColorSpace::Gray.is_color());
        assert!(ColorSpace::Hsi.is_color());
    }

    #[test]
    fn test_default_working_space() {
        let ws = RgbWorkingSpace::default();
        assert!(ws.srgb);
        assert!(!ws.is_linear());
        assert!(RgbWorkingSpace::linear_srgb().is_linear());
    }
}
