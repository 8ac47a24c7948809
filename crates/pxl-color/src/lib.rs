//! # pxl-color
//!
//! RGB color systems and color space conversion for pxl images.
//!
//! - [`RgbColorSystem`] - RGB/XYZ matrices, transfer function and CIE
//!   chrominance normalization built from an RGB working space
//! - [`convert`] - Per-pixel conversions and the color space graph
//! - [`set_color_space`] - In-place conversion of whole images
//! - [`lightness`], [`luminance`], [`intensity`] and their setters
//!
//! Components are normalized to `[0, 1]` in every space, including CIE
//! a*, b*, c* and hue.
//!
//! ## Example
//!
//! ```rust
//! use pxl_color::set_color_space;
//! use pxl_core::{ColorSpace, Image};
//!
//! let mut img = Image::<f32>::filled(4, 4, 1, ColorSpace::Gray, 0.5);
//! set_color_space(&mut img, ColorSpace::Hsv, None).unwrap();
//! assert_eq!(img.number_of_channels(), 3);
//! // Gray has no saturation.
//! assert_eq!(img.sample(0, 0, 1), Some(0.0));
//! ```
//!
//! ## Dependencies
//!
//! - [`pxl-core`] - Images and working space parameters
//! - [`glam`] - 3x3 matrix math
//! - [`rayon`] - Parallel row bands

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod convert;
pub mod image;
pub mod system;

pub use convert::{
    Conversion, conversion_path, convert_pixel, hsi_to_rgb, hsv_to_rgb, rgb_to_hsi, rgb_to_hsv,
};
pub use image::{intensity, lightness, luminance, set_color_space, set_intensity, set_lightness, set_luminance};
pub use system::{RgbColorSystem, cie_l_to_y, cie_y_to_l};
