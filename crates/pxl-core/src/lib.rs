//! # pxl-core
//!
//! Copy-on-write multi-channel pixel buffers.
//!
//! This crate provides the foundation of the pxl workspace:
//!
//! - [`Sample`] - Sample types (`u8`, `u16`, `u32`, `f32`, `f64`, complex)
//! - [`Image`] - Thin copy-on-write handle to a shared [`PixelBuffer`]
//! - [`Selection`], [`Scope`] - Rectangle, channel range and clipping state
//! - [`SampleCursor`], [`PixelCursor`] - Position-aware iterators
//! - [`ImageOp`] - Arithmetic, bitwise and composition operators
//! - [`parallel`] - Row-band partitioning for parallel work
//!
//! ## Crate Structure
//!
//! ```text
//! pxl-core (this crate)
//!    ^
//!    |
//!    +-- pxl-stats (reductions, robust estimators)
//!    +-- pxl-color (color space conversion)
//!    +-- pxl-io (raw streams, compression sub-blocks)
//! ```
//!
//! ## Copy-on-write
//!
//! ```rust
//! use pxl_core::prelude::*;
//!
//! let a = Image::<u16>::filled(8, 8, 3, ColorSpace::Rgb, 1000);
//! let mut b = a.clone();
//! b.add(0.5).unwrap();
//! assert_eq!(a.sample(0, 0, 0), Some(1000));
//! assert_ne!(b.sample(0, 0, 0), Some(1000));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Serialization for configuration, geometry and operator types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod arithmetic;
pub mod blend;
pub mod colorspace;
pub mod config;
pub mod error;
pub mod image;
pub mod iter;
pub mod op;
pub mod parallel;
pub mod rect;
pub mod sample;
pub mod selection;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use arithmetic::Operand;
pub use blend::{BlendSurface, Rgba32Surface};
pub use colorspace::{ColorSpace, RgbWorkingSpace};
pub use config::{DEFAULT_OVERHEAD_LIMIT_PX, ProcessingConfig};
pub use error::{Error, Result};
pub use image::{Image, PixelBuffer, PixelValue};
pub use iter::{
    Filter, Full, NoFilter, PixelCursor, PixelIter, PixelIterMut, Predicate, RectSpan, RoiPixelIter,
    RoiPixelIterMut, RoiSampleIter, RoiSampleIterMut, SampleAccess, SampleCursor, SampleIter,
    SampleIterMut, Span,
};
pub use op::{EPSILON, ImageOp};
pub use parallel::Progress;
pub use rect::{Point, Rect};
pub use sample::{Complex32, Complex64, Sample, SampleType};
pub use selection::{ParsedSelection, Scope, Selection};
pub use storage::{ExternalPlanes, ExternalStorage, HostPlanes, LocalStorage, PixelStorage};
pub use transform::{BidirectionalTransformation, ImageTransformation};

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use pxl_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::colorspace::{ColorSpace, RgbWorkingSpace};
    pub use crate::error::{Error, Result};
    pub use crate::image::Image;
    pub use crate::op::ImageOp;
    pub use crate::rect::{Point, Rect};
    pub use crate::sample::{Sample, SampleType};
    pub use crate::selection::Scope;
}
