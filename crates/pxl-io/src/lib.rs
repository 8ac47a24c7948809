//! # pxl-io
//!
//! Byte-level interfaces of pxl images.
//!
//! - [`raw`] - Raw streams: a 16 byte header and one block per channel
//! - [`compression`] - Sub-block plumbing for injected compression codecs
//!
//! Errors are reported as [`IoError`], which wraps [`std::io::Error`] and
//! [`pxl_core::Error`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use pxl_core::{ColorSpace, Image};
//! use pxl_io::raw::{read_raw_file, write_raw_file};
//!
//! let img = Image::<f32>::filled(64, 64, 3, ColorSpace::Rgb, 0.5);
//! write_raw_file(&img, "image.raw")?;
//! let back: Image<f32> = read_raw_file("image.raw")?;
//! assert_eq!(back.width(), 64);
//! # Ok::<(), pxl_io::IoError>(())
//! ```

#![warn(missing_docs)]

pub mod compression;
pub mod error;
pub mod raw;

pub use compression::{Compression, CompressedSubblock, compress_channel, decompress_channel};
pub use error::{IoError, IoResult};
pub use raw::{RawHeader, read_raw, read_raw_file, write_raw, write_raw_file};
