//! # pxl-stats
//!
//! Parallel, numerically stable statistics for pxl images.
//!
//! - [`estimators`] - Slice-level estimators (compensated sums, medians,
//!   Sn/Qn, midvariances)
//! - [`reduce`] - Reductions over an image selection, partitioned into row
//!   bands and combined deterministically
//! - [`ImageStatistics`] - Every statistic of a selection in one pass
//!
//! ## Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image, Scope};
//! use pxl_stats::{ImageStatistics, StatisticsOptions};
//!
//! let img = Image::<f32>::filled(16, 16, 1, ColorSpace::Gray, 0.5);
//! let stats = ImageStatistics::compute(&img, &Scope::new(), &StatisticsOptions::default());
//! assert_eq!(stats.count, 256);
//! assert_eq!(stats.median, 0.5);
//! assert_eq!(stats.variance, 0.0);
//! ```

#![warn(missing_docs)]

pub mod estimators;
pub mod reduce;
pub mod statistics;

pub use estimators::StableSum;
pub use reduce::Located;
pub use statistics::{ImageStatistics, StatisticsOptions};
