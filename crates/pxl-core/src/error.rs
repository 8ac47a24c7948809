//! Error types for pxl-core operations.
//!
//! # Overview
//!
//! The [`Error`] enum covers the failure modes of the pixel buffer engine:
//! - Ownership transfer preconditions ([`Error::NotUnique`], [`Error::ExternalStorage`])
//! - Arithmetic misuse ([`Error::DivisionByZero`])
//! - Allocation failures ([`Error::AllocationFailed`]), raised after rollback
//! - Geometry and channel errors
//! - Color space conversions with no defined path
//!
//! Benign edge cases (empty selections, out-of-range single pixel accessors)
//! are never errors; they yield `None`, empty results or no-ops.
//!
//! # Usage
//!
//! ```rust
//! use pxl_core::{Error, Result};
//!
//! fn checked_divisor(value: f64) -> Result<f64> {
//!     if value.abs() < f64::EPSILON {
//!         return Err(Error::DivisionByZero);
//!     }
//!     Ok(value)
//! }
//! assert!(checked_divisor(0.0).is_err());
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during pixel buffer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The pixel buffer is shared by more than one image handle.
    ///
    /// Returned by ownership transfers (`release`, `import`) that would make
    /// data visible to, or take it away from, other handles.
    #[error("{operation}: pixel buffer is referenced by {references} images")]
    NotUnique {
        /// Operation that was rejected
        operation: &'static str,
        /// Current reference count
        references: usize,
    },

    /// The operation is not available on externally backed storage.
    #[error("{operation}: not supported on externally backed storage")]
    ExternalStorage {
        /// Operation that was rejected
        operation: &'static str,
    },

    /// A whole-operation scalar division by zero or an insignificant value.
    #[error("division by zero")]
    DivisionByZero,

    /// Memory allocation failed. The image keeps its previous state.
    #[error("failed to allocate {requested} samples: {reason}")]
    AllocationFailed {
        /// Samples requested
        requested: usize,
        /// Failure reason
        reason: String,
    },

    /// Invalid image or plane dimensions.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Channel index does not exist in the image.
    #[error("channel {channel} out of range for image with {channels} channels")]
    ChannelOutOfRange {
        /// Requested channel
        channel: usize,
        /// Number of channels in the image
        channels: usize,
    },

    /// RGB working space parameters do not describe a valid color system.
    #[error("invalid RGB working space: {0}")]
    InvalidWorkingSpace(String),

    /// There is no defined conversion path between two color spaces.
    #[error("unsupported color space conversion: {from} -> {to}")]
    UnsupportedConversion {
        /// Source color space
        from: String,
        /// Target color space
        to: String,
    },

    /// I/O error while talking to a collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::NotUnique`] error.
    #[inline]
    pub fn not_unique(operation: &'static str, references: usize) -> Self {
        Self::NotUnique {
            operation,
            references,
        }
    }

    /// Creates an [`Error::AllocationFailed`] error.
    #[inline]
    pub fn allocation_failed(requested: usize, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            requested,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ChannelOutOfRange`] error.
    #[inline]
    pub fn channel_out_of_range(channel: usize, channels: usize) -> Self {
        Self::ChannelOutOfRange { channel, channels }
    }

    /// Creates an [`Error::UnsupportedConversion`] error.
    #[inline]
    pub fn unsupported_conversion(from: impl ToString, to: impl ToString) -> Self {
        Self::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` for ownership precondition violations.
    #[inline]
    pub fn is_ownership_error(&self) -> bool {
        matches!(self, Self::NotUnique { .. } | Self::ExternalStorage { .. })
    }

    /// Returns `true` if this is an allocation error.
    #[inline]
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}
