//! Error types for raw streams and compression.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// Stream I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed raw stream header.
    #[error("bad header: {0}")]
    BadHeader(String),

    /// The header names a color space id that does not exist.
    #[error("unknown color space id {0}")]
    UnknownColorSpace(u32),

    /// Error from the pixel buffer engine.
    #[error(transparent)]
    Core(#[from] pxl_core::Error),

    /// The compression collaborator failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// A sub-block's checksum does not match its data.
    #[error("sub-block {index} checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Sub-block index.
        index: usize,
        /// Stored checksum.
        expected: u64,
        /// Checksum of the data.
        actual: u64,
    },

    /// Byte count mismatch between a region and its data.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
}

impl IoError {
    /// Creates an [`IoError::BadHeader`] error.
    pub fn bad_header(msg: impl Into<String>) -> Self {
        Self::BadHeader(msg.into())
    }

    /// Creates an [`IoError::Compression`] error.
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
