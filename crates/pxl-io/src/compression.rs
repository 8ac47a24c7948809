//! Compression sub-block plumbing.
//!
//! The pixel buffer engine does not implement codecs. A codec is injected
//! as a [`Compression`] object; this module splits the bytes of an image
//! region into sub-blocks, hands each one to the codec in parallel and
//! collects the results as [`CompressedSubblock`]s.
//!
//! A sub-block smaller than [`Compression::min_block_size`], or one the
//! codec cannot shrink, is stored uncompressed. Such a sub-block is
//! recognized on decompression by its data length being equal to its
//! uncompressed size.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image};
//! use pxl_io::compression::{Compression, compress_channel, decompress_channel};
//! use pxl_io::IoResult;
//!
//! /// Stores everything as-is.
//! struct Store;
//!
//! impl Compression for Store {
//!     fn name(&self) -> &str { "store" }
//!     fn min_block_size(&self) -> usize { 1 }
//!     fn max_block_size(&self) -> usize { 1 << 20 }
//!     fn compress(&self, data: &[u8]) -> IoResult<Vec<u8>> { Ok(data.to_vec()) }
//!     fn decompress(&self, data: &[u8], _: usize) -> IoResult<Vec<u8>> { Ok(data.to_vec()) }
//! }
//!
//! let src = Image::<u8>::filled(8, 8, 1, ColorSpace::Gray, 42);
//! let blocks = compress_channel(&src, &Store, 0, None, Some(16)).unwrap();
//! assert_eq!(blocks.len(), 4);
//!
//! let mut dst = Image::<u8>::new(8, 8, ColorSpace::Gray);
//! decompress_channel(&mut dst, &Store, &blocks, 0, None).unwrap();
//! assert_eq!(dst.sample(7, 7, 0), Some(42));
//! ```

use pxl_core::{Error, Image, Rect, Sample, Scope};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{IoError, IoResult};

// ============================================================================
// Collaborator interface
// ============================================================================

/// A byte-stream compression codec.
pub trait Compression: Sync {
    /// Codec name, for diagnostics.
    fn name(&self) -> &str;

    /// Smallest sub-block worth compressing.
    fn min_block_size(&self) -> usize {
        64
    }

    /// Largest sub-block the codec accepts.
    fn max_block_size(&self) -> usize;

    /// Compresses one sub-block.
    fn compress(&self, data: &[u8]) -> IoResult<Vec<u8>>;

    /// Decompresses one sub-block of `uncompressed_size` bytes.
    fn decompress(&self, data: &[u8], uncompressed_size: usize) -> IoResult<Vec<u8>>;

    /// 64-bit checksum of compressed data, or `None` when the codec does not
    /// use checksums.
    fn checksum(&self, _data: &[u8]) -> Option<u64> {
        None
    }
}

/// One compressed sub-block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressedSubblock {
    /// Compressed bytes, or the original bytes if stored uncompressed.
    pub data: Vec<u8>,
    /// Size of the sub-block before compression.
    pub uncompressed_size: usize,
    /// Checksum of `data`; zero when not computed.
    pub checksum: u64,
}

impl CompressedSubblock {
    /// Returns `true` if the sub-block holds uncompressed bytes.
    pub fn is_stored(&self) -> bool {
        self.data.len() == self.uncompressed_size
    }
}

/// Total uncompressed size of `subblocks`.
pub fn uncompressed_size(subblocks: &[CompressedSubblock]) -> usize {
    subblocks.iter().map(|s| s.uncompressed_size).sum()
}

/// Total compressed size of `subblocks`.
pub fn compressed_size(subblocks: &[CompressedSubblock]) -> usize {
    subblocks.iter().map(|s| s.data.len()).sum()
}

// ============================================================================
// Byte streams
// ============================================================================

/// Effective sub-block size: the requested size if the codec accepts it,
/// the codec's maximum otherwise.
fn block_size<C: Compression + ?Sized>(codec: &C, requested: Option<usize>) -> usize {
    let max = codec.max_block_size().max(1);
    match requested {
        Some(n) if n >= codec.min_block_size().min(max) && n > 0 && n <= max => n,
        _ => max,
    }
}

/// Compresses `data` in sub-blocks of at most `max_block_size` bytes.
pub fn compress<C: Compression + ?Sized>(
    codec: &C,
    data: &[u8],
    max_block_size: Option<usize>,
) -> IoResult<Vec<CompressedSubblock>> {
    let size = block_size(codec, max_block_size);
    debug!(codec = codec.name(), bytes = data.len(), block_size = size, "Compressing");
    data.par_chunks(size)
        .map(|chunk| {
            let mut data = if chunk.len() >= codec.min_block_size() {
                codec.compress(chunk)?
            } else {
                Vec::new()
            };
            if data.is_empty() || data.len() >= chunk.len() {
                data = chunk.to_vec();
            }
            let checksum = codec.checksum(&data).unwrap_or(0);
            Ok::<_, IoError>(CompressedSubblock {
                data,
                uncompressed_size: chunk.len(),
                checksum,
            })
        })
        .collect()
}

/// Decompresses `subblocks` into one byte vector.
///
/// # Errors
///
/// - [`IoError::Compression`] for an empty sub-block or a codec failure
/// - [`IoError::ChecksumMismatch`] when a stored checksum does not match
/// - [`IoError::SizeMismatch`] when a sub-block expands to the wrong size
pub fn decompress<C: Compression + ?Sized>(codec: &C, subblocks: &[CompressedSubblock]) -> IoResult<Vec<u8>> {
    if let Some(i) = subblocks.iter().position(|s| s.data.is_empty() || s.uncompressed_size == 0) {
        return Err(IoError::compression(format!("invalid sub-block {i}")));
    }
    debug!(
        codec = codec.name(),
        subblocks = subblocks.len(),
        bytes = uncompressed_size(subblocks),
        "Decompressing"
    );
    let parts = subblocks
        .par_iter()
        .enumerate()
        .map(|(index, s)| {
            if s.checksum != 0 {
                let actual = codec.checksum(&s.data).unwrap_or(0);
                if actual != s.checksum {
                    return Err(IoError::ChecksumMismatch {
                        index,
                        expected: s.checksum,
                        actual,
                    });
                }
            }
            let bytes = if s.is_stored() {
                s.data.clone()
            } else {
                codec.decompress(&s.data, s.uncompressed_size)?
            };
            if bytes.len() != s.uncompressed_size {
                return Err(IoError::SizeMismatch {
                    expected: s.uncompressed_size,
                    actual: bytes.len(),
                });
            }
            trace!(index, compressed = s.data.len(), "Sub-block done");
            Ok(bytes)
        })
        .collect::<IoResult<Vec<_>>>()?;
    Ok(parts.concat())
}

// ============================================================================
// Image regions
// ============================================================================

/// Little-endian bytes of the region selected by `scope`: each channel of
/// the range in turn, rows of the rectangle top to bottom.
pub fn channel_bytes<T: Sample>(image: &Image<T>, scope: &Scope) -> Vec<u8> {
    let Some(sel) = image.parse_selection(scope) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(sel.pixel_count() * sel.channel_count() * T::TYPE.bytes());
    for c in sel.channels() {
        for y in sel.rect.y..sel.rect.bottom() {
            let Some(row) = image.row(y, c) else { continue };
            for &s in &row[sel.rect.x as usize..sel.rect.right() as usize] {
                // Writing to a Vec cannot fail.
                let _ = s.write_le(&mut out);
            }
        }
    }
    out
}

/// Writes little-endian `bytes` into the region selected by `scope`, in the
/// layout produced by [`channel_bytes`].
pub fn set_channel_bytes<T: Sample>(image: &mut Image<T>, scope: &Scope, bytes: &[u8]) -> IoResult<()> {
    let Some(sel) = image.parse_selection(scope) else {
        return if bytes.is_empty() {
            Ok(())
        } else {
            Err(IoError::SizeMismatch {
                expected: 0,
                actual: bytes.len(),
            })
        };
    };
    let expected = sel.pixel_count() * sel.channel_count() * T::TYPE.bytes();
    if bytes.len() != expected {
        return Err(IoError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    let width = image.width() as usize;
    let mut src = bytes;
    for c in sel.channels() {
        let plane = image.plane_mut(c)?;
        for y in sel.rect.y..sel.rect.bottom() {
            let start = y as usize * width + sel.rect.x as usize;
            for s in &mut plane[start..start + sel.rect.width as usize] {
                *s = T::read_le(&mut src)?;
            }
        }
    }
    Ok(())
}

/// Compresses the region selected by `scope`.
pub fn compress_channels<T: Sample, C: Compression + ?Sized>(
    image: &Image<T>,
    codec: &C,
    scope: &Scope,
    max_block_size: Option<usize>,
) -> IoResult<Vec<CompressedSubblock>> {
    compress(codec, &channel_bytes(image, scope), max_block_size)
}

/// Decompresses `subblocks` into the region selected by `scope`.
pub fn decompress_channels<T: Sample, C: Compression + ?Sized>(
    image: &mut Image<T>,
    codec: &C,
    subblocks: &[CompressedSubblock],
    scope: &Scope,
) -> IoResult<()> {
    let bytes = decompress(codec, subblocks)?;
    set_channel_bytes(image, scope, &bytes)
}

fn channel_scope<T: Sample>(image: &Image<T>, channel: usize, rect: Option<Rect>) -> IoResult<Scope> {
    if channel >= image.number_of_channels() {
        return Err(Error::channel_out_of_range(channel, image.number_of_channels()).into());
    }
    let scope = Scope::new().channel(channel);
    Ok(match rect {
        Some(r) => scope.rect(r),
        None => scope.rect(image.bounds()),
    })
}

/// Compresses one channel, optionally restricted to `rect`.
pub fn compress_channel<T: Sample, C: Compression + ?Sized>(
    image: &Image<T>,
    codec: &C,
    channel: usize,
    rect: Option<Rect>,
    max_block_size: Option<usize>,
) -> IoResult<Vec<CompressedSubblock>> {
    let scope = channel_scope(image, channel, rect)?;
    compress_channels(image, codec, &scope, max_block_size)
}

/// Decompresses one channel, optionally restricted to `rect`.
pub fn decompress_channel<T: Sample, C: Compression + ?Sized>(
    image: &mut Image<T>,
    codec: &C,
    subblocks: &[CompressedSubblock],
    channel: usize,
    rect: Option<Rect>,
) -> IoResult<()> {
    let scope = channel_scope(image, channel, rect)?;
    decompress_channels(image, codec, subblocks, &scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxl_core::ColorSpace;

    /// Zlib through miniz_oxide, with a byte-sum checksum.
    struct Zlib {
        checksums: bool,
    }

    impl Compression for Zlib {
        fn name(&self) -> &str {
            "zlib"
        }

        fn max_block_size(&self) -> usize {
            4096
        }

        fn compress(&self, data: &[u8]) -> IoResult<Vec<u8>> {
            Ok(miniz_oxide::deflate::compress_to_vec_zlib(data, 6))
        }

        fn decompress(&self, data: &[u8], uncompressed_size: usize) -> IoResult<Vec<u8>> {
            miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(data, uncompressed_size)
                .map_err(|e| IoError::compression(format!("{e:?}")))
        }

        fn checksum(&self, data: &[u8]) -> Option<u64> {
            self.checksums
                .then(|| data.iter().enumerate().fold(1u64, |h, (i, &b)| h.wrapping_mul(31).wrapping_add(b as u64 ^ i as u64)))
        }
    }

    const ZLIB: Zlib = Zlib { checksums: false };

    #[test]
    fn test_block_size_selection() {
        assert_eq!(block_size(&ZLIB, None), 4096);
        assert_eq!(block_size(&ZLIB, Some(1000)), 1000);
        assert_eq!(block_size(&ZLIB, Some(1 << 20)), 4096);
        assert_eq!(block_size(&ZLIB, Some(8)), 4096);
    }

    #[test]
    fn test_compressible_data() {
        let data = vec![7u8; 10_000];
        let blocks = compress(&ZLIB, &data, None).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(uncompressed_size(&blocks), 10_000);
        assert!(compressed_size(&blocks) < 1000);
        assert!(blocks.iter().all(|b| !b.is_stored() && b.checksum == 0));
        assert_eq!(decompress(&ZLIB, &blocks).unwrap(), data);
    }

    #[test]
    fn test_small_tail_is_stored() {
        let data = vec![0u8; 4096 + 10];
        let blocks = compress(&ZLIB, &data, None).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].is_stored());
        assert_eq!(decompress(&ZLIB, &blocks).unwrap(), data);
    }

    #[test]
    fn test_incompressible_is_stored() {
        let mut state = 0x1234_5678u32;
        let data: Vec<u8> = (0..2000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let blocks = compress(&ZLIB, &data, None).unwrap();
        assert!(blocks[0].is_stored());
        assert_eq!(decompress(&ZLIB, &blocks).unwrap(), data);
    }

    #[test]
    fn test_checksums() {
        let codec = Zlib { checksums: true };
        let mut blocks = compress(&codec, &[3u8; 500], None).unwrap();
        assert_ne!(blocks[0].checksum, 0);
        assert!(decompress(&codec, &blocks).is_ok());
        let last = blocks[0].data.len() - 1;
        blocks[0].data[last] ^= 0xff;
        assert!(matches!(
            decompress(&codec, &blocks),
            Err(IoError::ChecksumMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_subblock() {
        let blocks = vec![CompressedSubblock::default()];
        assert!(matches!(decompress(&ZLIB, &blocks), Err(IoError::Compression(_))));
    }

    #[test]
    fn test_channel_region_round_trip() {
        let plane = |k: u16| (0..48).map(|i| i as u16 * k).collect::<Vec<_>>();
        let src = Image::from_planes(vec![plane(1), plane(2), plane(3)], 8, 6, ColorSpace::Rgb).unwrap();
        let rect = Rect::new(2, 1, 4, 3);
        let blocks = compress_channel(&src, &ZLIB, 1, Some(rect), None).unwrap();
        assert_eq!(uncompressed_size(&blocks), 4 * 3 * 2);

        let mut dst = Image::<u16>::new(8, 6, ColorSpace::Rgb);
        decompress_channel(&mut dst, &ZLIB, &blocks, 1, Some(rect)).unwrap();
        assert_eq!(dst.sample(2, 1, 1), src.sample(2, 1, 1));
        assert_eq!(dst.sample(5, 3, 1), src.sample(5, 3, 1));
        assert_eq!(dst.sample(1, 1, 1), Some(0));
        assert_eq!(dst.sample(2, 1, 0), Some(0));
    }

    #[test]
    fn test_channel_range_bytes() {
        let img = Image::<f32>::filled(4, 4, 3, ColorSpace::Rgb, 0.5);
        let scope = Scope::new().channels(0, 2).rect(Rect::new(0, 0, 2, 2));
        assert_eq!(channel_bytes(&img, &scope).len(), 3 * 4 * 4);
    }

    #[test]
    fn test_region_size_mismatch() {
        let src = Image::<u8>::filled(4, 4, 1, ColorSpace::Gray, 1);
        let blocks = compress_channel(&src, &ZLIB, 0, None, None).unwrap();
        let mut dst = Image::<u8>::new(4, 4, ColorSpace::Gray);
        let err = decompress_channel(&mut dst, &ZLIB, &blocks, 0, Some(Rect::new(0, 0, 2, 2))).unwrap_err();
        assert!(matches!(err, IoError::SizeMismatch { expected: 4, actual: 16 }));
    }

    #[test]
    fn test_channel_out_of_range() {
        let img = Image::<u8>::new(2, 2, ColorSpace::Gray);
        assert!(matches!(
            compress_channel(&img, &ZLIB, 3, None, None),
            Err(IoError::Core(Error::ChannelOutOfRange { .. }))
        ));
    }
}
