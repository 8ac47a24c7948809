//! Raw image streams.
//!
//! A raw stream is a 16 byte header followed by the sample planes:
//!
//! ```text
//! offset  size  field
//! 0       4     width           (u32, little-endian)
//! 4       4     height          (u32, little-endian)
//! 8       4     channel count   (u32, little-endian)
//! 12      4     color space id  (u32, little-endian)
//! 16      ...   channel 0: width*height samples, row-major
//!               channel 1: ...
//! ```
//!
//! Samples are stored little-endian in the image's own sample type; the
//! stream does not record the sample type, so a stream must be read back
//! with the type it was written with.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image};
//! use pxl_io::raw::{read_raw, write_raw};
//!
//! let img = Image::<u16>::filled(3, 2, 3, ColorSpace::Rgb, 4096);
//! let mut bytes = Vec::new();
//! write_raw(&img, &mut bytes).unwrap();
//! assert_eq!(bytes.len(), 16 + 3 * 2 * 3 * 2);
//!
//! let back: Image<u16> = read_raw(&mut bytes.as_slice()).unwrap();
//! assert_eq!(back.pixel(2, 1), img.pixel(2, 1));
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pxl_core::{ColorSpace, Error, Image, Sample};
use tracing::{debug, trace};

use crate::error::{IoError, IoResult};

/// Size of the raw stream header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Raw stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of channels, alpha included.
    pub channels: u32,
    /// Color space of the nominal channels.
    pub color_space: ColorSpace,
}

impl RawHeader {
    /// Header describing `image`.
    pub fn of<T: Sample>(image: &Image<T>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: image.number_of_channels() as u32,
            color_space: image.color_space(),
        }
    }

    /// Samples in one channel block.
    pub fn samples_per_channel(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes of sample data following the header, or `None` on overflow.
    pub fn data_size(&self, bytes_per_sample: usize) -> Option<usize> {
        self.samples_per_channel()
            .checked_mul(self.channels as usize)?
            .checked_mul(bytes_per_sample)
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> IoResult<()> {
        w.write_u32::<LittleEndian>(self.width)?;
        w.write_u32::<LittleEndian>(self.height)?;
        w.write_u32::<LittleEndian>(self.channels)?;
        w.write_u32::<LittleEndian>(self.color_space.id())?;
        Ok(())
    }

    /// Reads and validates a header.
    ///
    /// # Errors
    ///
    /// - [`IoError::UnknownColorSpace`] for an undefined color space id
    /// - [`IoError::BadHeader`] for inconsistent geometry or channel counts
    pub fn read<R: Read>(r: &mut R) -> IoResult<Self> {
        let width = r.read_u32::<LittleEndian>()?;
        let height = r.read_u32::<LittleEndian>()?;
        let channels = r.read_u32::<LittleEndian>()?;
        let id = r.read_u32::<LittleEndian>()?;
        let color_space = ColorSpace::from_id(id).ok_or(IoError::UnknownColorSpace(id))?;

        let header = Self {
            width,
            height,
            channels,
            color_space,
        };
        let empty = width == 0 || height == 0;
        if empty {
            if width != height || channels != 0 {
                return Err(IoError::bad_header(format!("{width}x{height} image with {channels} channels")));
            }
        } else if (channels as usize) < color_space.nominal_channels() {
            return Err(IoError::bad_header(format!(
                "{color_space} needs {} channels, header has {channels}",
                color_space.nominal_channels()
            )));
        }
        Ok(header)
    }
}

/// Writes `image` as a raw stream.
pub fn write_raw<T: Sample, W: Write>(image: &Image<T>, w: &mut W) -> IoResult<()> {
    let header = RawHeader::of(image);
    debug!(
        width = header.width,
        height = header.height,
        channels = header.channels,
        sample_type = %T::TYPE,
        "Writing raw stream"
    );
    header.write(w)?;
    for (c, plane) in image.planes().into_iter().enumerate() {
        trace!(channel = c, samples = plane.len(), "Writing channel");
        for &s in plane {
            s.write_le(w)?;
        }
    }
    Ok(())
}

/// Reads a raw stream written with sample type `T`.
///
/// # Errors
///
/// Header errors as in [`RawHeader::read`], [`IoError::Io`] when the stream
/// ends early, and allocation failures as [`IoError::Core`].
pub fn read_raw<T: Sample, R: Read>(r: &mut R) -> IoResult<Image<T>> {
    let header = RawHeader::read(r)?;
    if header.data_size(T::TYPE.bytes()).is_none() {
        return Err(IoError::bad_header(format!(
            "{}x{}x{} samples overflow",
            header.width, header.height, header.channels
        )));
    }
    debug!(
        width = header.width,
        height = header.height,
        channels = header.channels,
        color_space = %header.color_space,
        "Reading raw stream"
    );

    read_planes(&header, r)
}

/// Writes `image` to a file as a raw stream.
pub fn write_raw_file<T: Sample, P: AsRef<Path>>(image: &Image<T>, path: P) -> IoResult<()> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    write_raw(image, &mut w)?;
    w.flush()?;
    Ok(())
}

/// Reads a raw stream file written with sample type `T`.
///
/// The file size must match the header exactly.
pub fn read_raw_file<T: Sample, P: AsRef<Path>>(path: P) -> IoResult<Image<T>> {
    let file = File::open(path.as_ref())?;
    let size = file.metadata()?.len();
    let mut r = BufReader::new(file);
    let header = RawHeader::read(&mut r)?;
    let expected = header
        .data_size(T::TYPE.bytes())
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| IoError::bad_header("sample data size overflows"))?;
    if size != expected as u64 {
        return Err(IoError::SizeMismatch {
            expected,
            actual: size as usize,
        });
    }

    read_planes(&header, &mut r)
}

/// Samples reserved at a time while reading a channel block.
const READ_CHUNK: usize = 1 << 16;

/// Reads the channel blocks described by `header`.
///
/// Planes grow in bounded chunks as samples arrive, so a header claiming
/// more data than the stream holds fails on the stream, not on allocation.
fn read_planes<T: Sample, R: Read>(header: &RawHeader, r: &mut R) -> IoResult<Image<T>> {
    let len = header.samples_per_channel();
    let mut planes = Vec::new();
    for c in 0..header.channels {
        let mut plane: Vec<T> = Vec::new();
        while plane.len() < len {
            let n = (len - plane.len()).min(READ_CHUNK);
            plane
                .try_reserve(n)
                .map_err(|e| Error::allocation_failed(len, e.to_string()))?;
            for _ in 0..n {
                plane.push(T::read_le(r)?);
            }
        }
        trace!(channel = c, "Read channel");
        planes.push(plane);
    }
    Ok(Image::from_planes(planes, header.width, header.height, header.color_space)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxl_core::{Complex32, Rect};

    fn round_trip<T: Sample>(image: &Image<T>) -> Image<T> {
        let mut bytes = Vec::new();
        write_raw(image, &mut bytes).unwrap();
        read_raw(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let img = Image::<u8>::filled(2, 3, 4, ColorSpace::Rgb, 9);
        let mut bytes = Vec::new();
        write_raw(&img, &mut bytes).unwrap();
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &4u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &1u32.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_SIZE + 24);
    }

    #[test]
    fn test_round_trip_float_with_alpha() {
        let plane = |k: f32| (0..20).map(|i| i as f32 * k).collect::<Vec<_>>();
        let img = Image::from_planes(vec![plane(0.1), plane(0.2), plane(0.3), plane(0.4)], 5, 4, ColorSpace::Hsv)
            .unwrap();
        let back = round_trip(&img);
        assert_eq!(back.color_space(), ColorSpace::Hsv);
        assert_eq!(back.number_of_alpha_channels(), 1);
        assert_eq!(back.planes(), img.planes());
    }

    #[test]
    fn test_round_trip_complex() {
        let plane: Vec<Complex32> = (0..6).map(|i| Complex32::new(i as f32, -(i as f32))).collect();
        let img = Image::from_planes(vec![plane], 3, 2, ColorSpace::Gray).unwrap();
        assert_eq!(round_trip(&img).planes(), img.planes());
    }

    #[test]
    fn test_round_trip_ignores_selection() {
        let mut img = Image::<u32>::filled(4, 4, 1, ColorSpace::Gray, 7);
        img.select_rectangle(Rect::new(1, 1, 2, 2));
        let back = round_trip(&img);
        assert_eq!(back.width(), 4);
        assert_eq!(back.number_of_samples(), 16);
    }

    #[test]
    fn test_empty_round_trip() {
        let back = round_trip(&Image::<f64>::default());
        assert!(back.is_empty());
        assert_eq!(back.number_of_channels(), 0);
    }

    #[test]
    fn test_unknown_color_space() {
        let mut bytes = Vec::new();
        for v in [1u32, 1, 1, 99] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0);
        let err = read_raw::<u8, _>(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, IoError::UnknownColorSpace(99)));
    }

    #[test]
    fn test_too_few_channels() {
        let mut bytes = Vec::new();
        for v in [1u32, 1, 2, 1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = read_raw::<u8, _>(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, IoError::BadHeader(_)));
    }

    #[test]
    fn test_truncated_stream() {
        let img = Image::<u16>::filled(4, 4, 1, ColorSpace::Gray, 1);
        let mut bytes = Vec::new();
        write_raw(&img, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(read_raw::<u16, _>(&mut bytes.as_slice()), Err(IoError::Io(_))));
    }

    #[test]
    fn test_oversized_header_fails_on_stream() {
        let mut bytes = Vec::new();
        RawHeader {
            width: 65535,
            height: 65535,
            channels: 4,
            color_space: ColorSpace::Rgb,
        }
        .write(&mut bytes)
        .unwrap();
        bytes.extend_from_slice(&0.5f64.to_le_bytes());
        match read_raw::<f64, _>(&mut bytes.as_slice()) {
            Err(IoError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected end of stream, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_spanning_read_chunks() {
        let plane: Vec<u16> = (0..READ_CHUNK as u32 + 300).map(|i| i as u16).collect();
        let img = Image::from_planes(vec![plane], READ_CHUNK as u32 + 300, 1, ColorSpace::Gray).unwrap();
        assert_eq!(round_trip(&img).planes(), img.planes());
    }

    #[test]
    fn test_file_size_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.raw");
        let img = Image::<f32>::filled(3, 3, 1, ColorSpace::Gray, 0.5);
        write_raw_file(&img, &path).unwrap();
        assert_eq!(read_raw_file::<f32, _>(&path).unwrap().sample(2, 2, 0), Some(0.5));
        // Reading with the wrong sample type fails on the size check.
        assert!(matches!(
            read_raw_file::<f64, _>(&path),
            Err(IoError::SizeMismatch { .. })
        ));
    }
}
