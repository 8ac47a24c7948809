//! Color space conversion of whole images.
//!
//! - [`set_color_space`] - In-place conversion, resizing the channel set
//!   when crossing between grayscale and color
//! - [`lightness`], [`luminance`], [`intensity`] - Extraction into a new
//!   grayscale image
//! - [`set_lightness`], [`set_luminance`], [`set_intensity`] - Injection
//!   from a grayscale image, keeping chrominance
//!
//! Pixels are processed in parallel row bands. Every function works on the
//! whole image; selections do not apply. The RGB working space is the one
//! associated with the image being read (extraction) or written (injection).
//!
//! # Example
//!
//! ```rust
//! use pxl_color::{lightness, set_color_space};
//! use pxl_core::{ColorSpace, Image};
//!
//! let mut img = Image::<f32>::filled(8, 8, 3, ColorSpace::Rgb, 1.0);
//! let l = lightness(&img, None).unwrap();
//! assert_eq!(l.color_space(), ColorSpace::Gray);
//!
//! set_color_space(&mut img, ColorSpace::Gray, None).unwrap();
//! assert_eq!(img.number_of_channels(), 1);
//! ```

use pxl_core::storage::{try_alloc_plane, try_clone_plane};
use pxl_core::{ColorSpace, Error, Image, Result, Sample, parallel};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::convert::{self, Conversion, rgb_to_hsi};
use crate::system::{RgbColorSystem, cie_y_to_l};

// ============================================================================
// Banding
// ============================================================================

/// Samples per band for a parallel pass over `image`.
fn band_len<T: Sample>(image: &Image<T>, max_processors: Option<usize>) -> usize {
    let config = image.processing_config();
    let (width, height) = (image.width() as usize, image.height() as usize);
    let threads = parallel::number_of_threads_for_rows(
        height,
        width,
        max_processors.or(config.max_processors),
        config.overhead_limit_px,
    );
    let rows = height.div_ceil(threads.max(1)).max(1);
    trace!(threads, rows, "Color bands");
    (rows * width).max(1)
}

/// Reads the nominal channels of one pixel as a triplet. Gray is replicated.
#[inline]
fn triplet<T: Sample>(planes: &[&[T]], i: usize) -> [f64; 3] {
    let last = planes.len() - 1;
    [0, 1, 2].map(|c| planes[c.min(last)][i].to_f64())
}

/// Rewrites the nominal channels of every pixel in place.
///
/// `f` receives the pixel as a triplet (gray replicated into three) and the
/// matching sample of `aux`, if any. For grayscale images only the first
/// component of the result is stored.
fn map_pixels<T, F>(image: &mut Image<T>, max_processors: Option<usize>, aux: Option<&[T]>, f: F) -> Result<()>
where
    T: Sample,
    F: Fn(&mut [f64; 3], f64) -> Result<()> + Sync,
{
    let n = image.number_of_nominal_channels();
    let len = band_len(image, max_processors);
    let pixels = image.number_of_pixels() as u64;

    let mut bands: Vec<Vec<&mut [T]>> = Vec::new();
    for plane in image.planes_mut()?.into_iter().take(n) {
        for (i, chunk) in plane.chunks_mut(len).enumerate() {
            if bands.len() <= i {
                bands.push(Vec::with_capacity(n));
            }
            bands[i].push(chunk);
        }
    }

    bands.into_par_iter().enumerate().try_for_each(|(b, mut band)| {
        let offset = b * len;
        let count = band.first().map_or(0, |c| c.len());
        let last = band.len().saturating_sub(1);
        for k in 0..count {
            let mut px = [0, 1, 2].map(|c| band[c.min(last)][k].to_f64());
            let a = aux.map_or(0.0, |s| s[offset + k].to_f64());
            f(&mut px, a)?;
            for (c, chunk) in band.iter_mut().enumerate() {
                chunk[k] = T::from_f64(px[c]);
            }
        }
        Ok::<(), Error>(())
    })?;

    image.status_mut().add(pixels);
    Ok(())
}

/// Computes one value per pixel into a new plane.
fn extract_plane<T, F>(image: &Image<T>, max_processors: Option<usize>, f: F) -> Result<Vec<T>>
where
    T: Sample,
    F: Fn([f64; 3]) -> Result<f64> + Sync,
{
    let planes: Vec<&[T]> = (0..image.number_of_nominal_channels())
        .filter_map(|c| image.plane(c))
        .collect();
    let mut out = try_alloc_plane(image.number_of_pixels(), T::default())?;
    if planes.is_empty() {
        return Ok(out);
    }
    let len = band_len(image, max_processors);
    out.par_chunks_mut(len).enumerate().try_for_each(|(b, dst)| {
        let offset = b * len;
        for (k, d) in dst.iter_mut().enumerate() {
            *d = T::from_f64(f(triplet(&planes, offset + k))?);
        }
        Ok::<(), Error>(())
    })?;
    Ok(out)
}

/// Conversion from the image's space to RGB, or `None` for grayscale.
fn to_rgb(cs: ColorSpace) -> Result<Option<Conversion>> {
    if cs.is_color() {
        Conversion::new(cs, ColorSpace::Rgb).map(Some)
    } else {
        Ok(None)
    }
}

#[inline]
fn apply(conversion: &Option<Conversion>, system: &RgbColorSystem, px: [f64; 3]) -> Result<[f64; 3]> {
    match conversion {
        Some(c) => c.apply(system, px),
        None => Ok(px),
    }
}

// ============================================================================
// Color space conversion
// ============================================================================

/// Converts `image` to `target` in place.
///
/// Gray to color duplicates the gray channel into three and then converts
/// from RGB. Color to gray replaces the three nominal channels with CIE L*.
/// Alpha channels keep their position after the nominal channels. On an
/// allocation failure the image is left as it was.
///
/// # Errors
///
/// - [`Error::UnsupportedConversion`] if no conversion path exists
/// - [`Error::InvalidWorkingSpace`] if the image's working space is invalid
/// - Allocation and storage errors from resizing the channel set
pub fn set_color_space<T: Sample>(
    image: &mut Image<T>,
    target: ColorSpace,
    max_processors: Option<usize>,
) -> Result<()> {
    let from = image.color_space();
    if from == target {
        return Ok(());
    }
    if image.number_of_channels() == 0 {
        return image.restructure_channels(target, |_| Ok(()));
    }
    debug!(
        from = %from,
        to = %target,
        width = image.width(),
        height = image.height(),
        "Converting color space"
    );
    let system = RgbColorSystem::new(image.working_space())?;

    match (from.is_color(), target.is_color()) {
        (true, true) => {
            let conversion = Conversion::new(from, target)?;
            map_pixels(image, max_processors, None, |px, _| {
                *px = conversion.apply(&system, *px)?;
                Ok(())
            })
        }
        (false, true) => {
            let conversion = Conversion::new(ColorSpace::Rgb, target)?;
            expand_gray(image)?;
            if conversion.is_identity() {
                return Ok(());
            }
            map_pixels(image, max_processors, None, |px, _| {
                *px = conversion.apply(&system, *px)?;
                Ok(())
            })
        }
        (true, false) => {
            let conversion = to_rgb(from)?;
            let l = extract_plane(image, max_processors, |px| {
                Ok(system.lightness(apply(&conversion, &system, px)?))
            })?;
            collapse_to_gray(image, l)
        }
        (false, false) => Err(Error::unsupported_conversion(from, target)),
    }
}

/// Gray to RGB: two copies of the gray plane inserted after it.
fn expand_gray<T: Sample>(image: &mut Image<T>) -> Result<()> {
    let gray = image.plane(0).ok_or_else(|| Error::channel_out_of_range(0, 0))?;
    let green = try_clone_plane(gray)?;
    let blue = try_clone_plane(gray)?;
    image.restructure_channels(ColorSpace::Rgb, |planes| {
        planes.insert(1, green);
        planes.insert(2, blue);
        Ok(())
    })
}

/// Color to gray: the three nominal planes replaced by `gray`.
fn collapse_to_gray<T: Sample>(image: &mut Image<T>, gray: Vec<T>) -> Result<()> {
    image.restructure_channels(ColorSpace::Gray, |planes| {
        planes.drain(1..3);
        planes[0] = gray;
        Ok(())
    })
}

// ============================================================================
// Extraction
// ============================================================================

fn extract<T, F>(image: &Image<T>, max_processors: Option<usize>, f: F) -> Result<Image<T>>
where
    T: Sample,
    F: Fn(&RgbColorSystem, [f64; 3]) -> f64 + Sync,
{
    let system = RgbColorSystem::new(image.working_space())?;
    let conversion = to_rgb(image.color_space())?;
    let plane = extract_plane(image, max_processors, |px| Ok(f(&system, apply(&conversion, &system, px)?)))?;
    let mut out = Image::from_planes(vec![plane], image.width(), image.height(), ColorSpace::Gray)?;
    out.set_working_space(*image.working_space())?;
    out.set_processing_config(*image.processing_config());
    Ok(out)
}

/// CIE L* of every pixel, as a new grayscale image.
pub fn lightness<T: Sample>(image: &Image<T>, max_processors: Option<usize>) -> Result<Image<T>> {
    extract(image, max_processors, |system, rgb| system.lightness(rgb))
}

/// CIE Y of every pixel, as a new grayscale image.
pub fn luminance<T: Sample>(image: &Image<T>, max_processors: Option<usize>) -> Result<Image<T>> {
    extract(image, max_processors, |system, rgb| system.luminance(rgb))
}

/// HSI intensity of every pixel, as a new grayscale image.
pub fn intensity<T: Sample>(image: &Image<T>, max_processors: Option<usize>) -> Result<Image<T>> {
    extract(image, max_processors, |_, rgb| convert::intensity(rgb))
}

// ============================================================================
// Injection
// ============================================================================

fn inject<T, F>(image: &mut Image<T>, source: &Image<T>, max_processors: Option<usize>, f: F) -> Result<()>
where
    T: Sample,
    F: Fn(&RgbColorSystem, [f64; 3], f64) -> [f64; 3] + Sync,
{
    if source.width() != image.width() || source.height() != image.height() {
        return Err(Error::invalid_dimensions(
            source.width(),
            source.height(),
            format!("expected {}x{}", image.width(), image.height()),
        ));
    }
    let values = source.plane(0).ok_or_else(|| Error::channel_out_of_range(0, 0))?;
    let space = image.color_space();
    let system = RgbColorSystem::new(image.working_space())?;
    let (into_rgb, from_rgb) = if space.is_color() {
        (
            Some(Conversion::new(space, ColorSpace::Rgb)?),
            Some(Conversion::new(ColorSpace::Rgb, space)?),
        )
    } else {
        (None, None)
    };
    map_pixels(image, max_processors, Some(values), |px, v| {
        let rgb = f(&system, apply(&into_rgb, &system, *px)?, v);
        *px = apply(&from_rgb, &system, rgb)?;
        Ok(())
    })
}

/// Replaces CIE L* of every pixel with the samples of `l`, keeping a*, b*.
pub fn set_lightness<T: Sample>(image: &mut Image<T>, l: &Image<T>, max_processors: Option<usize>) -> Result<()> {
    inject(image, l, max_processors, |system, rgb, v| {
        let mut lab = system.rgb_to_lab(rgb);
        lab[0] = v;
        system.lab_to_rgb(lab)
    })
}

/// Replaces CIE Y of every pixel with the samples of `y`, keeping a*, b*.
pub fn set_luminance<T: Sample>(image: &mut Image<T>, y: &Image<T>, max_processors: Option<usize>) -> Result<()> {
    inject(image, y, max_processors, |system, rgb, v| {
        let mut lab = system.rgb_to_lab(rgb);
        lab[0] = cie_y_to_l(v);
        system.lab_to_rgb(lab)
    })
}

/// Replaces the HSI intensity of every pixel with the samples of `i`,
/// keeping hue and saturation.
pub fn set_intensity<T: Sample>(image: &mut Image<T>, i: &Image<T>, max_processors: Option<usize>) -> Result<()> {
    inject(image, i, max_processors, |_, rgb, v| {
        let mut hsi = rgb_to_hsi(rgb);
        hsi[2] = v;
        convert::hsi_to_rgb(hsi)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rgb_image() -> Image<f64> {
        let w = 16u32;
        let h = 12u32;
        let n = (w * h) as usize;
        let r: Vec<f64> = (0..n).map(|i| (i % 16) as f64 / 15.0).collect();
        let g: Vec<f64> = (0..n).map(|i| (i / 16) as f64 / 11.0).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64 / 12.0).collect();
        Image::from_planes(vec![r, g, b], w, h, ColorSpace::Rgb).unwrap()
    }

    fn assert_planes_close(a: &Image<f64>, b: &Image<f64>, eps: f64) {
        for c in 0..a.number_of_channels() {
            for (x, y) in a.plane(c).unwrap().iter().zip(b.plane(c).unwrap()) {
                assert_relative_eq!(*x, *y, epsilon = eps);
            }
        }
    }

    #[test]
    fn test_gray_to_rgb_duplicates() {
        let mut img = Image::<u8>::filled(4, 3, 1, ColorSpace::Gray, 77);
        img.add_alpha_channel(Some(vec![200; 12])).unwrap();
        set_color_space(&mut img, ColorSpace::Rgb, None).unwrap();
        assert_eq!(img.color_space(), ColorSpace::Rgb);
        assert_eq!(img.number_of_channels(), 4);
        assert_eq!(img.pixel(2, 1).unwrap().as_slice(), &[77, 77, 77, 200]);
    }

    #[test]
    fn test_rgb_to_gray_keeps_alpha() {
        let mut img = Image::<f32>::filled(5, 5, 3, ColorSpace::Rgb, 1.0);
        img.add_alpha_channel(Some(vec![0.25; 25])).unwrap();
        set_color_space(&mut img, ColorSpace::Gray, Some(1)).unwrap();
        assert_eq!(img.number_of_channels(), 2);
        assert_eq!(img.number_of_alpha_channels(), 1);
        assert_relative_eq!(img.sample(0, 0, 0).unwrap(), 1.0, epsilon = 1e-5);
        assert_eq!(img.sample(4, 4, 1), Some(0.25));
    }

    #[test]
    fn test_round_trips_through_every_space() {
        let original = rgb_image();
        for cs in [ColorSpace::Hsv, ColorSpace::Hsi, ColorSpace::CieXyz, ColorSpace::CieLab, ColorSpace::CieLch] {
            let mut img = original.clone();
            set_color_space(&mut img, cs, None).unwrap();
            assert_eq!(img.color_space(), cs);
            assert_eq!(img.number_of_channels(), 3);
            set_color_space(&mut img, ColorSpace::Rgb, None).unwrap();
            assert_planes_close(&img, &original, 1e-6);
        }
        // The source handle still sees the unconverted buffer.
        assert_eq!(original.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut a = rgb_image();
        let mut b = rgb_image();
        a.set_processing_config(a.processing_config().with_overhead_limit(16));
        set_color_space(&mut a, ColorSpace::CieLab, Some(4)).unwrap();
        set_color_space(&mut b, ColorSpace::CieLab, Some(1)).unwrap();
        assert_planes_close(&a, &b, 0.0);
    }

    #[test]
    fn test_gray_to_lab() {
        let mut img = Image::<f64>::filled(3, 3, 1, ColorSpace::Gray, 0.5);
        set_color_space(&mut img, ColorSpace::CieLab, None).unwrap();
        let system = RgbColorSystem::new(img.working_space()).unwrap();
        let expected = system.rgb_to_lab([0.5; 3]);
        assert_relative_eq!(img.sample(1, 1, 0).unwrap(), expected[0], epsilon = 1e-12);
        assert_relative_eq!(img.sample(1, 1, 2).unwrap(), expected[2], epsilon = 1e-12);
    }

    #[test]
    fn test_same_space_is_noop() {
        let mut img = rgb_image();
        let before = img.clone();
        set_color_space(&mut img, ColorSpace::Rgb, None).unwrap();
        assert!(img.shares_buffer_with(&before));
    }

    #[test]
    fn test_empty_image() {
        let mut img = Image::<f32>::default();
        set_color_space(&mut img, ColorSpace::Rgb, None).unwrap();
        assert_eq!(img.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_invalid_working_space() {
        let mut img = rgb_image();
        img.set_working_space(pxl_core::RgbWorkingSpace {
            luminance: [0.0; 3],
            ..Default::default()
        })
        .unwrap();
        let err = set_color_space(&mut img, ColorSpace::Hsv, None).unwrap_err();
        assert!(matches!(err, Error::InvalidWorkingSpace(_)));
        assert_eq!(img.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_extraction() {
        let img = rgb_image();
        let system = RgbColorSystem::new(img.working_space()).unwrap();
        let l = lightness(&img, None).unwrap();
        let y = luminance(&img, None).unwrap();
        let i = intensity(&img, None).unwrap();
        let px = img.pixel(5, 7).unwrap();
        let rgb = [px[0], px[1], px[2]];
        assert_eq!(l.color_space(), ColorSpace::Gray);
        assert_relative_eq!(l.sample(5, 7, 0).unwrap(), system.lightness(rgb), epsilon = 1e-12);
        assert_relative_eq!(y.sample(5, 7, 0).unwrap(), system.luminance(rgb), epsilon = 1e-12);
        assert_relative_eq!(i.sample(5, 7, 0).unwrap(), convert::intensity(rgb), epsilon = 1e-12);
    }

    #[test]
    fn test_extraction_from_other_space() {
        let rgb = rgb_image();
        let mut hsv = rgb.clone();
        set_color_space(&mut hsv, ColorSpace::Hsv, None).unwrap();
        let a = lightness(&rgb, None).unwrap();
        let b = lightness(&hsv, None).unwrap();
        assert_planes_close(&a, &b, 1e-9);
    }

    #[test]
    fn test_set_lightness_round_trip() {
        let mut img = rgb_image();
        let original = img.clone();
        let l = lightness(&img, None).unwrap();
        set_lightness(&mut img, &l, None).unwrap();
        assert_planes_close(&img, &original, 1e-6);
    }

    #[test]
    fn test_set_intensity_keeps_hue() {
        let mut img = Image::from_planes(vec![vec![0.8], vec![0.4], vec![0.2]], 1, 1, ColorSpace::Rgb).unwrap();
        let before = rgb_to_hsi([0.8, 0.4, 0.2]);
        let i = Image::filled(1, 1, 1, ColorSpace::Gray, 0.4);
        set_intensity(&mut img, &i, None).unwrap();
        let px = img.pixel(0, 0).unwrap();
        let after = rgb_to_hsi([px[0], px[1], px[2]]);
        assert_relative_eq!(after[0], before[0], epsilon = 1e-9);
        assert_relative_eq!(after[2], 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_set_luminance() {
        let mut img = Image::<f64>::filled(2, 2, 3, ColorSpace::Rgb, 0.5);
        let y = Image::filled(2, 2, 1, ColorSpace::Gray, 0.5);
        set_luminance(&mut img, &y, None).unwrap();
        let out = luminance(&img, None).unwrap();
        assert_relative_eq!(out.sample(1, 1, 0).unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_set_lightness_on_gray() {
        let mut img = Image::<f64>::filled(2, 2, 1, ColorSpace::Gray, 0.2);
        let l = Image::filled(2, 2, 1, ColorSpace::Gray, 0.6);
        set_lightness(&mut img, &l, None).unwrap();
        let out = lightness(&img, None).unwrap();
        assert_relative_eq!(out.sample(0, 1, 0).unwrap(), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_injection_size_mismatch() {
        let mut img = rgb_image();
        let l = Image::<f64>::filled(3, 3, 1, ColorSpace::Gray, 0.5);
        assert!(matches!(
            set_lightness(&mut img, &l, None),
            Err(Error::InvalidDimensions { .. })
        ));
    }
}
