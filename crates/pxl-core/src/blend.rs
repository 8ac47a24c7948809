//! Alpha blending of 32-bit RGBA rasters onto images.
//!
//! A [`BlendSurface`] is any raster able to report packed `0xAARRGGBB`
//! pixels. Blending mixes each surface pixel into the nominal channels of
//! the image:
//!
//! ```text
//! V1 = V * (1 - A/255) + B * (A/255)
//! ```
//!
//! where `B` is the surface component for the channel (red, green, blue;
//! the mean of the three for grayscale images). When the image has alpha
//! channels, the first one receives the surface alpha unchanged.

use tracing::debug;

use crate::error::{Error, Result};
use crate::image::Image;
use crate::rect::{Point, Rect};
use crate::sample::Sample;
use crate::selection::Scope;

/// A raster of packed `0xAARRGGBB` pixels.
pub trait BlendSurface: Sync {
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Packed pixel at `(x, y)`; coordinates are within bounds.
    fn pixel(&self, x: u32, y: u32) -> u32;

    /// Surface bounds.
    fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }
}

/// Owned row-major `0xAARRGGBB` raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rgba32Surface {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Rgba32Surface {
    /// Wraps row-major packed pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("expected {} pixels, got {}", width as usize * height as usize, pixels.len()),
            ));
        }
        Ok(Self { width, height, pixels })
    }

    /// Surface of a single color.
    pub fn solid(width: u32, height: u32, argb: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![argb; width as usize * height as usize],
        }
    }

    /// Packs 8-bit components.
    pub fn pack(a: u8, r: u8, g: u8, b: u8) -> u32 {
        u32::from_be_bytes([a, r, g, b])
    }
}

impl BlendSurface for Rgba32Surface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

impl<T: Sample> Image<T> {
    /// Blends `surface` onto this image with its top-left corner at `point`.
    ///
    /// The rectangle of `scope` selects the part of the surface to blend
    /// (the whole surface when unset); only the part overlapping this image
    /// is touched. Channel settings of `scope` are ignored.
    pub fn blend<S: BlendSurface + ?Sized>(&mut self, surface: &S, point: Point, scope: &Scope) -> Result<&mut Self> {
        let nominal = self.number_of_nominal_channels();
        if nominal == 0 || self.is_empty() {
            return Ok(self);
        }
        let src = match scope.rect.filter(|r| !r.is_empty()) {
            Some(r) => r.intersect(&surface.bounds()),
            None => Some(surface.bounds()),
        };
        let Some(src) = src.filter(|r| !r.is_empty()) else {
            return Ok(self);
        };

        let skip_x = (-(point.x as i64)).max(0) as u64;
        let skip_y = (-(point.y as i64)).max(0) as u64;
        let dx = point.x.max(0) as u64;
        let dy = point.y.max(0) as u64;
        let w = (src.width as u64)
            .saturating_sub(skip_x)
            .min((self.width() as u64).saturating_sub(dx));
        let h = (src.height as u64)
            .saturating_sub(skip_y)
            .min((self.height() as u64).saturating_sub(dy));
        if w == 0 || h == 0 {
            return Ok(self);
        }
        let dst = Rect::new(dx as u32, dy as u32, w as u32, h as u32);
        let (sx0, sy0) = (src.x as u64 + skip_x, src.y as u64 + skip_y);
        debug!(rect = %dst, nominal, "Blending surface");

        let alpha_channel = self.has_alpha_channels().then_some(nominal);
        let width = self.width() as usize;
        let mut planes = self.planes_mut()?;
        for (x, y) in dst.iter_coords() {
            let sx = (sx0 + (x - dst.x) as u64) as u32;
            let sy = (sy0 + (y - dst.y) as u64) as u32;
            let [a, r, g, b] = surface.pixel(sx, sy).to_be_bytes();
            let alpha = a as f64 / 255.0;
            let idx = y as usize * width + x as usize;
            let components = [r, g, b].map(|v| v as f64 / 255.0);
            for (c, plane) in planes.iter_mut().take(nominal).enumerate() {
                let component = if nominal == 1 {
                    components.iter().sum::<f64>() / 3.0
                } else {
                    components[c.min(2)]
                };
                let v = plane[idx].to_f64();
                plane[idx] = T::from_f64(v * (1.0 - alpha) + component * alpha);
            }
            if let Some(ac) = alpha_channel {
                planes[ac][idx] = T::from_f64(alpha);
            }
        }
        drop(planes);
        self.status.add(dst.area());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorSpace;
    use approx::assert_relative_eq;

    #[test]
    fn test_opaque_blend_replaces() {
        let mut img = Image::<f32>::new(2, 2, ColorSpace::Rgb);
        let surface = Rgba32Surface::solid(2, 2, Rgba32Surface::pack(255, 255, 0, 51));
        img.blend(&surface, Point::new(0, 0), &Scope::new()).unwrap();
        let px = img.pixel(1, 1).unwrap();
        assert_relative_eq!(px[0], 1.0);
        assert_relative_eq!(px[1], 0.0);
        assert_relative_eq!(px[2], 0.2);
    }

    #[test]
    fn test_half_alpha_mixes() {
        let mut img = Image::<f64>::filled(1, 1, 1, ColorSpace::Gray, 1.0);
        let surface = Rgba32Surface::solid(1, 1, Rgba32Surface::pack(51, 0, 0, 0));
        img.blend(&surface, Point::new(0, 0), &Scope::new()).unwrap();
        assert_relative_eq!(img.sample(0, 0, 0).unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_transparent_is_noop_and_alpha_passes_through() {
        let mut img = Image::<f32>::filled(2, 1, 4, ColorSpace::Rgb, 0.5);
        let surface = Rgba32Surface::solid(2, 1, Rgba32Surface::pack(0, 255, 255, 255));
        img.blend(&surface, Point::new(0, 0), &Scope::new()).unwrap();
        assert_eq!(img.pixel(0, 0).unwrap().as_slice(), &[0.5, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_offset_and_clipping() {
        let mut img = Image::<u8>::new(3, 3, ColorSpace::Gray);
        let surface = Rgba32Surface::solid(2, 2, 0xFFFF_FFFF);
        img.blend(&surface, Point::new(2, -1), &Scope::new()).unwrap();
        assert_eq!(img.column(2, 0).unwrap(), vec![255, 0, 0]);
        assert_eq!(img.column(1, 0).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_surface_size_validation() {
        assert!(Rgba32Surface::new(2, 2, vec![0; 3]).is_err());
    }
}
