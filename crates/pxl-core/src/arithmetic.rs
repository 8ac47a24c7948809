//! Elementwise arithmetic, logic and composition on images.
//!
//! The two primitives are:
//!
//! - [`Image::apply_scalar`] - `target = op(target, scalar)` over a selection
//! - [`Image::apply_image`] - `target = op(target, source)` where a source
//!   selection is laid over the target anchored at a point
//!
//! Every in-place convenience method (`add`, `subtract`, `screen`, ...) has
//! a non-mutating counterpart (`added`, `subtracted`, `screened`, ...)
//! returning a new image built from the current selection. Operands are given as an
//! [`Operand`], which converts from `f64` and from `&Image`.
//!
//! # Division
//!
//! A scalar [`ImageOp::Div`] by zero (or by a value that rounds to zero in
//! the sample type) fails with [`Error::DivisionByZero`] before any sample is
//! touched. Per-sample division by zero inside image/image operations
//! saturates to the maximum sample value.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image, ImageOp, Rect, Scope};
//!
//! let mut img = Image::<f32>::filled(4, 4, 1, ColorSpace::Gray, 0.25);
//! img.apply_scalar(0.75, ImageOp::Mov, &Scope::new().rect(Rect::from_corners(1, 1, 3, 3)))
//!     .unwrap();
//! assert_eq!(img.sample(1, 1, 0), Some(0.75));
//! assert_eq!(img.sample(3, 3, 0), Some(0.25));
//!
//! let doubled = img.multiplied(2.0).unwrap();
//! assert_eq!(doubled.sample(0, 0, 0), Some(0.5));
//! assert!(img.divide(0.0).is_err());
//! ```

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::image::Image;
use crate::op::{EPSILON, ImageOp};
use crate::rect::{Point, Rect};
use crate::sample::Sample;
use crate::selection::{ParsedSelection, Scope};

/// Right-hand operand of an elementwise operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a, T: Sample> {
    /// A normalized scalar.
    Scalar(f64),
    /// Another image; its current selection is the source.
    Image(&'a Image<T>),
}

impl<T: Sample> From<f64> for Operand<'_, T> {
    fn from(v: f64) -> Self {
        Operand::Scalar(v)
    }
}

impl<'a, T: Sample> From<&'a Image<T>> for Operand<'a, T> {
    fn from(img: &'a Image<T>) -> Self {
        Operand::Image(img)
    }
}

/// Rows `rect` of a plane with row stride `width`, as parallel row chunks
/// paired with their row index.
fn rows_mut<T: Sample>(
    plane: &mut [T],
    width: usize,
    rect: Rect,
    threads: usize,
) -> impl IndexedParallelIterator<Item = (usize, &mut [T])> {
    let start = rect.y as usize * width;
    let end = rect.bottom() as usize * width;
    let rows = rect.height as usize;
    let min_len = rows.div_ceil(threads.max(1)).max(1);
    plane[start..end]
        .par_chunks_mut(width.max(1))
        .with_min_len(min_len)
        .enumerate()
        .map(move |(i, row)| (rect.y as usize + i, row))
}

impl<T: Sample> Image<T> {
    // ========================================================================
    // Core primitives
    // ========================================================================

    /// Applies `op` with a scalar operand to the samples selected by `scope`.
    ///
    /// `value` is a normalized sample value, converted to the sample type.
    /// Empty selections are a no-op.
    pub fn apply_scalar(&mut self, value: f64, op: ImageOp, scope: &Scope) -> Result<&mut Self> {
        let scalar = T::from_f64(value);
        if op == ImageOp::Div && (value.abs() < EPSILON || scalar.to_f64().abs() < EPSILON) {
            return Err(Error::DivisionByZero);
        }
        if op == ImageOp::Nop {
            return Ok(self);
        }
        let Some(sel) = self.parse_selection(scope) else {
            return Ok(self);
        };
        debug!(%op, value, rect = %sel.rect, channels = sel.channel_count(), "Applying scalar");
        self.map_selection(&sel, move |x| x.apply(op, scalar))
    }

    /// Applies `op` with `source` as operand.
    ///
    /// The source region is the selection of `source` resolved by `scope`.
    /// It is laid over this image with its top-left corner at `target`;
    /// only the part that overlaps this image is processed. Source channels
    /// `first..=last` map onto target channels starting at `target_channel`,
    /// truncated to the channels available in both images.
    pub fn apply_image(
        &mut self,
        source: &Image<T>,
        op: ImageOp,
        target: Point,
        target_channel: usize,
        scope: &Scope,
    ) -> Result<&mut Self> {
        if op == ImageOp::Nop {
            return Ok(self);
        }
        let Some(src) = source.parse_selection(scope) else {
            return Ok(self);
        };
        if target_channel >= self.number_of_channels() {
            return Ok(self);
        }

        // Clip the source rectangle, anchored at `target`, to our bounds.
        let skip_x = (-(target.x as i64)).max(0) as u64;
        let skip_y = (-(target.y as i64)).max(0) as u64;
        let dx = target.x.max(0) as u64;
        let dy = target.y.max(0) as u64;
        let w = (src.rect.width as u64)
            .saturating_sub(skip_x)
            .min((self.width() as u64).saturating_sub(dx));
        let h = (src.rect.height as u64)
            .saturating_sub(skip_y)
            .min((self.height() as u64).saturating_sub(dy));
        if w == 0 || h == 0 {
            return Ok(self);
        }
        let dst_rect = Rect::new(dx as u32, dy as u32, w as u32, h as u32);
        let src_x = (src.rect.x as u64 + skip_x) as usize;
        let src_y = (src.rect.y as u64 + skip_y) as usize;

        let channels = src
            .channel_count()
            .min(self.number_of_channels() - target_channel);
        debug!(%op, rect = %dst_rect, channels, "Applying image");

        let threads = self.threads_for(&ParsedSelection {
            rect: dst_rect,
            first_channel: target_channel,
            last_channel: target_channel + channels - 1,
            max_processors: src.max_processors.or(self.config.max_processors),
        });
        let width = self.width() as usize;
        let src_width = source.width() as usize;
        let mut planes = self.planes_mut()?;

        for k in 0..channels {
            let src_plane = source.buffer.storage.plane(src.first_channel + k);
            let dst_plane = &mut *planes[target_channel + k];
            rows_mut(dst_plane, width, dst_rect, threads).for_each(|(y, row)| {
                let sy = src_y + (y - dst_rect.y as usize);
                let s0 = sy * src_width + src_x;
                let src_row = &src_plane[s0..s0 + dst_rect.width as usize];
                let dst_row = &mut row[dst_rect.x as usize..dst_rect.right() as usize];
                match op {
                    ImageOp::Mov => dst_row.copy_from_slice(src_row),
                    _ => {
                        for (d, &s) in dst_row.iter_mut().zip(src_row) {
                            *d = d.apply(op, s);
                        }
                    }
                }
            });
        }
        drop(planes);
        self.status.add(dst_rect.area() * channels as u64);
        Ok(self)
    }

    /// Applies `op` with the current selection as scope and, for image
    /// operands, the selected point and channel as target.
    pub fn apply<'s>(&mut self, rhs: impl Into<Operand<'s, T>>, op: ImageOp) -> Result<&mut Self>
    where
        T: 's,
    {
        match rhs.into() {
            Operand::Scalar(v) => self.apply_scalar(v, op, &Scope::new()),
            Operand::Image(img) => {
                let (point, channel) = (self.selection.point, self.selection.channel);
                self.apply_image(img, op, point, channel, &Scope::new())
            }
        }
    }

    /// Copy of the current selection with `op` applied.
    pub fn applied<'s>(&self, rhs: impl Into<Operand<'s, T>>, op: ImageOp) -> Result<Image<T>>
    where
        T: 's,
    {
        let mut out = self.selected_subset();
        out.apply(rhs, op)?;
        Ok(out)
    }

    /// Replaces every sample `x` in the selection with `f(x)`, in parallel
    /// row bands.
    pub fn map_selection<F>(&mut self, sel: &ParsedSelection, f: F) -> Result<&mut Self>
    where
        F: Fn(T) -> T + Sync + Send,
    {
        let threads = self.threads_for(sel);
        let width = self.width() as usize;
        let rect = sel.rect;
        let (x0, x1) = (rect.x as usize, rect.right() as usize);
        let mut planes = self.planes_mut()?;
        for c in sel.channels() {
            rows_mut(&mut *planes[c], width, rect, threads).for_each(|(_, row)| {
                for x in &mut row[x0..x1] {
                    *x = f(*x);
                }
            });
        }
        drop(planes);
        trace!(rect = %rect, threads, "Mapped selection");
        self.status.add(rect.area() * sel.channel_count() as u64);
        Ok(self)
    }

    // ========================================================================
    // Whole-selection operations
    // ========================================================================

    /// Sets every selected sample to `value`.
    pub fn fill(&mut self, value: f64) -> Result<&mut Self> {
        self.apply_scalar(value, ImageOp::Mov, &Scope::new())
    }

    /// Copy of the current selection filled with `value`.
    pub fn filled_with(&self, value: f64) -> Result<Image<T>> {
        self.applied(value, ImageOp::Mov)
    }

    /// Sets every selected sample to the minimum sample value.
    pub fn zero(&mut self) -> Result<&mut Self> {
        self.fill(T::min_value().to_f64())
    }

    /// Sets every selected sample to the maximum sample value.
    pub fn one(&mut self) -> Result<&mut Self> {
        self.fill(T::max_value().to_f64())
    }

    /// Replaces every selected sample `x` with `max - x`.
    pub fn invert(&mut self) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        let max = T::max_value().to_f64();
        self.map_selection(&sel, move |x| T::from_f64(max - x.to_f64()))
    }

    /// Inverted copy of the current selection.
    pub fn inverted(&self) -> Result<Image<T>> {
        let mut out = self.selected_subset();
        out.invert()?;
        Ok(out)
    }

    /// Replaces every selected sample with its absolute value.
    pub fn set_absolute_value(&mut self) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        self.map_selection(&sel, Sample::absolute)
    }

    /// Clamps selected samples to `[low, high]` (normalized).
    pub fn truncate(&mut self, low: f64, high: f64) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        self.map_selection(&sel, move |x| {
            let v = x.to_f64();
            if v < low {
                T::from_f64(low)
            } else if v > high {
                T::from_f64(high)
            } else {
                x
            }
        })
    }

    /// Linearly maps the selected samples' extreme values onto
    /// `[low, high]`. A constant selection is set to `low`.
    pub fn rescale(&mut self, low: f64, high: f64) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        let (min, max) = self.selection_extremes(&sel);
        let range = max - min;
        if range.abs() < EPSILON {
            return self.map_selection(&sel, move |_| T::from_f64(low));
        }
        let scale = (high - low) / range;
        self.map_selection(&sel, move |x| T::from_f64(low + (x.to_f64() - min) * scale))
    }

    /// Rescales to `[low, high]` only if some selected sample lies outside
    /// that range.
    pub fn normalize(&mut self, low: f64, high: f64) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        let (min, max) = self.selection_extremes(&sel);
        if min < low || max > high {
            self.rescale(low, high)
        } else {
            Ok(self)
        }
    }

    /// Sets selected samples below `threshold` to the minimum sample value
    /// and all others to the maximum.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pxl_core::{ColorSpace, Image};
    ///
    /// let mut img = Image::from_planes(vec![vec![0.1f32, 0.5, 0.9]], 3, 1, ColorSpace::Gray).unwrap();
    /// img.binarize(0.5).unwrap();
    /// assert_eq!(img.plane(0).unwrap(), &[0.0, 1.0, 1.0]);
    /// ```
    pub fn binarize(&mut self, threshold: f64) -> Result<&mut Self> {
        let Some(sel) = self.parse_selection(&Scope::new()) else {
            return Ok(self);
        };
        self.map_selection(&sel, move |x| {
            if x.to_f64() < threshold {
                T::min_value()
            } else {
                T::max_value()
            }
        })
    }

    /// Binarized copy of the current selection.
    pub fn binarized(&self, threshold: f64) -> Result<Image<T>> {
        let mut out = self.selected_subset();
        out.binarize(threshold)?;
        Ok(out)
    }

    fn selection_extremes(&self, sel: &ParsedSelection) -> (f64, f64) {
        let width = self.width() as usize;
        let rect = sel.rect;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for c in sel.channels() {
            let plane = self.buffer.storage.plane(c);
            for y in rect.y as usize..rect.bottom() as usize {
                let row = &plane[y * width + rect.x as usize..y * width + rect.right() as usize];
                for v in row.iter().map(|s| s.to_f64()) {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }
        (min, max)
    }

    /// Applies the bitwise NOT to the selection.
    pub fn not(&mut self) -> Result<&mut Self> {
        self.apply_scalar(0.0, ImageOp::Not, &Scope::new())
    }

    /// Bitwise NOT copy of the current selection.
    pub fn negated(&self) -> Result<Image<T>> {
        self.applied(0.0, ImageOp::Not)
    }
}

macro_rules! operator_methods {
    ($( $op:ident => $in_place:ident, $copy:ident; )*) => {
        impl<T: Sample> Image<T> {
            $(
                #[doc = concat!("Applies `", stringify!($op), "` in place over the current selection.")]
                pub fn $in_place<'s>(&mut self, rhs: impl Into<Operand<'s, T>>) -> Result<&mut Self>
                where
                    T: 's,
                {
                    self.apply(rhs, ImageOp::$op)
                }

                #[doc = concat!("Copy of the current selection with `", stringify!($op), "` applied.")]
                pub fn $copy<'s>(&self, rhs: impl Into<Operand<'s, T>>) -> Result<Image<T>>
                where
                    T: 's,
                {
                    self.applied(rhs, ImageOp::$op)
                }
            )*
        }
    };
}

operator_methods! {
    Mov => assign, assigned;
    Add => add, added;
    Sub => subtract, subtracted;
    Mul => multiply, multiplied;
    Div => divide, divided;
    Pow => raise, raised;
    Dif => dif, difference;
    Min => min_with, minimum;
    Max => max_with, maximum;
    Or => or, ored;
    And => and, anded;
    Xor => xor, xored;
    Nor => nor, nored;
    Nand => nand, nanded;
    Xnor => xnor, xnored;
    ColorBurn => color_burn, color_burned;
    LinearBurn => linear_burn, linear_burned;
    Screen => screen, screened;
    ColorDodge => color_dodge, color_dodged;
    Overlay => overlay, overlaid;
    SoftLight => soft_light, soft_lit;
    HardLight => hard_light, hard_lit;
    VividLight => vivid_light, vivid_lit;
    LinearLight => linear_light, linear_lit;
    PinLight => pin_light, pin_lit;
    Exclusion => exclusion, excluded;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorSpace;
    use approx::assert_relative_eq;

    fn gray(values: &[f32], width: u32) -> Image<f32> {
        let height = values.len() as u32 / width;
        Image::from_planes(vec![values.to_vec()], width, height, ColorSpace::Gray).unwrap()
    }

    #[test]
    fn test_fill_rect_then_mean() {
        let mut img = Image::<f32>::filled(4, 4, 1, ColorSpace::Gray, 0.25);
        img.apply_scalar(0.75, ImageOp::Mov, &Scope::new().rect(Rect::from_corners(1, 1, 3, 3)))
            .unwrap();
        let sum: f64 = img.samples(0).unwrap().map(|v| v as f64).sum();
        assert_relative_eq!(sum / 16.0, 0.375, epsilon = 1e-12);
    }

    #[test]
    fn test_binarize_threshold_is_exclusive_low() {
        let mut img = gray(&[0.1, 0.5, 0.9], 3);
        img.binarize(0.5).unwrap();
        assert_eq!(img.plane(0).unwrap(), &[0.0, 1.0, 1.0]);

        let mut bytes = Image::from_planes(vec![vec![25u8, 128, 230]], 3, 1, ColorSpace::Gray).unwrap();
        bytes.binarize(0.5).unwrap();
        assert_eq!(bytes.plane(0).unwrap(), &[0, 255, 255]);
    }

    #[test]
    fn test_scalar_div_by_zero_fails_before_mutation() {
        let mut img = gray(&[0.5; 4], 2);
        let err = img.divide(0.0).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
        assert_eq!(img.plane(0).unwrap(), &[0.5; 4]);

        let mut bytes = Image::<u8>::new(2, 2, ColorSpace::Gray);
        assert!(bytes.divide(0.001).is_err()); // rounds to 0 in u8
    }

    #[test]
    fn test_scalar_pow_zero_is_allowed() {
        let mut img = gray(&[0.5; 4], 2);
        img.raise(0.0).unwrap();
        assert_eq!(img.plane(0).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_image_div_by_zero_saturates() {
        let mut a = gray(&[0.5, 0.5, 0.5, 0.5], 2);
        let b = gray(&[0.25, 0.0, 1.0, 0.0], 2);
        a.divide(&b).unwrap();
        assert_eq!(a.plane(0).unwrap(), &[2.0, 1.0, 0.5, 1.0]);
    }

    #[test]
    fn test_apply_image_anchor_and_clip() {
        let mut dst = Image::<u8>::new(4, 4, ColorSpace::Gray);
        let src = Image::<u8>::filled(3, 3, 1, ColorSpace::Gray, 9);
        dst.apply_image(&src, ImageOp::Mov, Point::new(2, -1), 0, &Scope::new())
            .unwrap();
        // Overlap: columns 2..4, rows 0..2
        assert_eq!(dst.row(0, 0), Some(&[0u8, 0, 9, 9][..]));
        assert_eq!(dst.row(1, 0), Some(&[0u8, 0, 9, 9][..]));
        assert_eq!(dst.row(2, 0), Some(&[0u8, 0, 0, 0][..]));
    }

    #[test]
    fn test_apply_image_source_rect_and_channels() {
        let mut dst = Image::<f32>::new(2, 2, ColorSpace::Rgb);
        let mut src = Image::<f32>::new(4, 4, ColorSpace::Rgb);
        src.set_pixel(3, 3, &[0.1, 0.2, 0.3]).unwrap();
        let scope = Scope::new().rect(Rect::new(2, 2, 2, 2)).channels(1, 2);
        dst.apply_image(&src, ImageOp::Add, Point::new(0, 0), 0, &scope)
            .unwrap();
        assert_eq!(dst.pixel(1, 1).unwrap().as_slice(), &[0.2, 0.3, 0.0]);

        // Target channel near the end truncates the channel count
        let mut dst = Image::<f32>::new(2, 2, ColorSpace::Rgb);
        dst.apply_image(&src, ImageOp::Mov, Point::new(0, 0), 2, &scope).unwrap();
        assert_eq!(dst.pixel(1, 1).unwrap().as_slice(), &[0.0, 0.0, 0.2]);
    }

    #[test]
    fn test_min_max_with_image() {
        let mut a = gray(&[0.2, 0.8], 2);
        let b = gray(&[0.5, 0.5], 2);
        let lo = a.minimum(&b).unwrap();
        assert_eq!(lo.plane(0).unwrap(), &[0.2, 0.5]);
        a.max_with(&b).unwrap();
        assert_eq!(a.plane(0).unwrap(), &[0.5, 0.8]);
    }

    #[test]
    fn test_non_mutating_counterparts() {
        let a = gray(&[0.25; 4], 2);
        let b = a.added(0.5).unwrap();
        assert_eq!(a.plane(0).unwrap(), &[0.25; 4]);
        assert_eq!(b.plane(0).unwrap(), &[0.75; 4]);
        let c = a.subtracted(0.25).unwrap();
        assert_eq!(c.plane(0).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_added_uses_selection_subset() {
        let mut a = gray(&[0.0; 16], 4);
        a.select_rectangle(Rect::new(1, 1, 2, 2));
        let b = a.added(1.0).unwrap();
        assert_eq!((b.width(), b.height()), (2, 2));
        assert_eq!(b.plane(0).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_mutation_detaches_clones() {
        let mut a = gray(&[0.5; 4], 2);
        let b = a.clone();
        a.multiply(0.5).unwrap();
        assert_eq!(b.plane(0).unwrap(), &[0.5; 4]);
        assert_eq!(a.plane(0).unwrap(), &[0.25; 4]);
    }

    #[test]
    fn test_integer_saturation_through_image() {
        let mut a = Image::<u8>::filled(2, 1, 1, ColorSpace::Gray, 200);
        a.add(0.5).unwrap();
        assert_eq!(a.plane(0).unwrap(), &[255, 255]);
        a.subtract(1.0).unwrap();
        assert_eq!(a.plane(0).unwrap(), &[0, 0]);
    }

    #[test]
    fn test_invert_truncate_rescale() {
        let mut img = gray(&[0.0, 0.25, 0.5, 1.0], 4);
        img.invert().unwrap();
        assert_eq!(img.plane(0).unwrap(), &[1.0, 0.75, 0.5, 0.0]);
        img.truncate(0.25, 0.75).unwrap();
        assert_eq!(img.plane(0).unwrap(), &[0.75, 0.75, 0.5, 0.25]);
        img.rescale(0.0, 1.0).unwrap();
        assert_eq!(img.plane(0).unwrap(), &[1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_normalize_only_when_out_of_range() {
        let mut inside = gray(&[0.2, 0.4], 2);
        inside.normalize(0.0, 1.0).unwrap();
        assert_eq!(inside.plane(0).unwrap(), &[0.2, 0.4]);

        let mut outside = gray(&[-1.0, 3.0], 2);
        outside.normalize(0.0, 1.0).unwrap();
        assert_eq!(outside.plane(0).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_absolute_value_and_not() {
        let mut img = gray(&[-0.5, 0.25], 2);
        img.set_absolute_value().unwrap();
        assert_eq!(img.plane(0).unwrap(), &[0.5, 0.25]);

        let mut bytes = Image::from_planes(vec![vec![0u8, 0xF0]], 2, 1, ColorSpace::Gray).unwrap();
        bytes.not().unwrap();
        assert_eq!(bytes.plane(0).unwrap(), &[0xFF, 0x0F]);
    }

    #[test]
    fn test_composition_methods() {
        let base = gray(&[0.2, 0.6, 0.9, 0.4], 2);
        let layer = gray(&[0.5, 0.3, 0.8, 0.1], 2);

        let screened = base.screened(&layer).unwrap();
        let mut screen = base.deep_clone().unwrap();
        screen.apply(&layer, ImageOp::Screen).unwrap();
        assert_eq!(screened.plane(0), screen.plane(0));
        assert_relative_eq!(screened.sample(0, 0, 0).unwrap(), 0.6, epsilon = 1e-6);

        let mut overlay = base.deep_clone().unwrap();
        overlay.overlay(0.25).unwrap();
        assert_eq!(overlay.plane(0), base.overlaid(0.25).unwrap().plane(0));
        assert_ne!(overlay.plane(0), base.plane(0));

        let lit = base.soft_lit(&layer).unwrap();
        assert_relative_eq!(lit.sample(0, 1, 0).unwrap(), 1.0 - 0.1 * 0.7, epsilon = 1e-6);
        assert_relative_eq!(base.excluded(0.0).unwrap().sample(1, 0, 0).unwrap(), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_status_records_work() {
        let mut img = gray(&[0.0; 16], 4);
        img.fill(0.5).unwrap();
        assert_eq!(img.status().count(), 16);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let n = 256 * 64;
        let values: Vec<f32> = (0..n).map(|i| (i % 97) as f32 / 97.0).collect();
        let mut a = gray(&values, 256);
        let mut b = a.deep_clone().unwrap();
        a.apply_scalar(0.3, ImageOp::Screen, &Scope::new().max_processors(1)).unwrap();

        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        pool.install(|| {
            let sel = b.parse_selection(&Scope::new()).unwrap();
            assert_eq!(b.threads_for(&sel), 4);
            b.apply_scalar(0.3, ImageOp::Screen, &Scope::new()).unwrap();
        });
        assert_eq!(a.plane(0).unwrap(), b.plane(0).unwrap());
    }
}
