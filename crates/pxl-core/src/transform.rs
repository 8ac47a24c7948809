//! Transformation seams.
//!
//! Geometric and frequency-domain algorithms live outside this crate. They
//! plug in through [`ImageTransformation`] (one-way) and
//! [`BidirectionalTransformation`] (forward/inverse pairs) and are run on the
//! current selection with [`Image::transform`].
//!
//! When the whole image is selected the transformation receives the image
//! itself and may change its geometry. Otherwise the selection is extracted,
//! transformed, and the result is copied back over the selected rectangle
//! and channel range, clipped to the image.

use tracing::debug;

use crate::error::Result;
use crate::image::Image;
use crate::op::ImageOp;
use crate::rect::Point;
use crate::sample::Sample;
use crate::selection::Scope;

/// A one-way image transformation.
pub trait ImageTransformation<T: Sample> {
    /// Transforms `image` in place.
    fn apply(&self, image: &mut Image<T>) -> Result<()>;
}

impl<T, F> ImageTransformation<T> for F
where
    T: Sample,
    F: Fn(&mut Image<T>) -> Result<()>,
{
    fn apply(&self, image: &mut Image<T>) -> Result<()> {
        self(image)
    }
}

/// A transformation with an inverse.
pub trait BidirectionalTransformation<T: Sample> {
    /// Direct transform.
    fn forward(&self, image: &mut Image<T>) -> Result<()>;
    /// Inverse transform.
    fn inverse(&self, image: &mut Image<T>) -> Result<()>;
}

impl<T: Sample> Image<T> {
    /// Applies `transformation` to the current selection.
    pub fn transform<X: ImageTransformation<T> + ?Sized>(&mut self, transformation: &X) -> Result<&mut Self> {
        self.transform_selection(|img| transformation.apply(img))
    }

    /// Applies the direct transform of `transformation` to the selection.
    pub fn transform_forward<X: BidirectionalTransformation<T> + ?Sized>(
        &mut self,
        transformation: &X,
    ) -> Result<&mut Self> {
        self.transform_selection(|img| transformation.forward(img))
    }

    /// Applies the inverse transform of `transformation` to the selection.
    pub fn transform_inverse<X: BidirectionalTransformation<T> + ?Sized>(
        &mut self,
        transformation: &X,
    ) -> Result<&mut Self> {
        self.transform_selection(|img| transformation.inverse(img))
    }

    fn transform_selection<F>(&mut self, run: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Image<T>) -> Result<()>,
    {
        if self.is_empty() {
            return Ok(self);
        }
        if self.is_completely_selected() {
            debug!(width = self.width(), height = self.height(), "Transforming image");
            let work = self.number_of_samples() as u64;
            run(self)?;
            self.status.add(work);
            return Ok(self);
        }

        let rect = self.selected_rectangle();
        let first = self.selection.first_channel;
        debug!(%rect, first, "Transforming selection");
        let mut subset = self.selected_subset();
        run(&mut subset)?;
        let target = Point::new(rect.x as i32, rect.y as i32);
        self.apply_image(&subset, ImageOp::Mov, target, first, &Scope::new())?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorSpace, Rect};

    struct Mirror;

    impl BidirectionalTransformation<u8> for Mirror {
        fn forward(&self, image: &mut Image<u8>) -> Result<()> {
            for y in 0..image.height() {
                for c in 0..image.number_of_channels() {
                    let mut row = image.row(y, c).unwrap_or_default().to_vec();
                    row.reverse();
                    image.set_row(y, c, &row)?;
                }
            }
            Ok(())
        }

        fn inverse(&self, image: &mut Image<u8>) -> Result<()> {
            self.forward(image)
        }
    }

    fn ramp() -> Image<u8> {
        Image::from_planes(vec![(0..16).collect()], 4, 4, ColorSpace::Gray).unwrap()
    }

    #[test]
    fn test_transform_whole_image() {
        let mut img = ramp();
        img.transform_forward(&Mirror).unwrap();
        assert_eq!(img.row(0, 0), Some(&[3u8, 2, 1, 0][..]));
        img.transform_inverse(&Mirror).unwrap();
        assert_eq!(img.row(0, 0), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(img.status().count(), 32);
    }

    #[test]
    fn test_transform_partial_selection_writes_back() {
        let mut img = ramp();
        img.select_rectangle(Rect::new(1, 1, 2, 2));
        img.transform_forward(&Mirror).unwrap();
        assert_eq!(img.row(1, 0), Some(&[4u8, 6, 5, 7][..]));
        assert_eq!(img.row(0, 0), Some(&[0u8, 1, 2, 3][..]));
    }

    #[test]
    fn test_closure_transformation() {
        let mut img = ramp();
        let zero = |i: &mut Image<u8>| i.zero().map(|_| ());
        img.transform(&zero).unwrap();
        assert!(img.plane(0).unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_transformation_error_leaves_image() {
        let mut img = ramp();
        img.select_rectangle(Rect::new(0, 0, 2, 2));
        let fail = |_: &mut Image<u8>| -> Result<()> { Err(crate::Error::other("boom")) };
        assert!(img.transform(&fail).is_err());
        assert_eq!(img.row(0, 0), Some(&[0u8, 1, 2, 3][..]));
    }
}
