//! Position-aware cursors over samples and pixels.
//!
//! A cursor walks the positions of an image plane (or of all planes at once
//! for pixel cursors) and is parameterized by three independent choices:
//!
//! | parameter | options                                              |
//! |-----------|------------------------------------------------------|
//! | access    | `&[T]` (shared) or `&mut [T]` (exclusive)            |
//! | span      | [`Full`] plane or [`RectSpan`] region of interest    |
//! | filter    | [`NoFilter`] or a [`Predicate`] on the current value |
//!
//! Region cursors wrap at row boundaries: stepping past the last column of
//! a row moves to the first column of the next row, stepping back before the
//! first column moves to the last column of the previous row.
//!
//! Filtered cursors skip positions rejected by the predicate whenever they
//! are created or moved, so they only ever rest on accepted positions or on
//! the end of the iteration.
//!
//! Exclusive cursors are obtained through `&mut Image`, which makes the
//! pixel buffer unique first.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image, Rect, Scope};
//!
//! let mut image = Image::<f32>::new(4, 4, ColorSpace::Gray);
//! {
//!     let mut cursor = image.roi_samples_mut(&Scope::new().rect(Rect::new(1, 1, 2, 2))).unwrap();
//!     while cursor.is_active() {
//!         cursor.set(1.0);
//!         cursor.increment();
//!     }
//! }
//! let total: f32 = image.samples(0).unwrap().sum();
//! assert_eq!(total, 4.0);
//!
//! let bright = image.samples(0).unwrap().filtered(|v: &f32| *v > 0.5);
//! assert_eq!(bright.position(), (1, 1));
//! ```

use std::fmt;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::image::{Image, PixelValue};
use crate::rect::Rect;
use crate::sample::Sample;
use crate::selection::Scope;

// ============================================================================
// Building blocks
// ============================================================================

/// Read access to a plane.
pub trait SampleAccess<T> {
    /// Sample at linear index `index`.
    fn load(&self, index: usize) -> T;
}

impl<T: Copy> SampleAccess<T> for &[T] {
    #[inline]
    fn load(&self, index: usize) -> T {
        self[index]
    }
}

impl<T: Copy> SampleAccess<T> for &mut [T] {
    #[inline]
    fn load(&self, index: usize) -> T {
        self[index]
    }
}

/// Accepts or rejects a value.
pub trait Filter<V: ?Sized> {
    /// Returns `true` if the cursor may rest on `value`.
    fn accept(&self, value: &V) -> bool;
}

/// Accepts every position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl<V: ?Sized> Filter<V> for NoFilter {
    #[inline]
    fn accept(&self, _value: &V) -> bool {
        true
    }
}

/// Accepts positions where the wrapped closure returns `true`.
#[derive(Clone, Copy)]
pub struct Predicate<F>(pub F);

impl<V: ?Sized, F: Fn(&V) -> bool> Filter<V> for Predicate<F> {
    #[inline]
    fn accept(&self, value: &V) -> bool {
        (self.0)(value)
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// The set of linear positions a cursor visits, in order.
pub trait Span: Clone + fmt::Debug {
    /// First position, or `end()` if the span is empty.
    fn first(&self) -> usize;
    /// Position one past the last.
    fn end(&self) -> usize;
    /// Position after `pos`.
    fn next(&self, pos: usize) -> usize;
    /// Position before `pos`, `None` before the first.
    fn prev(&self, pos: usize) -> Option<usize>;
    /// Number of positions.
    fn count(&self) -> usize;
    /// Ordinal of `pos`; `count()` for `end()`.
    fn ordinal(&self, pos: usize) -> usize;
    /// Position with ordinal `n`; `end()` when `n >= count()`.
    fn at(&self, n: usize) -> usize;
}

/// Every position of a plane.
#[derive(Debug, Clone, Copy)]
pub struct Full {
    len: usize,
}

impl Full {
    /// Span over `len` positions.
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Span for Full {
    #[inline]
    fn first(&self) -> usize {
        0
    }
    #[inline]
    fn end(&self) -> usize {
        self.len
    }
    #[inline]
    fn next(&self, pos: usize) -> usize {
        (pos + 1).min(self.len)
    }
    #[inline]
    fn prev(&self, pos: usize) -> Option<usize> {
        pos.checked_sub(1)
    }
    #[inline]
    fn count(&self) -> usize {
        self.len
    }
    #[inline]
    fn ordinal(&self, pos: usize) -> usize {
        pos.min(self.len)
    }
    #[inline]
    fn at(&self, n: usize) -> usize {
        n.min(self.len)
    }
}

/// Positions inside a rectangle of a plane with row stride `stride`.
#[derive(Debug, Clone, Copy)]
pub struct RectSpan {
    stride: usize,
    left: usize,
    right: usize,
    top: usize,
    bottom: usize,
}

impl RectSpan {
    /// Span over `rect` in a plane `stride` pixels wide.
    pub fn new(rect: Rect, stride: usize) -> Self {
        Self {
            stride,
            left: rect.x as usize,
            right: rect.right() as usize,
            top: rect.y as usize,
            bottom: rect.bottom() as usize,
        }
    }

    /// A span with no positions.
    pub fn empty() -> Self {
        Self::new(Rect::default(), 0)
    }

    #[inline]
    fn row_width(&self) -> usize {
        self.right - self.left
    }
}

impl Span for RectSpan {
    #[inline]
    fn first(&self) -> usize {
        if self.count() == 0 {
            self.end()
        } else {
            self.top * self.stride + self.left
        }
    }

    #[inline]
    fn end(&self) -> usize {
        self.bottom * self.stride + self.left
    }

    #[inline]
    fn next(&self, pos: usize) -> usize {
        if pos >= self.end() {
            return self.end();
        }
        let x = pos % self.stride;
        if x + 1 >= self.right {
            pos - x + self.stride + self.left
        } else {
            pos + 1
        }
    }

    #[inline]
    fn prev(&self, pos: usize) -> Option<usize> {
        if self.count() == 0 {
            return None;
        }
        if pos >= self.end() {
            return Some((self.bottom - 1) * self.stride + self.right - 1);
        }
        let (x, y) = (pos % self.stride, pos / self.stride);
        if x > self.left {
            Some(pos - 1)
        } else if y > self.top {
            Some((y - 1) * self.stride + self.right - 1)
        } else {
            None
        }
    }

    #[inline]
    fn count(&self) -> usize {
        self.row_width() * (self.bottom - self.top)
    }

    #[inline]
    fn ordinal(&self, pos: usize) -> usize {
        if pos >= self.end() {
            return self.count();
        }
        let (x, y) = (pos % self.stride, pos / self.stride);
        (y - self.top) * self.row_width() + (x - self.left)
    }

    #[inline]
    fn at(&self, n: usize) -> usize {
        if n >= self.count() {
            return self.end();
        }
        let w = self.row_width();
        (self.top + n / w) * self.stride + self.left + n % w
    }
}

// ============================================================================
// Sample cursors
// ============================================================================

/// Cursor over the samples of one channel.
pub struct SampleCursor<T, A, S, F> {
    data: A,
    span: S,
    filter: F,
    stride: usize,
    pos: usize,
    _sample: PhantomData<T>,
}

/// Shared cursor over a whole plane.
pub type SampleIter<'a, T> = SampleCursor<T, &'a [T], Full, NoFilter>;
/// Exclusive cursor over a whole plane.
pub type SampleIterMut<'a, T> = SampleCursor<T, &'a mut [T], Full, NoFilter>;
/// Shared cursor over a region of a plane.
pub type RoiSampleIter<'a, T> = SampleCursor<T, &'a [T], RectSpan, NoFilter>;
/// Exclusive cursor over a region of a plane.
pub type RoiSampleIterMut<'a, T> = SampleCursor<T, &'a mut [T], RectSpan, NoFilter>;

impl<T, A, S, F> SampleCursor<T, A, S, F>
where
    T: Sample,
    A: SampleAccess<T>,
    S: Span,
    F: Filter<T>,
{
    /// Creates a cursor resting on the first accepted position.
    pub fn new(data: A, span: S, filter: F, stride: usize) -> Self {
        let pos = span.first();
        let mut cursor = Self {
            data,
            span,
            filter,
            stride,
            pos,
            _sample: PhantomData,
        };
        cursor.seek_forward();
        cursor
    }

    fn seek_forward(&mut self) {
        while self.is_active() && !self.filter.accept(&self.data.load(self.pos)) {
            self.pos = self.span.next(self.pos);
        }
    }

    fn seek_backward(&mut self) {
        while self.is_active() && !self.filter.accept(&self.data.load(self.pos)) {
            match self.span.prev(self.pos) {
                Some(p) => self.pos = p,
                None => {
                    self.pos = self.span.end();
                    break;
                }
            }
        }
    }

    /// Returns `true` if the cursor refers to pixel data.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.stride > 0
    }

    /// Returns `true` while the cursor is before the end of its span.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pos < self.span.end()
    }

    /// Linear index of the current position.
    #[inline]
    pub fn index(&self) -> usize {
        self.pos
    }

    /// Pixel coordinates of the current position.
    #[inline]
    pub fn position(&self) -> (u32, u32) {
        let stride = self.stride.max(1);
        ((self.pos % stride) as u32, (self.pos / stride) as u32)
    }

    /// Current sample, `None` past the end.
    #[inline]
    pub fn get(&self) -> Option<T> {
        self.is_active().then(|| self.data.load(self.pos))
    }

    /// Moves to the next accepted position.
    pub fn increment(&mut self) {
        if self.is_active() {
            self.pos = self.span.next(self.pos);
            self.seek_forward();
        }
    }

    /// Moves to the previous accepted position. Stepping back from the first
    /// position ends the iteration.
    pub fn decrement(&mut self) {
        match self.span.prev(self.pos) {
            Some(p) => {
                self.pos = p;
                self.seek_backward();
            }
            None => self.pos = self.span.end(),
        }
    }

    /// Moves `n` positions forward (or back, for negative `n`), then to the
    /// nearest accepted position in the direction of travel.
    pub fn advance(&mut self, n: isize) {
        let ordinal = self.span.ordinal(self.pos) as isize + n;
        if ordinal < 0 {
            self.pos = self.span.end();
            return;
        }
        self.pos = self.span.at(ordinal as usize);
        if n >= 0 {
            self.seek_forward();
        } else {
            self.seek_backward();
        }
    }

    /// Replaces the filter; the cursor moves forward to the first position
    /// the new predicate accepts.
    pub fn filtered<G>(self, predicate: G) -> SampleCursor<T, A, S, Predicate<G>>
    where
        G: Fn(&T) -> bool,
    {
        let mut cursor = SampleCursor {
            data: self.data,
            span: self.span,
            filter: Predicate(predicate),
            stride: self.stride,
            pos: self.pos,
            _sample: PhantomData,
        };
        cursor.seek_forward();
        cursor
    }
}

impl<T, S, F> SampleCursor<T, &mut [T], S, F>
where
    T: Sample,
    S: Span,
    F: Filter<T>,
{
    /// Writes the current sample. Returns `false` past the end.
    pub fn set(&mut self, value: T) -> bool {
        if self.is_active() {
            self.data[self.pos] = value;
            true
        } else {
            false
        }
    }

    /// Mutable reference to the current sample.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.is_active() {
            Some(&mut self.data[self.pos])
        } else {
            None
        }
    }
}

impl<'a, T, S, F> Iterator for SampleCursor<T, &'a [T], S, F>
where
    T: Sample,
    S: Span,
    F: Filter<T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let value = self.get()?;
        self.increment();
        Some(value)
    }
}

impl<T: Sample, A: SampleAccess<T> + Clone, S: Span, F: Clone> Clone for SampleCursor<T, A, S, F> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            span: self.span.clone(),
            filter: self.filter.clone(),
            stride: self.stride,
            pos: self.pos,
            _sample: PhantomData,
        }
    }
}

/// Cursors are equal when they rest on the same position.
impl<T, A, S, F, A2, S2, F2> PartialEq<SampleCursor<T, A2, S2, F2>> for SampleCursor<T, A, S, F> {
    fn eq(&self, other: &SampleCursor<T, A2, S2, F2>) -> bool {
        self.pos == other.pos
    }
}

impl<T, A, S: fmt::Debug, F> fmt::Debug for SampleCursor<T, A, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleCursor")
            .field("pos", &self.pos)
            .field("span", &self.span)
            .finish()
    }
}

// ============================================================================
// Pixel cursors
// ============================================================================

/// Cursor over whole pixels, advancing every channel in lock step.
pub struct PixelCursor<T, A, S, F> {
    planes: SmallVec<[A; 4]>,
    span: S,
    filter: F,
    stride: usize,
    pos: usize,
    _sample: PhantomData<T>,
}

/// Shared cursor over every pixel.
pub type PixelIter<'a, T> = PixelCursor<T, &'a [T], Full, NoFilter>;
/// Exclusive cursor over every pixel.
pub type PixelIterMut<'a, T> = PixelCursor<T, &'a mut [T], Full, NoFilter>;
/// Shared cursor over the pixels of a region.
pub type RoiPixelIter<'a, T> = PixelCursor<T, &'a [T], RectSpan, NoFilter>;
/// Exclusive cursor over the pixels of a region.
pub type RoiPixelIterMut<'a, T> = PixelCursor<T, &'a mut [T], RectSpan, NoFilter>;

impl<T, A, S, F> PixelCursor<T, A, S, F>
where
    T: Sample,
    A: SampleAccess<T>,
    S: Span,
    F: Filter<[T]>,
{
    /// Creates a cursor resting on the first accepted pixel.
    pub fn new(planes: SmallVec<[A; 4]>, span: S, filter: F, stride: usize) -> Self {
        let pos = span.first();
        let mut cursor = Self {
            planes,
            span,
            filter,
            stride,
            pos,
            _sample: PhantomData,
        };
        cursor.seek_forward();
        cursor
    }

    fn load(&self, pos: usize) -> PixelValue<T> {
        self.planes.iter().map(|p| p.load(pos)).collect()
    }

    fn accepted(&self) -> bool {
        self.filter.accept(&self.load(self.pos))
    }

    fn seek_forward(&mut self) {
        while self.is_active() && !self.accepted() {
            self.pos = self.span.next(self.pos);
        }
    }

    fn seek_backward(&mut self) {
        while self.is_active() && !self.accepted() {
            match self.span.prev(self.pos) {
                Some(p) => self.pos = p,
                None => {
                    self.pos = self.span.end();
                    break;
                }
            }
        }
    }

    /// Returns `true` if the cursor refers to pixel data.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.stride > 0 && !self.planes.is_empty()
    }

    /// Returns `true` while the cursor is before the end of its span.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.planes.is_empty() && self.pos < self.span.end()
    }

    /// Linear index of the current position.
    #[inline]
    pub fn index(&self) -> usize {
        self.pos
    }

    /// Pixel coordinates of the current position.
    #[inline]
    pub fn position(&self) -> (u32, u32) {
        let stride = self.stride.max(1);
        ((self.pos % stride) as u32, (self.pos / stride) as u32)
    }

    /// Samples of the current pixel, `None` past the end.
    pub fn get(&self) -> Option<PixelValue<T>> {
        self.is_active().then(|| self.load(self.pos))
    }

    /// Sample of channel `channel` of the current pixel.
    pub fn channel(&self, channel: usize) -> Option<T> {
        if !self.is_active() {
            return None;
        }
        self.planes.get(channel).map(|p| p.load(self.pos))
    }

    /// Moves to the next accepted pixel.
    pub fn increment(&mut self) {
        if self.is_active() {
            self.pos = self.span.next(self.pos);
            self.seek_forward();
        }
    }

    /// Moves to the previous accepted pixel. Stepping back from the first
    /// pixel ends the iteration.
    pub fn decrement(&mut self) {
        match self.span.prev(self.pos) {
            Some(p) => {
                self.pos = p;
                self.seek_backward();
            }
            None => self.pos = self.span.end(),
        }
    }

    /// Moves `n` pixels forward (or back), then to the nearest accepted
    /// pixel in the direction of travel.
    pub fn advance(&mut self, n: isize) {
        let ordinal = self.span.ordinal(self.pos) as isize + n;
        if ordinal < 0 {
            self.pos = self.span.end();
            return;
        }
        self.pos = self.span.at(ordinal as usize);
        if n >= 0 {
            self.seek_forward();
        } else {
            self.seek_backward();
        }
    }

    /// Replaces the filter; the cursor moves forward to the first pixel the
    /// new predicate accepts.
    pub fn filtered<G>(self, predicate: G) -> PixelCursor<T, A, S, Predicate<G>>
    where
        G: Fn(&[T]) -> bool,
    {
        let mut cursor = PixelCursor {
            planes: self.planes,
            span: self.span,
            filter: Predicate(predicate),
            stride: self.stride,
            pos: self.pos,
            _sample: PhantomData,
        };
        cursor.seek_forward();
        cursor
    }
}

impl<T, S, F> PixelCursor<T, &mut [T], S, F>
where
    T: Sample,
    S: Span,
    F: Filter<[T]>,
{
    /// Writes the current pixel channel by channel. Returns `false` past the
    /// end.
    pub fn set(&mut self, values: &[T]) -> bool {
        if !self.is_active() {
            return false;
        }
        let pos = self.pos;
        for (plane, &v) in self.planes.iter_mut().zip(values) {
            plane[pos] = v;
        }
        true
    }

    /// Writes one channel of the current pixel.
    pub fn set_channel(&mut self, channel: usize, value: T) -> bool {
        if !self.is_active() {
            return false;
        }
        let pos = self.pos;
        match self.planes.get_mut(channel) {
            Some(plane) => {
                plane[pos] = value;
                true
            }
            None => false,
        }
    }
}

impl<'a, T, S, F> Iterator for PixelCursor<T, &'a [T], S, F>
where
    T: Sample,
    S: Span,
    F: Filter<[T]>,
{
    type Item = PixelValue<T>;

    fn next(&mut self) -> Option<PixelValue<T>> {
        let value = self.get()?;
        self.increment();
        Some(value)
    }
}

/// Cursors are equal when they rest on the same position.
impl<T, A, S, F, A2, S2, F2> PartialEq<PixelCursor<T, A2, S2, F2>> for PixelCursor<T, A, S, F> {
    fn eq(&self, other: &PixelCursor<T, A2, S2, F2>) -> bool {
        self.pos == other.pos
    }
}

impl<T, A, S: fmt::Debug, F> fmt::Debug for PixelCursor<T, A, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelCursor")
            .field("pos", &self.pos)
            .field("channels", &self.planes.len())
            .field("span", &self.span)
            .finish()
    }
}

// ============================================================================
// Image entry points
// ============================================================================

impl<T: Sample> Image<T> {
    fn roi_span(&self, scope: &Scope) -> (RectSpan, usize) {
        match self.parse_selection(scope) {
            Some(sel) => (RectSpan::new(sel.rect, self.width() as usize), sel.first_channel),
            None => (RectSpan::empty(), 0),
        }
    }

    /// Shared cursor over every sample of channel `channel`.
    pub fn samples(&self, channel: usize) -> Result<SampleIter<'_, T>> {
        let plane = self
            .plane(channel)
            .ok_or(Error::channel_out_of_range(channel, self.number_of_channels()))?;
        Ok(SampleCursor::new(plane, Full::new(plane.len()), NoFilter, self.width() as usize))
    }

    /// Exclusive cursor over every sample of channel `channel`.
    pub fn samples_mut(&mut self, channel: usize) -> Result<SampleIterMut<'_, T>> {
        let stride = self.width() as usize;
        let plane = self.plane_mut(channel)?;
        let len = plane.len();
        Ok(SampleCursor::new(plane, Full::new(len), NoFilter, stride))
    }

    /// Shared cursor over the selected region of the first channel of
    /// `scope`. Empty selections give a cursor that is never active.
    pub fn roi_samples(&self, scope: &Scope) -> RoiSampleIter<'_, T> {
        let (span, channel) = self.roi_span(scope);
        let plane = self.plane(channel).unwrap_or(&[]);
        SampleCursor::new(plane, span, NoFilter, self.width() as usize)
    }

    /// Exclusive cursor over the selected region of the first channel of
    /// `scope`.
    pub fn roi_samples_mut(&mut self, scope: &Scope) -> Result<RoiSampleIterMut<'_, T>> {
        let (span, channel) = self.roi_span(scope);
        let stride = self.width() as usize;
        if self.number_of_channels() == 0 {
            let empty: &mut [T] = &mut [];
            return Ok(SampleCursor::new(empty, RectSpan::empty(), NoFilter, stride));
        }
        let plane = self.plane_mut(channel)?;
        Ok(SampleCursor::new(plane, span, NoFilter, stride))
    }

    /// Shared cursor over every pixel.
    pub fn pixels(&self) -> PixelIter<'_, T> {
        let planes: SmallVec<[&[T]; 4]> = self.planes().into_iter().collect();
        PixelCursor::new(planes, Full::new(self.number_of_pixels()), NoFilter, self.width() as usize)
    }

    /// Exclusive cursor over every pixel.
    pub fn pixels_mut(&mut self) -> Result<PixelIterMut<'_, T>> {
        let (stride, len) = (self.width() as usize, self.number_of_pixels());
        let planes: SmallVec<[&mut [T]; 4]> = self.planes_mut()?.into_iter().collect();
        Ok(PixelCursor::new(planes, Full::new(len), NoFilter, stride))
    }

    /// Shared cursor over the pixels of the selected region.
    pub fn roi_pixels(&self, scope: &Scope) -> RoiPixelIter<'_, T> {
        let (span, _) = self.roi_span(scope);
        let planes: SmallVec<[&[T]; 4]> = self.planes().into_iter().collect();
        PixelCursor::new(planes, span, NoFilter, self.width() as usize)
    }

    /// Exclusive cursor over the pixels of the selected region.
    pub fn roi_pixels_mut(&mut self, scope: &Scope) -> Result<RoiPixelIterMut<'_, T>> {
        let (span, _) = self.roi_span(scope);
        let stride = self.width() as usize;
        let planes: SmallVec<[&mut [T]; 4]> = self.planes_mut()?.into_iter().collect();
        Ok(PixelCursor::new(planes, span, NoFilter, stride))
    }
}
