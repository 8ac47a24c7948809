//! Copy-on-write image handles.
//!
//! An [`Image`] is a thin handle around a shared [`PixelBuffer`]. Cloning an
//! image shares the buffer; the first mutation through either handle makes a
//! private copy ([`Image::ensure_unique`]). Shared (read-only) access goes
//! through `&Image`, exclusive (mutating) access through `&mut Image`, so no
//! mutation can overlap an iterator or a reduction over the same handle.
//!
//! # Ownership
//!
//! ```text
//!  Image a ──┐
//!            ├──► Arc<PixelBuffer> ──► PixelStorage (local | external)
//!  Image b ──┘
//!
//!  b.fill(..)  =>  b gets its own PixelBuffer; a is untouched
//! ```
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image};
//!
//! let a = Image::<f32>::new(4, 4, ColorSpace::Gray);
//! let mut b = a.clone();
//! assert!(b.shares_buffer_with(&a));
//!
//! b.fill(0.5).unwrap();
//! assert!(!b.shares_buffer_with(&a));
//! assert_eq!(a.sample(0, 0, 0), Some(0.0));
//! assert_eq!(b.sample(0, 0, 0), Some(0.5));
//! ```

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::colorspace::{ColorSpace, RgbWorkingSpace};
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::parallel::Progress;
use crate::rect::Rect;
use crate::sample::{Sample, SampleType};
use crate::selection::Selection;
use crate::storage::{
    ExternalPlanes, ExternalStorage, LocalStorage, PixelStorage, try_alloc_plane, try_clone_plane,
};

/// Samples of one pixel, one per channel.
pub type PixelValue<T> = SmallVec<[T; 4]>;

// ============================================================================
// PixelBuffer
// ============================================================================

/// Shared pixel data: geometry, color description and channel planes.
pub struct PixelBuffer<T: Sample> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) color_space: ColorSpace,
    pub(crate) working_space: RgbWorkingSpace,
    pub(crate) storage: Box<dyn PixelStorage<T>>,
}

impl<T: Sample> PixelBuffer<T> {
    fn local(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        working_space: RgbWorkingSpace,
        planes: Vec<Vec<T>>,
    ) -> Self {
        Self {
            width,
            height,
            color_space,
            working_space,
            storage: Box::new(LocalStorage::new(planes)),
        }
    }

    fn empty() -> Self {
        Self::local(0, 0, ColorSpace::Gray, RgbWorkingSpace::default(), Vec::new())
    }

    /// Deep copy into local storage.
    fn deep_copy(&self) -> Result<Self> {
        let local = self.storage.to_local()?;
        Ok(Self {
            width: self.width,
            height: self.height,
            color_space: self.color_space,
            working_space: self.working_space,
            storage: Box::new(local),
        })
    }

    fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl<T: Sample> fmt::Debug for PixelBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.storage.channels())
            .field("color_space", &self.color_space)
            .field("external", &self.storage.is_external())
            .finish()
    }
}

fn checked_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| Error::invalid_dimensions(width, height, "sample count overflows usize"))
}

// ============================================================================
// Image
// ============================================================================

/// A two-dimensional, multi-channel image with copy-on-write storage.
///
/// Channels `0..nominal` hold the color space's nominal components; the
/// remaining channels are alpha channels.
pub struct Image<T: Sample> {
    pub(crate) buffer: Arc<PixelBuffer<T>>,
    pub(crate) selection: Selection,
    pub(crate) saved_selections: Vec<Selection>,
    pub(crate) config: ProcessingConfig,
    pub(crate) status: Progress,
}

impl<T: Sample> Image<T> {
    /// Creates a zero-filled image with the nominal channels of `color_space`.
    pub fn new(width: u32, height: u32, color_space: ColorSpace) -> Self {
        Self::filled(width, height, color_space.nominal_channels(), color_space, T::default())
    }

    /// Creates an image with `channels` planes set to `value`.
    ///
    /// The channel count is raised to the nominal count if lower.
    pub fn filled(width: u32, height: u32, channels: usize, color_space: ColorSpace, value: T) -> Self {
        let channels = channels.max(color_space.nominal_channels());
        let len = width as usize * height as usize;
        let planes = vec![vec![value; len]; channels];
        Self::from_buffer(PixelBuffer::local(
            width,
            height,
            color_space,
            RgbWorkingSpace::default(),
            planes,
        ))
    }

    /// Creates an image adopting existing planes without copying them.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pxl_core::{ColorSpace, Image};
    ///
    /// let img = Image::from_planes(vec![vec![0.1f64, 0.5, 0.9]], 3, 1, ColorSpace::Gray).unwrap();
    /// assert_eq!(img.sample(2, 0, 0), Some(0.9));
    /// ```
    pub fn from_planes(planes: Vec<Vec<T>>, width: u32, height: u32, color_space: ColorSpace) -> Result<Self> {
        validate_planes(&planes, width, height, color_space)?;
        Ok(Self::from_buffer(PixelBuffer::local(
            width,
            height,
            color_space,
            RgbWorkingSpace::default(),
            planes,
        )))
    }

    /// Creates an image over memory owned by a host collaborator.
    ///
    /// Geometry and color space are taken from the host handle.
    pub fn wrap_external(host: Box<dyn ExternalPlanes<T>>) -> Result<Self> {
        let (width, height, color_space) = (host.width(), host.height(), host.color_space());
        let len = checked_len(width, height)?;
        if host.channels() < color_space.nominal_channels() {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("{} needs {} channels", color_space, color_space.nominal_channels()),
            ));
        }
        if (0..host.channels()).any(|c| host.plane(c).len() != len) {
            return Err(Error::invalid_dimensions(width, height, "host plane length mismatch"));
        }
        debug!(width, height, channels = host.channels(), "Wrapping external storage");
        Ok(Self::from_buffer(PixelBuffer {
            width,
            height,
            color_space,
            working_space: RgbWorkingSpace::default(),
            storage: Box::new(ExternalStorage::new(host)),
        }))
    }

    fn from_buffer(buffer: PixelBuffer<T>) -> Self {
        let mut image = Self {
            buffer: Arc::new(buffer),
            selection: Selection::default(),
            saved_selections: Vec::new(),
            config: ProcessingConfig::default(),
            status: Progress::default(),
        };
        image.selection.reset_channels(image.number_of_channels());
        image
    }

    // ------------------------------------------------------------------------
    // Geometry and color
    // ------------------------------------------------------------------------

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    /// Full image bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }

    /// Number of pixels per channel.
    #[inline]
    pub fn number_of_pixels(&self) -> usize {
        self.buffer.plane_len()
    }

    /// Number of channels, nominal and alpha.
    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.buffer.storage.channels()
    }

    /// Number of channels required by the color space.
    #[inline]
    pub fn number_of_nominal_channels(&self) -> usize {
        if self.number_of_channels() == 0 {
            0
        } else {
            self.color_space().nominal_channels()
        }
    }

    /// Number of alpha channels.
    #[inline]
    pub fn number_of_alpha_channels(&self) -> usize {
        self.number_of_channels() - self.number_of_nominal_channels()
    }

    /// Returns `true` if the image has at least one alpha channel.
    #[inline]
    pub fn has_alpha_channels(&self) -> bool {
        self.number_of_alpha_channels() > 0
    }

    /// Total samples in all channels.
    #[inline]
    pub fn number_of_samples(&self) -> usize {
        self.number_of_pixels() * self.number_of_channels()
    }

    /// Returns `true` if the image holds no pixel data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.number_of_pixels() == 0 || self.number_of_channels() == 0
    }

    /// Color space of the nominal channels.
    #[inline]
    pub fn color_space(&self) -> ColorSpace {
        self.buffer.color_space
    }

    /// Returns `true` unless the image is grayscale.
    #[inline]
    pub fn is_color(&self) -> bool {
        self.color_space().is_color()
    }

    /// RGB working space associated with this image.
    #[inline]
    pub fn working_space(&self) -> &RgbWorkingSpace {
        &self.buffer.working_space
    }

    /// Associates a new RGB working space. Samples are not converted.
    pub fn set_working_space(&mut self, working_space: RgbWorkingSpace) -> Result<()> {
        if self.buffer.working_space != working_space {
            self.buffer_mut()?.working_space = working_space;
        }
        Ok(())
    }

    /// Runtime sample type.
    #[inline]
    pub fn sample_type(&self) -> SampleType {
        T::TYPE
    }

    /// Linear index of pixel (x, y) within a plane.
    #[inline]
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width() as usize + x as usize
    }

    /// Offset of row `y` within a plane.
    #[inline]
    pub fn row_offset(&self, y: u32) -> usize {
        y as usize * self.width() as usize
    }

    /// Parallel processing defaults.
    #[inline]
    pub fn processing_config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Replaces the parallel processing defaults.
    pub fn set_processing_config(&mut self, config: ProcessingConfig) {
        self.config = config;
    }

    /// Sets the default upper bound on worker threads. Zero removes the bound.
    pub fn set_max_processors(&mut self, n: usize) {
        self.config = self.config.with_max_processors(n);
    }

    /// Work recorded by mutating operations on this handle.
    #[inline]
    pub fn status(&self) -> &Progress {
        &self.status
    }

    /// Mutable access to the work counter.
    #[inline]
    pub fn status_mut(&mut self) -> &mut Progress {
        &mut self.status
    }

    // ------------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------------

    /// Number of image handles sharing this pixel buffer.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// Returns `true` if no other handle shares the pixel buffer.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    /// Returns `true` if the pixel data is owned by a host collaborator.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.buffer.storage.is_external()
    }

    /// Identity of the pixel buffer, stable while any handle refers to it.
    #[inline]
    pub fn buffer_id(&self) -> usize {
        Arc::as_ptr(&self.buffer) as *const () as usize
    }

    /// Returns `true` if both handles refer to the same pixel buffer.
    #[inline]
    pub fn shares_buffer_with(&self, other: &Image<T>) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Makes the pixel buffer private to this handle.
    ///
    /// Clones the buffer when it is shared; otherwise does nothing, so a
    /// second call never clones again. On allocation failure the handle
    /// keeps sharing the previous buffer.
    pub fn ensure_unique(&mut self) -> Result<()> {
        if !self.is_unique() {
            let refs = self.ref_count();
            let copy = self.buffer.deep_copy()?;
            debug!(
                width = copy.width,
                height = copy.height,
                refs,
                "Copy-on-write: detaching pixel buffer"
            );
            self.buffer = Arc::new(copy);
        }
        Ok(())
    }

    /// Replaces externally backed storage with a private local copy.
    ///
    /// Geometry, color space and selection are unchanged. A no-op for local
    /// storage.
    pub fn ensure_local(&mut self) -> Result<()> {
        if self.is_external() {
            let copy = self.buffer.deep_copy()?;
            debug!(width = copy.width, height = copy.height, "Localizing external storage");
            self.buffer = Arc::new(copy);
        }
        Ok(())
    }

    /// Unique access to the pixel buffer, cloning it first when shared.
    pub(crate) fn buffer_mut(&mut self) -> Result<&mut PixelBuffer<T>> {
        self.ensure_unique()?;
        let refs = self.ref_count();
        Arc::get_mut(&mut self.buffer).ok_or(Error::not_unique("mutate", refs))
    }

    /// Unique access to a locally owned buffer.
    fn local_buffer_mut(&mut self) -> Result<&mut PixelBuffer<T>> {
        self.ensure_local()?;
        self.buffer_mut()
    }

    /// Reallocates the image.
    ///
    /// When the buffer is unique and local, planes of the right length are
    /// reused and only missing or mismatched slots are allocated; their
    /// contents are then unspecified. Otherwise fresh zeroed planes are
    /// allocated and the handle detaches from any shared buffer. The
    /// selection is reset to the full image and all channels.
    ///
    /// On allocation failure the image keeps its previous state.
    pub fn allocate(&mut self, width: u32, height: u32, channels: usize, color_space: ColorSpace) -> Result<()> {
        let channels = channels.max(color_space.nominal_channels());
        let len = checked_len(width, height)?;
        debug!(width, height, channels, %color_space, "Allocating image");

        if self.is_unique() && !self.is_external() {
            let buffer = self.buffer_mut()?;
            let planes = buffer
                .storage
                .local_planes_mut()
                .ok_or(Error::ExternalStorage { operation: "allocate" })?;
            let reusable = planes.iter().take(channels).filter(|p| p.len() == len).count();

            // Allocate everything that cannot be reused before touching the
            // existing planes.
            let mut fresh = Vec::with_capacity(channels - reusable);
            for _ in reusable..channels {
                fresh.push(try_alloc_plane(len, T::default())?);
            }

            let mut next = Vec::with_capacity(channels);
            let mut fresh = fresh.into_iter();
            for old in std::mem::take(planes).into_iter().take(channels) {
                if old.len() == len {
                    next.push(old);
                } else if let Some(p) = fresh.next() {
                    next.push(p);
                }
            }
            next.extend(fresh);
            *planes = next;
            buffer.width = width;
            buffer.height = height;
            buffer.color_space = color_space;
        } else {
            let storage = LocalStorage::filled(channels, len, T::default())?;
            let working_space = self.buffer.working_space;
            self.buffer = Arc::new(PixelBuffer::local(
                width,
                height,
                color_space,
                working_space,
                storage.planes,
            ));
        }
        self.reset_all_selections();
        Ok(())
    }

    /// Adopts caller-allocated planes without copying them.
    ///
    /// Fails with [`Error::NotUnique`] if the image is externally backed and
    /// shared with other handles. A shared local image detaches instead.
    pub fn import(&mut self, planes: Vec<Vec<T>>, width: u32, height: u32, color_space: ColorSpace) -> Result<()> {
        if self.is_external() && !self.is_unique() {
            warn!(refs = self.ref_count(), "Import rejected on shared external image");
            return Err(Error::not_unique("import", self.ref_count()));
        }
        validate_planes(&planes, width, height, color_space)?;
        debug!(width, height, channels = planes.len(), "Importing planes");
        let working_space = self.buffer.working_space;
        self.buffer = Arc::new(PixelBuffer::local(width, height, color_space, working_space, planes));
        self.reset_all_selections();
        Ok(())
    }

    /// Hands the planes over to the caller, leaving the image empty.
    ///
    /// Fails with [`Error::NotUnique`] if another handle shares the buffer.
    /// Externally backed planes are copied out, never taken from the host.
    /// Releasing an empty image returns no planes.
    pub fn release(&mut self) -> Result<Vec<Vec<T>>> {
        if !self.is_unique() {
            warn!(refs = self.ref_count(), "Release rejected on shared image");
            return Err(Error::not_unique("release", self.ref_count()));
        }
        let buffer = self.local_buffer_mut()?;
        let planes = buffer
            .storage
            .local_planes_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        buffer.width = 0;
        buffer.height = 0;
        trace!(channels = planes.len(), "Released planes");
        self.reset_all_selections();
        Ok(planes)
    }

    /// Replaces the channel planes of a unique, local buffer.
    ///
    /// `f` receives the plane array and may restructure it; it must leave
    /// the array untouched when it returns an error. Afterwards every plane
    /// must still hold `width * height` samples and the count must cover
    /// the nominal channels of `color_space`. The channel selection is
    /// clamped to the new channel count.
    pub fn restructure_channels<F>(&mut self, color_space: ColorSpace, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Vec<T>>) -> Result<()>,
    {
        let buffer = self.local_buffer_mut()?;
        let (width, height) = (buffer.width, buffer.height);
        let planes = buffer
            .storage
            .local_planes_mut()
            .ok_or(Error::ExternalStorage { operation: "restructure channels" })?;
        f(planes)?;
        validate_planes(planes, width, height, color_space)?;
        buffer.color_space = color_space;
        let channels = buffer.storage.channels();
        self.selection.clamp_channels(channels);
        for saved in &mut self.saved_selections {
            saved.clamp_channels(channels);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Alpha channels
    // ------------------------------------------------------------------------

    /// Appends an alpha channel, zero-filled when `data` is `None`.
    pub fn add_alpha_channel(&mut self, data: Option<Vec<T>>) -> Result<()> {
        let len = self.number_of_pixels();
        let plane = match data {
            Some(p) if p.len() == len => p,
            Some(p) => {
                return Err(Error::invalid_dimensions(
                    self.width(),
                    self.height(),
                    format!("alpha plane holds {} samples, expected {len}", p.len()),
                ));
            }
            None => try_alloc_plane(len, T::default())?,
        };
        let cs = self.color_space();
        self.restructure_channels(cs, move |planes| {
            planes
                .try_reserve(1)
                .map_err(|e| Error::allocation_failed(1, e.to_string()))?;
            planes.push(plane);
            Ok(())
        })
    }

    /// Appends `n` zero-filled alpha channels.
    pub fn create_alpha_channels(&mut self, n: usize) -> Result<()> {
        let len = self.number_of_pixels();
        let mut fresh = Vec::with_capacity(n);
        for _ in 0..n {
            fresh.push(try_alloc_plane(len, T::default())?);
        }
        let cs = self.color_space();
        self.restructure_channels(cs, move |planes| {
            planes
                .try_reserve(n)
                .map_err(|e| Error::allocation_failed(n, e.to_string()))?;
            planes.extend(fresh);
            Ok(())
        })
    }

    /// Removes alpha channel `index` (relative to the first alpha channel)
    /// and drops its samples.
    pub fn delete_alpha_channel(&mut self, index: usize) -> Result<()> {
        self.take_alpha_channel(index).map(drop)
    }

    /// Removes every alpha channel.
    pub fn delete_alpha_channels(&mut self) -> Result<()> {
        let nominal = self.number_of_nominal_channels();
        let cs = self.color_space();
        self.restructure_channels(cs, move |planes| {
            planes.truncate(nominal);
            Ok(())
        })
    }

    /// Removes alpha channel `index` (relative to the first alpha channel)
    /// and hands its samples to the caller.
    pub fn take_alpha_channel(&mut self, index: usize) -> Result<Vec<T>> {
        let alpha = self.number_of_alpha_channels();
        if index >= alpha {
            return Err(Error::channel_out_of_range(
                self.number_of_nominal_channels() + index,
                self.number_of_channels(),
            ));
        }
        let channel = self.number_of_nominal_channels() + index;
        let cs = self.color_space();
        let mut taken = Vec::new();
        self.restructure_channels(cs, |planes| {
            taken = planes.remove(channel);
            Ok(())
        })?;
        Ok(taken)
    }

    // ------------------------------------------------------------------------
    // Sample access
    // ------------------------------------------------------------------------

    /// Plane of channel `channel`.
    #[inline]
    pub fn plane(&self, channel: usize) -> Option<&[T]> {
        (channel < self.number_of_channels()).then(|| self.buffer.storage.plane(channel))
    }

    /// Mutable plane of channel `channel`, detaching from shared buffers.
    pub fn plane_mut(&mut self, channel: usize) -> Result<&mut [T]> {
        let channels = self.number_of_channels();
        if channel >= channels {
            return Err(Error::channel_out_of_range(channel, channels));
        }
        Ok(self.buffer_mut()?.storage.plane_mut(channel))
    }

    /// All planes, shared.
    pub fn planes(&self) -> Vec<&[T]> {
        (0..self.number_of_channels())
            .map(|c| self.buffer.storage.plane(c))
            .collect()
    }

    /// All planes, mutably, detaching from shared buffers.
    pub fn planes_mut(&mut self) -> Result<Vec<&mut [T]>> {
        Ok(self.buffer_mut()?.storage.planes_mut())
    }

    /// Sample of channel `channel` at (x, y), `None` out of range.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, channel: usize) -> Option<T> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.plane(channel).map(|p| p[self.pixel_index(x, y)])
    }

    /// Sets one sample. Out of range coordinates are ignored.
    pub fn set_sample(&mut self, x: u32, y: u32, channel: usize, value: T) -> Result<()> {
        if x >= self.width() || y >= self.height() || channel >= self.number_of_channels() {
            return Ok(());
        }
        let index = self.pixel_index(x, y);
        self.buffer_mut()?.storage.plane_mut(channel)[index] = value;
        Ok(())
    }

    /// All samples of pixel (x, y), `None` out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PixelValue<T>> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let index = self.pixel_index(x, y);
        Some(
            (0..self.number_of_channels())
                .map(|c| self.buffer.storage.plane(c)[index])
                .collect(),
        )
    }

    /// Sets all samples of pixel (x, y) from `values`, channel by channel.
    /// Out of range coordinates are ignored; extra values are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, values: &[T]) -> Result<()> {
        if x >= self.width() || y >= self.height() {
            return Ok(());
        }
        let index = self.pixel_index(x, y);
        let mut planes = self.planes_mut()?;
        for (plane, &v) in planes.iter_mut().zip(values) {
            plane[index] = v;
        }
        Ok(())
    }

    /// Row `y` of channel `channel`, `None` out of range.
    pub fn row(&self, y: u32, channel: usize) -> Option<&[T]> {
        if y >= self.height() {
            return None;
        }
        let start = self.row_offset(y);
        let width = self.width() as usize;
        self.plane(channel).map(|p| &p[start..start + width])
    }

    /// Copies `values` into row `y` of channel `channel`, up to the row
    /// width. Out of range rows and channels are ignored.
    pub fn set_row(&mut self, y: u32, channel: usize, values: &[T]) -> Result<()> {
        if y >= self.height() || channel >= self.number_of_channels() {
            return Ok(());
        }
        let start = self.row_offset(y);
        let n = values.len().min(self.width() as usize);
        let plane = self.buffer_mut()?.storage.plane_mut(channel);
        plane[start..start + n].copy_from_slice(&values[..n]);
        Ok(())
    }

    /// Column `x` of channel `channel`, `None` out of range.
    pub fn column(&self, x: u32, channel: usize) -> Option<Vec<T>> {
        if x >= self.width() {
            return None;
        }
        let width = self.width() as usize;
        self.plane(channel)
            .map(|p| p.iter().skip(x as usize).step_by(width).copied().collect())
    }

    /// Copies `values` into column `x` of channel `channel`, up to the
    /// column height. Out of range columns and channels are ignored.
    pub fn set_column(&mut self, x: u32, channel: usize, values: &[T]) -> Result<()> {
        if x >= self.width() || channel >= self.number_of_channels() {
            return Ok(());
        }
        let width = self.width() as usize;
        let plane = self.buffer_mut()?.storage.plane_mut(channel);
        for (dst, &v) in plane.iter_mut().skip(x as usize).step_by(width).zip(values) {
            *dst = v;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Subsets
    // ------------------------------------------------------------------------

    /// Copies the current selection (rectangle and channel range) into a
    /// new, uniquely owned image.
    ///
    /// The copy keeps the color space only if the channel range starts at
    /// channel 0 and covers every nominal channel; otherwise it is
    /// grayscale.
    pub fn selected_subset(&self) -> Image<T> {
        let rect = self.selected_rectangle();
        let (c0, c1) = (self.selection.first_channel, self.selection.last_channel);
        let channels = if self.number_of_channels() == 0 { 0 } else { 1 + c1 - c0 };
        let color_space = if c0 == 0 && channels >= self.number_of_nominal_channels() {
            self.color_space()
        } else {
            ColorSpace::Gray
        };
        let width = self.width() as usize;
        let planes: Vec<Vec<T>> = (c0..c0 + channels)
            .map(|c| {
                let src = self.buffer.storage.plane(c);
                let mut plane = Vec::with_capacity(rect.area() as usize);
                for y in rect.y..rect.bottom() {
                    let start = y as usize * width + rect.x as usize;
                    plane.extend_from_slice(&src[start..start + rect.width as usize]);
                }
                plane
            })
            .collect();
        trace!(%rect, channels, "Materialized selection subset");
        let mut image = Self::from_buffer(PixelBuffer::local(
            rect.width,
            rect.height,
            color_space,
            self.buffer.working_space,
            planes,
        ));
        image.config = self.config;
        image
    }

    /// Deep copy of the whole image into a new, uniquely owned buffer.
    pub fn deep_clone(&self) -> Result<Image<T>> {
        Ok(Self {
            buffer: Arc::new(self.buffer.deep_copy()?),
            selection: self.selection,
            saved_selections: self.saved_selections.clone(),
            config: self.config,
            status: Progress::default(),
        })
    }

    /// Copies channel `channel` into a standalone vector.
    pub fn copy_plane(&self, channel: usize) -> Result<Vec<T>> {
        let plane = self
            .plane(channel)
            .ok_or(Error::channel_out_of_range(channel, self.number_of_channels()))?;
        try_clone_plane(plane)
    }
}

fn validate_planes<T>(planes: &[Vec<T>], width: u32, height: u32, color_space: ColorSpace) -> Result<()> {
    let len = checked_len(width, height)?;
    if planes.len() < color_space.nominal_channels() && !(planes.is_empty() && len == 0) {
        return Err(Error::invalid_dimensions(
            width,
            height,
            format!(
                "{} needs {} channels, got {}",
                color_space,
                color_space.nominal_channels(),
                planes.len()
            ),
        ));
    }
    if let Some(bad) = planes.iter().find(|p| p.len() != len) {
        return Err(Error::invalid_dimensions(
            width,
            height,
            format!("plane holds {} samples, expected {len}", bad.len()),
        ));
    }
    Ok(())
}

impl<T: Sample> Default for Image<T> {
    fn default() -> Self {
        Self::from_buffer(PixelBuffer::empty())
    }
}

impl<T: Sample> Clone for Image<T> {
    /// Shares the pixel buffer when the whole image is selected; otherwise
    /// materializes the selected subset into a new buffer.
    fn clone(&self) -> Self {
        if self.is_completely_selected() {
            return Self {
                buffer: Arc::clone(&self.buffer),
                selection: self.selection,
                saved_selections: self.saved_selections.clone(),
                config: self.config,
                status: Progress::default(),
            };
        }
        self.selected_subset()
    }
}

impl<T: Sample> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("sample_type", &T::TYPE)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("channels", &self.number_of_channels())
            .field("color_space", &self.color_space())
            .field("refs", &self.ref_count())
            .field("external", &self.is_external())
            .field("selection", &self.selection)
            .finish()
    }
}
