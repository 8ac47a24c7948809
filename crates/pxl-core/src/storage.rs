//! Pixel storage providers.
//!
//! A [`PixelBuffer`](crate::image::PixelBuffer) keeps its channel planes
//! behind the [`PixelStorage`] trait. Two providers exist:
//!
//! - [`LocalStorage`] - planes owned by this process (`Vec<Vec<T>>`)
//! - [`ExternalStorage`] - planes owned by a host collaborator and reached
//!   through the [`ExternalPlanes`] trait
//!
//! The provider is chosen when the buffer is created. Structural changes
//! (allocation, channel count changes, ownership transfers) are only made on
//! local storage; images convert external storage to local first with
//! [`Image::ensure_local`](crate::Image::ensure_local).
//!
//! All allocations go through [`try_alloc_plane`] / [`try_clone_plane`], which
//! report failures as [`Error::AllocationFailed`] instead of aborting.

use std::fmt;

use crate::colorspace::ColorSpace;
use crate::error::{Error, Result};
use crate::sample::Sample;

/// Allocates a plane of `len` samples set to `value`.
pub fn try_alloc_plane<T: Sample>(len: usize, value: T) -> Result<Vec<T>> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(len)
        .map_err(|e| Error::allocation_failed(len, e.to_string()))?;
    plane.resize(len, value);
    Ok(plane)
}

/// Allocates a copy of `src`.
pub fn try_clone_plane<T: Sample>(src: &[T]) -> Result<Vec<T>> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(src.len())
        .map_err(|e| Error::allocation_failed(src.len(), e.to_string()))?;
    plane.extend_from_slice(src);
    Ok(plane)
}

/// Storage of the per-channel sample planes of a pixel buffer.
///
/// Every plane holds `width * height` samples in row-major order.
pub trait PixelStorage<T: Sample>: Send + Sync {
    /// Returns `true` if the memory is owned by a host collaborator.
    fn is_external(&self) -> bool;

    /// Number of planes.
    fn channels(&self) -> usize;

    /// Plane of channel `channel`.
    fn plane(&self, channel: usize) -> &[T];

    /// Mutable plane of channel `channel`.
    fn plane_mut(&mut self, channel: usize) -> &mut [T];

    /// All planes, mutably and simultaneously.
    fn planes_mut(&mut self) -> Vec<&mut [T]>;

    /// The owned plane array, if this storage is local.
    fn local_planes_mut(&mut self) -> Option<&mut Vec<Vec<T>>>;

    /// Deep copy into local storage.
    fn to_local(&self) -> Result<LocalStorage<T>> {
        let mut planes = Vec::with_capacity(self.channels());
        for c in 0..self.channels() {
            planes.push(try_clone_plane(self.plane(c))?);
        }
        Ok(LocalStorage { planes })
    }
}

/// Planes owned by this process.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage<T> {
    pub(crate) planes: Vec<Vec<T>>,
}

impl<T: Sample> LocalStorage<T> {
    /// Wraps owned planes.
    pub fn new(planes: Vec<Vec<T>>) -> Self {
        Self { planes }
    }

    /// Allocates `channels` planes of `len` samples set to `value`.
    pub fn filled(channels: usize, len: usize, value: T) -> Result<Self> {
        let mut planes = Vec::with_capacity(channels);
        for _ in 0..channels {
            planes.push(try_alloc_plane(len, value)?);
        }
        Ok(Self { planes })
    }

    /// Takes the planes, leaving this storage empty.
    pub fn take_planes(&mut self) -> Vec<Vec<T>> {
        std::mem::take(&mut self.planes)
    }
}

impl<T: Sample> PixelStorage<T> for LocalStorage<T> {
    fn is_external(&self) -> bool {
        false
    }

    fn channels(&self) -> usize {
        self.planes.len()
    }

    fn plane(&self, channel: usize) -> &[T] {
        &self.planes[channel]
    }

    fn plane_mut(&mut self, channel: usize) -> &mut [T] {
        &mut self.planes[channel]
    }

    fn planes_mut(&mut self) -> Vec<&mut [T]> {
        self.planes.iter_mut().map(|p| p.as_mut_slice()).collect()
    }

    fn local_planes_mut(&mut self) -> Option<&mut Vec<Vec<T>>> {
        Some(&mut self.planes)
    }
}

/// Image memory owned by a host collaborator.
///
/// Implementors expose geometry, color space and planes of a foreign
/// image. The core never resizes or frees that memory.
pub trait ExternalPlanes<T: Sample>: Send + Sync {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Color space of the nominal channels.
    fn color_space(&self) -> ColorSpace;

    /// Number of planes.
    fn channels(&self) -> usize;

    /// Plane of channel `channel`.
    fn plane(&self, channel: usize) -> &[T];

    /// Mutable plane of channel `channel`.
    fn plane_mut(&mut self, channel: usize) -> &mut [T];

    /// All planes, mutably and simultaneously.
    fn planes_mut(&mut self) -> Vec<&mut [T]>;
}

/// Storage backed by an [`ExternalPlanes`] host handle.
pub struct ExternalStorage<T: Sample> {
    host: Box<dyn ExternalPlanes<T>>,
}

impl<T: Sample> ExternalStorage<T> {
    /// Wraps a host handle.
    pub fn new(host: Box<dyn ExternalPlanes<T>>) -> Self {
        Self { host }
    }

    /// The wrapped host handle.
    pub fn host(&self) -> &dyn ExternalPlanes<T> {
        self.host.as_ref()
    }
}

impl<T: Sample> fmt::Debug for ExternalStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalStorage")
            .field("width", &self.host.width())
            .field("height", &self.host.height())
            .field("channels", &self.host.channels())
            .finish()
    }
}

impl<T: Sample> PixelStorage<T> for ExternalStorage<T> {
    fn is_external(&self) -> bool {
        true
    }

    fn channels(&self) -> usize {
        self.host.channels()
    }

    fn plane(&self, channel: usize) -> &[T] {
        self.host.plane(channel)
    }

    fn plane_mut(&mut self, channel: usize) -> &mut [T] {
        self.host.plane_mut(channel)
    }

    fn planes_mut(&mut self) -> Vec<&mut [T]> {
        self.host.planes_mut()
    }

    fn local_planes_mut(&mut self) -> Option<&mut Vec<Vec<T>>> {
        None
    }
}

/// A host handle over planes it owns, for tests and simple embeddings.
///
/// # Example
///
/// ```rust
/// use pxl_core::{ColorSpace, Image, storage::HostPlanes};
///
/// let host = HostPlanes::new(2, 2, ColorSpace::Gray, vec![vec![0.5f32; 4]]);
/// let image = Image::wrap_external(Box::new(host)).unwrap();
/// assert!(image.is_external());
/// ```
#[derive(Debug, Clone)]
pub struct HostPlanes<T> {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    planes: Vec<Vec<T>>,
}

impl<T: Sample> HostPlanes<T> {
    /// Creates a host handle.
    pub fn new(width: u32, height: u32, color_space: ColorSpace, planes: Vec<Vec<T>>) -> Self {
        Self {
            width,
            height,
            color_space,
            planes,
        }
    }
}

impl<T: Sample> ExternalPlanes<T> for HostPlanes<T> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    fn channels(&self) -> usize {
        self.planes.len()
    }

    fn plane(&self, channel: usize) -> &[T] {
        &self.planes[channel]
    }

    fn plane_mut(&mut self, channel: usize) -> &mut [T] {
        &mut self.planes[channel]
    }

    fn planes_mut(&mut self) -> Vec<&mut [T]> {
        self.planes.iter_mut().map(|p| p.as_mut_slice()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_plane() {
        let plane = try_alloc_plane(16, 0.25f32).unwrap();
        assert_eq!(plane.len(), 16);
        assert!(plane.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_try_alloc_plane_overflow_fails() {
        let err = try_alloc_plane::<f64>(usize::MAX / 2, 0.0).unwrap_err();
        assert!(err.is_allocation_error());
    }

    #[test]
    fn test_local_to_local_is_deep() {
        let storage = LocalStorage::new(vec![vec![1u8, 2, 3], vec![4, 5, 6]]);
        let mut copy = storage.to_local().unwrap();
        copy.plane_mut(0)[0] = 9;
        assert_eq!(storage.plane(0)[0], 1);
        assert_eq!(copy.plane(1), &[4, 5, 6]);
    }

    #[test]
    fn test_external_delegates_to_host() {
        let host = HostPlanes::new(2, 1, ColorSpace::Gray, vec![vec![7u16, 8]]);
        let mut storage = ExternalStorage::new(Box::new(host));
        assert!(storage.is_external());
        assert!(storage.local_planes_mut().is_none());
        storage.plane_mut(0)[1] = 10;
        let local = storage.to_local().unwrap();
        assert!(!local.is_external());
        assert_eq!(local.plane(0), &[7, 10]);
    }
}
