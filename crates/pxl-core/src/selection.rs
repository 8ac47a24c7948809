//! Selection state and selection parsing.
//!
//! Every image handle carries a [`Selection`]: a rectangle, an anchor point,
//! a current channel with a channel range, and range clipping bounds used by
//! statistical reductions. Selections can be saved and restored with
//! [`Image::push_selections`] / [`Image::pop_selections`].
//!
//! Operations take a [`Scope`] naming the rectangle and channels to work on.
//! Unset scope fields fall back to the current selection;
//! [`Image::parse_selection`] resolves a scope into a [`ParsedSelection`]
//! that is guaranteed to be non-empty and inside the image.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image, Rect, Scope};
//!
//! let image = Image::<f32>::new(4, 4, ColorSpace::Gray);
//!
//! // Partial overlap clamps to the intersection
//! let sel = image.parse_selection(&Scope::new().rect(Rect::new(2, 2, 10, 10))).unwrap();
//! assert_eq!(sel.rect, Rect::new(2, 2, 2, 2));
//!
//! // Wholly outside fails
//! assert!(image.parse_selection(&Scope::new().rect(Rect::new(8, 8, 2, 2))).is_none());
//! ```

use std::ops::RangeInclusive;

use crate::image::Image;
use crate::parallel;
use crate::rect::{Point, Rect};
use crate::sample::Sample;

/// Selection state of an image handle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    /// Selected rectangle; empty means the full image.
    pub rect: Rect,
    /// Anchor point used as default target of image-to-image operations.
    pub point: Point,
    /// Current channel.
    pub channel: usize,
    /// First selected channel.
    pub first_channel: usize,
    /// Last selected channel (inclusive).
    pub last_channel: usize,
    /// Lower range clipping bound (exclusive).
    pub clip_low: f64,
    /// Upper range clipping bound (exclusive).
    pub clip_high: f64,
    /// Whether statistics reject samples outside `(clip_low, clip_high)`.
    pub clipped: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            point: Point::default(),
            channel: 0,
            first_channel: 0,
            last_channel: 0,
            clip_low: 0.0,
            clip_high: 1.0,
            clipped: false,
        }
    }
}

impl Selection {
    pub(crate) fn reset_channels(&mut self, channels: usize) {
        self.channel = 0;
        self.first_channel = 0;
        self.last_channel = channels.saturating_sub(1);
    }

    pub(crate) fn clamp_channels(&mut self, channels: usize) {
        let last = channels.saturating_sub(1);
        self.channel = self.channel.min(last);
        self.first_channel = self.first_channel.min(last);
        self.last_channel = self.last_channel.min(last);
    }

    /// Returns `true` if `value` passes range clipping.
    #[inline]
    pub fn accepts(&self, value: f64) -> bool {
        !self.clipped || (value > self.clip_low && value < self.clip_high)
    }
}

/// Rectangle and channels an operation works on.
///
/// Unset fields and empty rectangles resolve to the current selection.
///
/// ```rust
/// use pxl_core::{Rect, Scope};
///
/// let scope = Scope::new().rect(Rect::new(0, 0, 8, 8)).channels(0, 2).max_processors(1);
/// assert_eq!(scope.last_channel, Some(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    /// Rectangle to process.
    pub rect: Option<Rect>,
    /// First channel to process.
    pub first_channel: Option<usize>,
    /// Last channel to process (inclusive).
    pub last_channel: Option<usize>,
    /// Upper bound on worker threads.
    pub max_processors: Option<usize>,
}

impl Scope {
    /// A scope that resolves entirely to the current selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to `rect`.
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Restricts to the channel range `first..=last`.
    pub fn channels(mut self, first: usize, last: usize) -> Self {
        self.first_channel = Some(first);
        self.last_channel = Some(last);
        self
    }

    /// Restricts to a single channel.
    pub fn channel(self, channel: usize) -> Self {
        self.channels(channel, channel)
    }

    /// Bounds the number of worker threads. Zero means "no bound".
    pub fn max_processors(mut self, n: usize) -> Self {
        self.max_processors = (n > 0).then_some(n);
        self
    }
}

/// A resolved, non-empty selection inside the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSelection {
    /// Rectangle, clamped to the image.
    pub rect: Rect,
    /// First channel.
    pub first_channel: usize,
    /// Last channel (inclusive), never below `first_channel`.
    pub last_channel: usize,
    /// Resolved thread bound.
    pub max_processors: Option<usize>,
}

impl ParsedSelection {
    /// Selected channel indices.
    #[inline]
    pub fn channels(&self) -> RangeInclusive<usize> {
        self.first_channel..=self.last_channel
    }

    /// Number of selected channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        1 + self.last_channel - self.first_channel
    }

    /// Samples in the selected rectangle of one channel.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.rect.area() as usize
    }
}

impl<T: Sample> Image<T> {
    /// Resolves `scope` against the current selection and the image bounds.
    ///
    /// Returns `None` when the resolved rectangle or channel range is empty.
    /// Reversed channel bounds are swapped; channel indices are clamped to
    /// the existing channels.
    pub fn parse_selection(&self, scope: &Scope) -> Option<ParsedSelection> {
        let channels = self.number_of_channels();
        if channels == 0 {
            return None;
        }
        let rect = scope
            .rect
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.selected_rectangle());
        let rect = rect.clamp_to(self.width(), self.height())?;

        let last = channels - 1;
        let mut c0 = scope.first_channel.unwrap_or(self.selection.first_channel).min(last);
        let mut c1 = scope.last_channel.unwrap_or(self.selection.last_channel).min(last);
        if c1 < c0 {
            std::mem::swap(&mut c0, &mut c1);
        }
        Some(ParsedSelection {
            rect,
            first_channel: c0,
            last_channel: c1,
            max_processors: scope.max_processors.or(self.config.max_processors),
        })
    }

    /// Worker threads for a parsed selection.
    pub fn threads_for(&self, selection: &ParsedSelection) -> usize {
        parallel::number_of_threads_for_rows(
            selection.rect.height as usize,
            selection.rect.width as usize,
            selection.max_processors,
            self.config.overhead_limit_px,
        )
    }

    // ------------------------------------------------------------------------
    // Rectangle and anchor
    // ------------------------------------------------------------------------

    /// Current selection state.
    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected rectangle, the full bounds when nothing is selected.
    pub fn selected_rectangle(&self) -> Rect {
        if self.selection.rect.is_empty() {
            self.bounds()
        } else {
            self.selection
                .rect
                .clamp_to(self.width(), self.height())
                .unwrap_or_default()
        }
    }

    /// Selects a rectangle, clamped to the image. An empty or outside
    /// rectangle selects the whole image.
    pub fn select_rectangle(&mut self, rect: Rect) {
        self.selection.rect = rect.clamp_to(self.width(), self.height()).unwrap_or_default();
    }

    /// Selects the whole image.
    pub fn reset_selection(&mut self) {
        self.selection.rect = Rect::default();
    }

    /// Returns `true` if the rectangle covers the whole image.
    pub fn is_full_selection(&self) -> bool {
        self.selected_rectangle() == self.bounds()
    }

    /// Returns `true` if the whole image and every channel are selected.
    pub fn is_completely_selected(&self) -> bool {
        self.is_full_selection()
            && self.selection.first_channel == 0
            && self.selection.last_channel + 1 >= self.number_of_channels()
    }

    /// Sets the anchor point.
    pub fn select_point(&mut self, x: i32, y: i32) {
        self.selection.point = Point::new(x, y);
    }

    /// Anchor point.
    pub fn selected_point(&self) -> Point {
        self.selection.point
    }

    // ------------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------------

    /// Selects a single channel. Out of range indices are clamped.
    pub fn select_channel(&mut self, channel: usize) {
        let c = channel.min(self.number_of_channels().saturating_sub(1));
        self.selection.channel = c;
        self.selection.first_channel = c;
        self.selection.last_channel = c;
    }

    /// Current channel.
    pub fn selected_channel(&self) -> usize {
        self.selection.channel
    }

    /// Selects channels `first..=last`; reversed bounds are swapped.
    pub fn select_channel_range(&mut self, first: usize, last: usize) {
        let max = self.number_of_channels().saturating_sub(1);
        let (c0, c1) = if last < first { (last, first) } else { (first, last) };
        self.selection.first_channel = c0.min(max);
        self.selection.last_channel = c1.min(max);
        self.selection.channel = self.selection.first_channel;
    }

    /// Selected channel range.
    pub fn selected_channel_range(&self) -> RangeInclusive<usize> {
        self.selection.first_channel..=self.selection.last_channel
    }

    /// Selects the nominal channels.
    pub fn select_nominal_channels(&mut self) {
        let n = self.number_of_nominal_channels();
        self.select_channel_range(0, n.saturating_sub(1));
    }

    /// Selects the alpha channels, or the nominal ones if there are none.
    pub fn select_alpha_channels(&mut self) {
        if self.has_alpha_channels() {
            self.select_channel_range(self.number_of_nominal_channels(), self.number_of_channels() - 1);
        } else {
            self.select_nominal_channels();
        }
    }

    /// Selects every channel.
    pub fn reset_channel_range(&mut self) {
        let n = self.number_of_channels();
        self.selection.reset_channels(n);
    }

    // ------------------------------------------------------------------------
    // Range clipping
    // ------------------------------------------------------------------------

    /// Sets the clipping bounds (normalized). Reversed bounds are swapped.
    pub fn set_range_clipping(&mut self, low: f64, high: f64) {
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        self.selection.clip_low = low;
        self.selection.clip_high = high;
    }

    /// Enables or disables range clipping.
    pub fn enable_range_clipping(&mut self, enable: bool) {
        self.selection.clipped = enable;
    }

    /// Returns `true` if range clipping is enabled.
    pub fn is_range_clipping_enabled(&self) -> bool {
        self.selection.clipped
    }

    /// Restores the configured clipping bounds (`(0, 1)` unless changed
    /// through [`ProcessingConfig::with_clip_range`]) and disables clipping.
    ///
    /// [`ProcessingConfig::with_clip_range`]: crate::ProcessingConfig::with_clip_range
    pub fn reset_range_clipping(&mut self) {
        self.selection.clip_low = self.config.clip_low;
        self.selection.clip_high = self.config.clip_high;
        self.selection.clipped = false;
    }

    // ------------------------------------------------------------------------
    // Selection stack
    // ------------------------------------------------------------------------

    /// Saves the current selection.
    pub fn push_selections(&mut self) {
        self.saved_selections.push(self.selection);
    }

    /// Restores the most recently saved selection. Returns `false` if the
    /// stack is empty.
    pub fn pop_selections(&mut self) -> bool {
        match self.saved_selections.pop() {
            Some(mut saved) => {
                saved.clamp_channels(self.number_of_channels());
                self.selection = saved;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a saved selection exists.
    pub fn can_pop_selections(&self) -> bool {
        !self.saved_selections.is_empty()
    }

    /// Resets the current selection to defaults. The stack is kept.
    pub fn reset_selections(&mut self) {
        self.selection = Selection::default();
        self.reset_channel_range();
        self.reset_range_clipping();
    }

    /// Resets the current selection and clears the stack.
    pub(crate) fn reset_all_selections(&mut self) {
        self.reset_selections();
        self.saved_selections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorSpace, ProcessingConfig};

    fn rgba() -> Image<f32> {
        Image::filled(4, 4, 4, ColorSpace::Rgb, 0.0)
    }

    #[test]
    fn test_parse_empty_rect_uses_selection() {
        let mut img = rgba();
        img.select_rectangle(Rect::new(1, 1, 2, 2));
        let sel = img.parse_selection(&Scope::new().rect(Rect::default())).unwrap();
        assert_eq!(sel.rect, Rect::new(1, 1, 2, 2));
        assert_eq!(sel.channels(), 0..=3);
    }

    #[test]
    fn test_parse_outside_fails() {
        let img = rgba();
        assert!(img.parse_selection(&Scope::new().rect(Rect::new(4, 0, 3, 3))).is_none());
    }

    #[test]
    fn test_parse_clamps_and_swaps_channels() {
        let img = rgba();
        let sel = img.parse_selection(&Scope::new().channels(9, 1)).unwrap();
        assert_eq!((sel.first_channel, sel.last_channel), (1, 3));
        assert_eq!(sel.channel_count(), 3);
    }

    #[test]
    fn test_parse_empty_image_fails() {
        let img = Image::<u8>::default();
        assert!(img.parse_selection(&Scope::new()).is_none());
    }

    #[test]
    fn test_channel_selection() {
        let mut img = rgba();
        img.select_alpha_channels();
        assert_eq!(img.selected_channel_range(), 3..=3);
        img.select_nominal_channels();
        assert_eq!(img.selected_channel_range(), 0..=2);
        img.select_channel(7);
        assert_eq!(img.selected_channel(), 3);
        img.reset_channel_range();
        assert_eq!(img.selected_channel_range(), 0..=3);
    }

    #[test]
    fn test_selection_stack() {
        let mut img = rgba();
        assert!(!img.can_pop_selections());
        img.select_rectangle(Rect::new(0, 0, 2, 2));
        img.push_selections();
        img.reset_selection();
        assert!(img.is_full_selection());
        assert!(img.pop_selections());
        assert_eq!(img.selected_rectangle(), Rect::new(0, 0, 2, 2));
        assert!(!img.pop_selections());
    }

    #[test]
    fn test_range_clipping() {
        let mut img = rgba();
        img.set_range_clipping(0.9, 0.1);
        assert!(img.selection().accepts(0.0));
        img.enable_range_clipping(true);
        assert!(!img.selection().accepts(0.1));
        assert!(img.selection().accepts(0.5));
        assert!(!img.selection().accepts(0.9));
        img.reset_range_clipping();
        assert!(!img.is_range_clipping_enabled());
    }

    #[test]
    fn test_range_clipping_reset_uses_config() {
        let mut img = rgba();
        img.set_processing_config(ProcessingConfig::default().with_clip_range(0.2, 0.8));
        img.reset_range_clipping();
        img.enable_range_clipping(true);
        assert!(!img.selection().accepts(0.1));
        assert!(img.selection().accepts(0.5));
        assert!(!img.selection().accepts(0.85));
    }

    #[test]
    fn test_scope_max_processors() {
        let mut img = rgba();
        img.set_max_processors(2);
        let sel = img.parse_selection(&Scope::new()).unwrap();
        assert_eq!(sel.max_processors, Some(2));
        let sel = img.parse_selection(&Scope::new().max_processors(1)).unwrap();
        assert_eq!(sel.max_processors, Some(1));
    }
}
