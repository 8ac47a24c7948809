//! Processing configuration.
//!
//! [`ProcessingConfig`] holds the per-image defaults used to partition
//! parallel work (an upper bound on worker threads and the minimum number of
//! pixels a worker must receive) and the range clipping bounds restored by
//! [`Image::reset_range_clipping`](crate::Image::reset_range_clipping).
//!
//! ```rust
//! use pxl_core::ProcessingConfig;
//!
//! let config = ProcessingConfig::default().with_max_processors(4);
//! assert_eq!(config.max_processors, Some(4));
//! ```

/// Minimum pixels per worker thread for row-partitioned operations.
pub const DEFAULT_OVERHEAD_LIMIT_PX: usize = 1024;

/// Processing defaults of an image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessingConfig {
    /// Upper bound on worker threads. `None` uses every rayon thread.
    pub max_processors: Option<usize>,
    /// Minimum pixels a worker must receive.
    pub overhead_limit_px: usize,
    /// Default lower range clipping bound (normalized).
    pub clip_low: f64,
    /// Default upper range clipping bound (normalized).
    pub clip_high: f64,
}

impl ProcessingConfig {
    /// Returns a copy with the thread bound set. Zero means "no bound".
    pub fn with_max_processors(mut self, n: usize) -> Self {
        self.max_processors = (n > 0).then_some(n);
        self
    }

    /// Returns a copy with the per-thread minimum set.
    pub fn with_overhead_limit(mut self, px: usize) -> Self {
        self.overhead_limit_px = px.max(1);
        self
    }

    /// Returns a copy with the default clipping bounds set. Reversed bounds
    /// are swapped.
    pub fn with_clip_range(mut self, low: f64, high: f64) -> Self {
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        self.clip_low = low;
        self.clip_high = high;
        self
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processors: None,
            overhead_limit_px: DEFAULT_OVERHEAD_LIMIT_PX,
            clip_low: 0.0,
            clip_high: 1.0,
        }
    }
}
