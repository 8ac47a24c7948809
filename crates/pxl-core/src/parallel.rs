//! Row-band partitioning and parallel map-reduce.
//!
//! Parallel operations over an image split the selected rectangle into
//! contiguous row bands, process each band on its own rayon task and
//! combine the per-band results after all tasks have joined. Results are
//! combined in band order, so a reduction is deterministic for a given
//! thread count.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{Rect, parallel};
//!
//! let rect = Rect::new(0, 0, 100, 40);
//! let rows: Vec<u32> = parallel::map_bands(rect, 4, |band| band.height);
//! assert_eq!(rows.iter().sum::<u32>(), 40);
//! ```

use rayon::prelude::*;
use tracing::trace;

use crate::rect::Rect;

/// Upper bound on worker threads: rayon's pool size, optionally lowered.
pub fn max_threads(max_processors: Option<usize>) -> usize {
    let pool = rayon::current_num_threads().max(1);
    match max_processors {
        Some(n) if n > 0 => n.min(pool),
        _ => pool,
    }
}

/// Number of threads for `count` work items, each thread receiving at
/// least `overhead_limit` items.
///
/// # Example
///
/// ```rust
/// use pxl_core::parallel::number_of_threads;
///
/// assert_eq!(number_of_threads(10, Some(8), 16), 1);
/// assert_eq!(number_of_threads(1_000_000, Some(1), 16), 1);
/// ```
pub fn number_of_threads(count: usize, max_processors: Option<usize>, overhead_limit: usize) -> usize {
    let by_work = count / overhead_limit.max(1);
    by_work.clamp(1, max_threads(max_processors))
}

/// Number of threads for `rows` rows of `width` pixels, each thread
/// receiving at least `overhead_limit_px` pixels.
pub fn number_of_threads_for_rows(
    rows: usize,
    width: usize,
    max_processors: Option<usize>,
    overhead_limit_px: usize,
) -> usize {
    if rows == 0 || width == 0 {
        return 1;
    }
    let rows_per_thread = overhead_limit_px.max(1).div_ceil(width).max(1);
    (rows / rows_per_thread).clamp(1, max_threads(max_processors)).min(rows)
}

/// Splits `rect` into at most `bands` contiguous row bands.
///
/// Leftover rows go to the first bands, one each.
pub fn row_bands(rect: Rect, bands: usize) -> Vec<Rect> {
    if rect.is_empty() {
        return Vec::new();
    }
    let bands = bands.clamp(1, rect.height as usize) as u32;
    let base = rect.height / bands;
    let extra = rect.height % bands;
    let mut y = rect.y;
    (0..bands)
        .map(|i| {
            let h = base + u32::from(i < extra);
            let band = Rect::new(rect.x, y, rect.width, h);
            y += h;
            band
        })
        .collect()
}

/// Runs `map` over the row bands of `rect`, in parallel when `threads > 1`.
///
/// Results are returned in band order.
pub fn map_bands<R, F>(rect: Rect, threads: usize, map: F) -> Vec<R>
where
    R: Send,
    F: Fn(Rect) -> R + Send + Sync,
{
    let bands = row_bands(rect, threads);
    trace!(bands = bands.len(), threads, "Row bands");
    if bands.len() <= 1 {
        return bands.into_iter().map(map).collect();
    }
    bands.into_par_iter().map(map).collect()
}

/// Maps the row bands of `rect` and folds the results in band order.
pub fn map_reduce_bands<R, F, C>(rect: Rect, threads: usize, identity: R, map: F, combine: C) -> R
where
    R: Send,
    F: Fn(Rect) -> R + Send + Sync,
    C: Fn(R, R) -> R,
{
    map_bands(rect, threads, map).into_iter().fold(identity, combine)
}

/// Work counter for long-running operations.
///
/// Workers report the samples they processed after their band completes;
/// counts are summed after the join rather than updated mid-flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    count: u64,
}

impl Progress {
    /// Units of work recorded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Records `n` units of work.
    pub fn add(&mut self, n: u64) {
        self.count = self.count.saturating_add(n);
    }

    /// Clears the counter.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_bands_cover_rect() {
        let rect = Rect::new(3, 5, 10, 11);
        let bands = row_bands(rect, 4);
        assert_eq!(bands.len(), 4);
        assert_eq!(bands[0], Rect::new(3, 5, 10, 3));
        assert_eq!(bands.iter().map(|b| b.height).sum::<u32>(), 11);
        for pair in bands.windows(2) {
            assert_eq!(pair[0].bottom(), pair[1].y);
        }
        assert_eq!(bands.last().unwrap().bottom(), rect.bottom());
    }

    #[test]
    fn test_row_bands_more_bands_than_rows() {
        assert_eq!(row_bands(Rect::new(0, 0, 5, 2), 8).len(), 2);
        assert!(row_bands(Rect::new(0, 0, 5, 0), 8).is_empty());
    }

    #[test]
    fn test_thread_heuristics() {
        assert_eq!(number_of_threads(0, None, 16), 1);
        assert!(number_of_threads(1 << 20, None, 16) <= rayon::current_num_threads());
        assert_eq!(number_of_threads_for_rows(4, 4, None, 1024), 1);
        assert_eq!(number_of_threads_for_rows(1000, 1000, Some(1), 1024), 1);
    }

    #[test]
    fn test_map_reduce_is_band_ordered() {
        let rect = Rect::new(0, 0, 1, 10);
        let order = map_reduce_bands(rect, 3, Vec::new(), |b| vec![b.y], |mut a, b| {
            a.extend(b);
            a
        });
        assert_eq!(order, vec![0, 4, 7]);
    }

    #[test]
    fn test_progress() {
        let mut p = Progress::default();
        p.add(10);
        p.add(5);
        assert_eq!(p.count(), 15);
        p.reset();
        assert_eq!(p.count(), 0);
    }
}
