//! Parallel reductions over image selections.
//!
//! Every function resolves `scope` against the image selection, splits the
//! rectangle into row bands (see [`pxl_core::parallel`]), scans each band on
//! its own task and combines the band results in band order:
//!
//! - extrema pairwise
//! - sums as Neumaier `(sum, compensation)` pairs
//! - order statistics by concatenating band samples and selecting once
//!
//! When range clipping is enabled on the image, samples outside the open
//! interval `(clip_low, clip_high)` are skipped. All values are normalized
//! to `[0, 1]`; complex samples contribute their magnitude.
//!
//! Empty selections (or selections where every sample is clipped) yield
//! zero, and `Point::NOT_FOUND` for located extrema.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ColorSpace, Image, Scope};
//! use pxl_stats::reduce;
//!
//! let img = Image::from_planes(vec![vec![0u8, 51, 102, 255]], 2, 2, ColorSpace::Gray).unwrap();
//! let scope = Scope::new();
//! assert_eq!(reduce::count(&img, &scope), 4);
//! assert_eq!(reduce::maximum_sample_value(&img, &scope), 1.0);
//! assert!((reduce::mean(&img, &scope) - 0.4).abs() < 1e-12);
//! ```

use pxl_core::{Image, ParsedSelection, Point, Rect, Sample, Scope, parallel};
use tracing::{debug, trace};

use crate::estimators::{self, StableSum};

/// A located extreme value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    /// Normalized value.
    pub value: f64,
    /// Pixel position, `Point::NOT_FOUND` when no sample was accepted.
    pub position: Point,
}

impl Located {
    const NONE: Located = Located {
        value: 0.0,
        position: Point::NOT_FOUND,
    };

    /// Returns `true` when a sample was found.
    pub fn is_found(&self) -> bool {
        self.position.is_found()
    }
}

// ============================================================================
// Band scanning
// ============================================================================

/// A resolved reduction over one image.
pub(crate) struct Pass<'a, T: Sample> {
    image: &'a Image<T>,
    selection: ParsedSelection,
    threads: usize,
}

impl<'a, T: Sample> Pass<'a, T> {
    pub(crate) fn new(image: &'a Image<T>, scope: &Scope, what: &'static str) -> Option<Self> {
        let selection = image.parse_selection(scope)?;
        let threads = image.threads_for(&selection);
        debug!(
            what,
            rect = %selection.rect,
            channels = selection.channel_count(),
            threads,
            "Reducing selection"
        );
        Some(Self {
            image,
            selection,
            threads,
        })
    }

    /// Folds every accepted sample into per-band accumulators and combines
    /// them in band order.
    pub(crate) fn fold<A, I, F, C>(&self, identity: I, visit: F, combine: C) -> A
    where
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(&mut A, u32, u32, f64) + Sync,
        C: Fn(A, A) -> A,
    {
        let clip = self.image.selection();
        let width = self.image.width() as usize;
        let planes: Vec<&[T]> = self
            .selection
            .channels()
            .filter_map(|c| self.image.plane(c))
            .collect();

        parallel::map_reduce_bands(
            self.selection.rect,
            self.threads,
            identity(),
            |band: Rect| {
                let mut acc = identity();
                for plane in &planes {
                    for y in band.y..band.bottom() {
                        let row = &plane[y as usize * width..][..width];
                        for x in band.x..band.right() {
                            let v = row[x as usize].to_f64();
                            if clip.accepts(v) {
                                visit(&mut acc, x, y, v);
                            }
                        }
                    }
                }
                trace!(band = %band, "Band reduced");
                acc
            },
            combine,
        )
    }

    /// Accepted samples in band order.
    pub(crate) fn collect(&self) -> Vec<f64> {
        self.fold(
            Vec::new,
            |acc, _, _, v| acc.push(v),
            |mut a, b| {
                a.extend(b);
                a
            },
        )
    }

    fn stable_sum(&self, f: impl Fn(f64) -> f64 + Sync) -> (StableSum, u64) {
        self.fold(
            || (StableSum::new(), 0u64),
            |acc, _, _, v| {
                acc.0.add(f(v));
                acc.1 += 1;
            },
            |a, b| (a.0.merge(b.0), a.1 + b.1),
        )
    }

    fn locate(&self, better: impl Fn(f64, f64) -> bool + Sync) -> Located {
        // Ties resolve to the topmost, then leftmost position.
        let pick = |a: Located, b: Located| -> Located {
            match (a.is_found(), b.is_found()) {
                (false, _) => b,
                (_, false) => a,
                _ if better(b.value, a.value) => b,
                _ if better(a.value, b.value) => a,
                _ if (b.position.y, b.position.x) < (a.position.y, a.position.x) => b,
                _ => a,
            }
        };
        self.fold(
            || Located::NONE,
            |acc, x, y, v| {
                let candidate = Located {
                    value: v,
                    position: Point::new(x as i32, y as i32),
                };
                *acc = pick(*acc, candidate);
            },
            &pick,
        )
    }
}

// ============================================================================
// Extrema
// ============================================================================

/// Smallest selected sample value.
pub fn minimum_sample_value<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    extreme_sample_values(image, scope).0
}

/// Largest selected sample value.
pub fn maximum_sample_value<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    extreme_sample_values(image, scope).1
}

/// Smallest and largest selected sample values.
pub fn extreme_sample_values<T: Sample>(image: &Image<T>, scope: &Scope) -> (f64, f64) {
    let Some(pass) = Pass::new(image, scope, "extremes") else {
        return (0.0, 0.0);
    };
    let (min, max) = pass.fold(
        || (f64::INFINITY, f64::NEG_INFINITY),
        |acc, _, _, v| {
            acc.0 = acc.0.min(v);
            acc.1 = acc.1.max(v);
        },
        |a, b| (a.0.min(b.0), a.1.max(b.1)),
    );
    if min > max { (0.0, 0.0) } else { (min, max) }
}

/// Smallest selected sample value and its position.
pub fn locate_minimum_sample_value<T: Sample>(image: &Image<T>, scope: &Scope) -> Located {
    Pass::new(image, scope, "locate minimum").map_or(Located::NONE, |p| p.locate(|a, b| a < b))
}

/// Largest selected sample value and its position.
pub fn locate_maximum_sample_value<T: Sample>(image: &Image<T>, scope: &Scope) -> Located {
    Pass::new(image, scope, "locate maximum").map_or(Located::NONE, |p| p.locate(|a, b| a > b))
}

// ============================================================================
// Sums and moments
// ============================================================================

/// Number of selected samples that pass range clipping.
pub fn count<T: Sample>(image: &Image<T>, scope: &Scope) -> u64 {
    Pass::new(image, scope, "count").map_or(0, |p| p.fold(|| 0u64, |acc, _, _, _| *acc += 1, |a, b| a + b))
}

/// Compensated sum of the selected samples.
pub fn sum<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    Pass::new(image, scope, "sum").map_or(0.0, |p| p.stable_sum(|v| v).0.value())
}

/// Arithmetic mean of the selected samples.
pub fn mean<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    let Some(pass) = Pass::new(image, scope, "mean") else {
        return 0.0;
    };
    let (s, n) = pass.stable_sum(|v| v);
    if n == 0 { 0.0 } else { s.value() / n as f64 }
}

/// Compensated sum of squared samples.
pub fn sum_of_squares<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    Pass::new(image, scope, "sum of squares").map_or(0.0, |p| p.stable_sum(|v| v * v).0.value())
}

/// Mean of squared samples.
pub fn mean_of_squares<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    let Some(pass) = Pass::new(image, scope, "mean of squares") else {
        return 0.0;
    };
    let (s, n) = pass.stable_sum(|v| v * v);
    if n == 0 { 0.0 } else { s.value() / n as f64 }
}

/// Euclidean norm: square root of the sum of squares.
pub fn norm<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    sum_of_squares(image, scope).sqrt()
}

/// Sum of absolute sample values.
pub fn modulus<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    Pass::new(image, scope, "modulus").map_or(0.0, |p| p.stable_sum(f64::abs).0.value())
}

/// Unbiased sample variance, computed in two passes.
///
/// The second pass accumulates `Σd²` and `Σd` with `d = x - mean` and
/// returns `(Σd² - (Σd)²/n) / (n - 1)`. Zero below two samples.
pub fn variance<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    let Some(pass) = Pass::new(image, scope, "variance") else {
        return 0.0;
    };
    let (s, n) = pass.stable_sum(|v| v);
    if n < 2 {
        return 0.0;
    }
    let m = s.value() / n as f64;
    let (d, d2) = pass.fold(
        || (StableSum::new(), StableSum::new()),
        |acc, _, _, v| {
            let d = v - m;
            acc.0.add(d);
            acc.1.add(d * d);
        },
        |a, b| (a.0.merge(b.0), a.1.merge(b.1)),
    );
    let n = n as f64;
    let d = d.value();
    ((d2.value() - d * d / n) / (n - 1.0)).max(0.0)
}

/// Standard deviation: square root of [`variance`].
pub fn std_dev<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    variance(image, scope).sqrt()
}

// ============================================================================
// Order statistics and robust scale
// ============================================================================

/// Selected samples after range clipping, in band order.
pub fn collect_samples<T: Sample>(image: &Image<T>, scope: &Scope) -> Vec<f64> {
    Pass::new(image, scope, "collect").map_or_else(Vec::new, |p| p.collect())
}

/// Median of the selected samples.
pub fn median<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    estimators::median(&mut collect_samples(image, scope))
}

/// Mean absolute deviation from the median.
pub fn avg_dev<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    let mut v = collect_samples(image, scope);
    let m = estimators::median(&mut v);
    estimators::avg_dev(&v, m)
}

/// Median absolute deviation from the median.
pub fn mad<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    let mut v = collect_samples(image, scope);
    let m = estimators::median(&mut v);
    estimators::mad(&v, m)
}

/// Biweight midvariance about the median with the MAD as dispersion and a
/// rejection limit of `k` sigmas.
pub fn biweight_midvariance<T: Sample>(image: &Image<T>, scope: &Scope, k: f64) -> f64 {
    let mut v = collect_samples(image, scope);
    let m = estimators::median(&mut v);
    let sigma = estimators::mad(&v, m);
    estimators::biweight_midvariance(&v, m, sigma, k)
}

/// Percentage bend midvariance about the median.
pub fn bend_midvariance<T: Sample>(image: &Image<T>, scope: &Scope, beta: f64) -> f64 {
    let mut v = collect_samples(image, scope);
    let m = estimators::median(&mut v);
    estimators::bend_midvariance(&v, m, beta)
}

/// Rousseeuw-Croux Sn estimator of the selected samples.
pub fn sn<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    estimators::sn(&mut collect_samples(image, scope))
}

/// Rousseeuw-Croux Qn estimator of the selected samples.
pub fn qn<T: Sample>(image: &Image<T>, scope: &Scope) -> f64 {
    estimators::qn(&mut collect_samples(image, scope))
}
