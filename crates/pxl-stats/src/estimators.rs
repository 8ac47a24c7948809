//! Slice-level estimators of location and scale.
//!
//! All functions work on normalized `f64` samples. Estimators that need an
//! order (median, MAD, Sn, Qn) take `&mut [f64]` and may reorder it.
//!
//! - [`StableSum`] - Neumaier compensated summation
//! - [`select`], [`median`] - Order statistics
//! - [`avg_dev`], [`mad`] - Absolute deviations from a center
//! - [`sn`], [`qn`] - Rousseeuw-Croux scale estimators
//! - [`biweight_midvariance`], [`bend_midvariance`] - Robust midvariances
//!
//! # Example
//!
//! ```rust
//! use pxl_stats::estimators;
//!
//! let mut v = vec![1.0, 2.0, 3.0, 4.0, 100.0];
//! assert_eq!(estimators::median(&mut v), 3.0);
//! let m = estimators::median(&mut v);
//! assert_eq!(estimators::mad(&v, m), 1.0);
//! ```

use rayon::prelude::*;

/// Below this count, even-sized medians average the two central values;
/// at or above it the upper median is used.
pub const SMALL_SAMPLE_LIMIT: usize = 65536;

/// Default rejection limit of the biweight midvariance, in sigma units.
pub const BWMV_K: f64 = 9.0;

/// Default rejection parameter of the percentage bend midvariance.
pub const PBMV_BETA: f64 = 0.2;

const PAR_SORT_THRESHOLD: usize = 1 << 16;

// ============================================================================
// Compensated summation
// ============================================================================

/// Neumaier compensated sum.
///
/// Partial sums merge with [`StableSum::merge`], so a sum split over row
/// bands agrees with the serial sum to floating-point precision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StableSum {
    sum: f64,
    compensation: f64,
}

impl StableSum {
    /// Empty sum.
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// Adds `x`.
    #[inline]
    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    /// Combines two partial sums.
    pub fn merge(mut self, other: StableSum) -> StableSum {
        self.add(other.sum);
        self.compensation += other.compensation;
        self
    }

    /// Compensated value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl Extend<f64> for StableSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.add(x);
        }
    }
}

impl FromIterator<f64> for StableSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut s = StableSum::new();
        s.extend(iter);
        s
    }
}

/// Compensated sum of `values`.
pub fn stable_sum(values: &[f64]) -> f64 {
    values.iter().copied().collect::<StableSum>().value()
}

/// Compensated mean of `values`; zero when empty.
pub fn stable_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    stable_sum(values) / values.len() as f64
}

// ============================================================================
// Order statistics
// ============================================================================

fn sort(values: &mut [f64]) {
    if values.len() >= PAR_SORT_THRESHOLD {
        values.par_sort_unstable_by(f64::total_cmp);
    } else {
        values.sort_unstable_by(f64::total_cmp);
    }
}

/// The `k`-th smallest value (zero-based), partially reordering `values`.
///
/// `k` is clamped to the last index; an empty slice yields zero.
pub fn select(values: &mut [f64], k: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let k = k.min(values.len() - 1);
    *values.select_nth_unstable_by(k, f64::total_cmp).1
}

/// Median of `values`, partially reordering them.
///
/// Even counts below [`SMALL_SAMPLE_LIMIT`] average the two central values;
/// larger even counts return the upper median.
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    match n {
        0 => 0.0,
        1 => values[0],
        _ => {
            let high = select(values, n / 2);
            if n % 2 == 0 && n < SMALL_SAMPLE_LIMIT {
                // The lower half now sits in values[..n/2].
                let low = values[..n / 2].iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (low + high) / 2.0
            } else {
                high
            }
        }
    }
}

// ============================================================================
// Deviations
// ============================================================================

/// Mean absolute deviation from `center`; zero below two samples.
pub fn avg_dev(values: &[f64], center: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let s: StableSum = values.iter().map(|&x| (x - center).abs()).collect();
    s.value() / values.len() as f64
}

/// Median absolute deviation from `center`; zero below two samples.
pub fn mad(values: &[f64], center: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut d: Vec<f64> = values.iter().map(|&x| (x - center).abs()).collect();
    median(&mut d)
}

// ============================================================================
// Rousseeuw-Croux estimators
// ============================================================================

/// `k`-th smallest (one-based) of the union of two ascending sequences.
fn kth_of_two(a: impl Fn(usize) -> f64, na: usize, b: impl Fn(usize) -> f64, nb: usize, k: usize) -> f64 {
    let mut lo = k.saturating_sub(nb);
    let mut hi = k.min(na);
    loop {
        let i = (lo + hi) / 2;
        let j = k - i;
        if i < na && j > 0 && b(j - 1) > a(i) {
            lo = i + 1;
        } else if i > 0 && j < nb && a(i - 1) > b(j) {
            hi = i - 1;
        } else {
            return match (i, j) {
                (0, _) => b(j - 1),
                (_, 0) => a(i - 1),
                _ => a(i - 1).max(b(j - 1)),
            };
        }
    }
}

/// Length of the prefix of `0..len` where `pred` holds.
fn partition_point(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut a, mut b) = (0, len);
    while a < b {
        let m = (a + b) / 2;
        if pred(m) {
            a = m + 1;
        } else {
            b = m;
        }
    }
    a
}

/// Sn scale estimator: `lomed_i himed_j |x_i - x_j|` with the finite-sample
/// correction, without the 1.1926 consistency factor.
///
/// Sorts `values`. Zero below two samples.
pub fn sn(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    sort(values);
    let x = &*values;

    // Excluding |x_i - x_i| = 0, the high median has rank n/2 among the
    // remaining n - 1 distances, which form two ascending runs.
    let k = n / 2;
    let mut inner: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| kth_of_two(|t| x[i] - x[i - 1 - t], i, |t| x[i + 1 + t] - x[i], n - 1 - i, k))
        .collect();

    let cn = match n {
        2 => 0.743,
        3 => 1.851,
        4 => 0.954,
        5 => 1.351,
        6 => 0.993,
        7 => 1.198,
        8 => 1.005,
        9 => 1.131,
        _ if n % 2 == 1 => n as f64 / (n as f64 - 0.9),
        _ => 1.0,
    };
    cn * select(&mut inner, (n + 1) / 2 - 1)
}

/// Weighted high median: the smallest value whose cumulative weight
/// exceeds half the total.
fn weighted_high_median(candidates: &mut [(f64, usize)]) -> f64 {
    candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
    let total: usize = candidates.iter().map(|c| c.1).sum();
    let mut acc = 0;
    for &(v, w) in candidates.iter() {
        acc += w;
        if 2 * acc > total {
            return v;
        }
    }
    candidates.last().map_or(0.0, |c| c.0)
}

/// Qn scale estimator: the `h(h-1)/2`-th smallest pairwise distance, with
/// `h = n/2 + 1` and the finite-sample correction, without the 2.2219
/// consistency factor.
///
/// Sorts `values`. Zero below two samples.
pub fn qn(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    sort(values);
    let y = &*values;

    let h = n / 2 + 1;
    let k = h * (h - 1) / 2;

    // Row i (1..n) holds y[i] - y[i-1-t] for t in 0..i, ascending in t.
    let at = |i: usize, t: usize| y[i] - y[i - 1 - t];
    let mut lo = vec![0usize; n];
    let mut hi: Vec<usize> = (0..n).collect();

    let estimate = loop {
        let active: usize = (1..n).map(|i| hi[i] - lo[i]).sum();
        if active <= n {
            let mut rest: Vec<f64> = (1..n)
                .flat_map(|i| (lo[i]..hi[i]).map(move |t| at(i, t)))
                .collect();
            let below: usize = lo.iter().sum();
            break select(&mut rest, k - below - 1);
        }

        let mut candidates: Vec<(f64, usize)> = (1..n)
            .filter(|&i| hi[i] > lo[i])
            .map(|i| {
                let w = hi[i] - lo[i];
                (at(i, lo[i] + w / 2), w)
            })
            .collect();
        let trial = weighted_high_median(&mut candidates);

        let counts: Vec<(usize, usize)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let less = partition_point(i, |t| at(i, t) < trial);
                let less_eq = partition_point(i, |t| at(i, t) <= trial);
                (less, less_eq)
            })
            .collect();
        let sum_less: usize = counts.iter().map(|c| c.0).sum();
        let sum_less_eq: usize = counts.iter().map(|c| c.1).sum();

        if k <= sum_less {
            for (bound, c) in hi.iter_mut().zip(&counts) {
                *bound = c.0;
            }
        } else if k > sum_less_eq {
            for (bound, c) in lo.iter_mut().zip(&counts) {
                *bound = c.1;
            }
        } else {
            break trial;
        }
    };

    let dn = match n {
        2 => 0.399,
        3 => 0.994,
        4 => 0.512,
        5 => 0.844,
        6 => 0.611,
        7 => 0.857,
        8 => 0.669,
        9 => 0.872,
        _ if n % 2 == 1 => n as f64 / (n as f64 + 1.4),
        _ => n as f64 / (n as f64 + 3.8),
    };
    dn * estimate
}

// ============================================================================
// Midvariances
// ============================================================================

/// Biweight midvariance about `center` with dispersion `sigma` (normally
/// the median and MAD) and rejection limit `k` sigmas.
///
/// Zero below two samples or for a vanishing `k * sigma`.
pub fn biweight_midvariance(values: &[f64], center: f64, sigma: f64, k: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let kd = k * sigma;
    if kd < 0.0 || 1.0 + kd == 1.0 {
        return 0.0;
    }
    let mut num = StableSum::new();
    let mut den = StableSum::new();
    for &x in values {
        let xc = x - center;
        let y = xc / kd;
        if y.abs() < 1.0 {
            let y2 = y * y;
            let y21 = 1.0 - y2;
            num.add(xc * xc * y21 * y21 * y21 * y21);
            den.add(y21 * (1.0 - 5.0 * y2));
        }
    }
    let den = den.value() * den.value();
    if 1.0 + den == 1.0 {
        return 0.0;
    }
    n as f64 * num.value() / den
}

/// Percentage bend midvariance about `center` with rejection parameter
/// `beta`, clamped to `[0, 0.5]`.
///
/// Zero below two samples.
pub fn bend_midvariance(values: &[f64], center: f64, beta: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let beta = beta.clamp(0.0, 0.5);
    let m = (((1.0 - beta) * n as f64 + 0.5).floor() as usize).min(n - 1);
    let mut w: Vec<f64> = values.iter().map(|&x| (x - center).abs()).collect();
    let wb = select(&mut w, m);
    if 1.0 + wb == 1.0 {
        return 0.0;
    }
    let mut num = StableSum::new();
    let mut den = 0usize;
    for &x in values {
        let y = (x - center) / wb;
        let f = y.clamp(-1.0, 1.0);
        num.add(f * f);
        if y.abs() < 1.0 {
            den += 1;
        }
    }
    if den == 0 {
        return 0.0;
    }
    let den = den as f64;
    n as f64 * wb * wb * num.value() / (den * den)
}
