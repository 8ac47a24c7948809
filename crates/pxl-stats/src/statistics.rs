//! All-at-once statistics of an image selection.
//!
//! [`ImageStatistics::compute`] gathers the selected samples once (in
//! parallel row bands) and derives every enabled statistic from them.
//! Besides the image's range clipping, optional low/high rejection limits
//! exclude samples `<= low` or `>= high`.

use pxl_core::{Image, Point, Sample, Scope};
use tracing::debug;

use crate::estimators::{self, BWMV_K, PBMV_BETA, StableSum};
use crate::reduce::{Located, Pass};

/// Which statistics [`ImageStatistics::compute`] evaluates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsOptions {
    /// Mean, variance and standard deviation.
    pub moments: bool,
    /// Median, average deviation and MAD.
    pub median: bool,
    /// Biweight midvariance.
    pub bwmv: bool,
    /// Percentage bend midvariance.
    pub pbmv: bool,
    /// Sn estimator.
    pub sn: bool,
    /// Qn estimator.
    pub qn: bool,
    /// Reject samples at or below this value.
    pub reject_low: Option<f64>,
    /// Reject samples at or above this value.
    pub reject_high: Option<f64>,
}

impl Default for StatisticsOptions {
    fn default() -> Self {
        Self {
            moments: true,
            median: true,
            bwmv: false,
            pbmv: false,
            sn: false,
            qn: false,
            reject_low: None,
            reject_high: None,
        }
    }
}

impl StatisticsOptions {
    /// Every statistic enabled, no rejection.
    pub fn all() -> Self {
        Self {
            bwmv: true,
            pbmv: true,
            sn: true,
            qn: true,
            ..Self::default()
        }
    }

    /// Sets the rejection limits.
    pub fn with_rejection(mut self, low: Option<f64>, high: Option<f64>) -> Self {
        self.reject_low = low;
        self.reject_high = high;
        self
    }

    fn accepts(&self, v: f64) -> bool {
        self.reject_low.is_none_or(|lo| v > lo) && self.reject_high.is_none_or(|hi| v < hi)
    }
}

/// Statistics of one selection. Disabled statistics are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStatistics {
    /// Samples included after clipping and rejection.
    pub count: u64,
    /// Smallest sample and its position.
    pub minimum: Located,
    /// Largest sample and its position.
    pub maximum: Located,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sum of squares.
    pub sum_of_squares: f64,
    /// Unbiased variance.
    pub variance: f64,
    /// Standard deviation.
    pub std_dev: f64,
    /// Median.
    pub median: f64,
    /// Mean absolute deviation from the median.
    pub avg_dev: f64,
    /// Median absolute deviation from the median.
    pub mad: f64,
    /// Biweight midvariance.
    pub bwmv: f64,
    /// Percentage bend midvariance.
    pub pbmv: f64,
    /// Sn estimator.
    pub sn: f64,
    /// Qn estimator.
    pub qn: f64,
}

impl Default for ImageStatistics {
    fn default() -> Self {
        let none = Located {
            value: 0.0,
            position: Point::NOT_FOUND,
        };
        Self {
            count: 0,
            minimum: none,
            maximum: none,
            mean: 0.0,
            sum_of_squares: 0.0,
            variance: 0.0,
            std_dev: 0.0,
            median: 0.0,
            avg_dev: 0.0,
            mad: 0.0,
            bwmv: 0.0,
            pbmv: 0.0,
            sn: 0.0,
            qn: 0.0,
        }
    }
}

/// Per-band gather state.
struct Gather {
    samples: Vec<f64>,
    min: Located,
    max: Located,
}

impl Gather {
    fn new() -> Self {
        let none = ImageStatistics::default().minimum;
        Self {
            samples: Vec::new(),
            min: none,
            max: none,
        }
    }

    fn merge(mut self, other: Gather) -> Gather {
        self.samples.extend(other.samples);
        // Bands arrive top to bottom, so strict comparison keeps the first.
        if other.min.is_found() && (!self.min.is_found() || other.min.value < self.min.value) {
            self.min = other.min;
        }
        if other.max.is_found() && (!self.max.is_found() || other.max.value > self.max.value) {
            self.max = other.max;
        }
        self
    }
}

/// Row-major order of two positions.
fn precedes(a: &Located, b: &Located) -> bool {
    (a.position.y, a.position.x) < (b.position.y, b.position.x)
}

impl ImageStatistics {
    /// Computes the statistics enabled in `options` over the samples
    /// selected by `scope`.
    pub fn compute<T: Sample>(image: &Image<T>, scope: &Scope, options: &StatisticsOptions) -> Self {
        let Some(pass) = Pass::new(image, scope, "statistics") else {
            return Self::default();
        };
        let gathered = pass.fold(
            Gather::new,
            |g, x, y, v| {
                if !options.accepts(v) {
                    return;
                }
                let here = Located {
                    value: v,
                    position: Point::new(x as i32, y as i32),
                };
                if !g.min.is_found() || v < g.min.value || (v == g.min.value && precedes(&here, &g.min)) {
                    g.min = here;
                }
                if !g.max.is_found() || v > g.max.value || (v == g.max.value && precedes(&here, &g.max)) {
                    g.max = here;
                }
                g.samples.push(v);
            },
            Gather::merge,
        );
        let mut samples = gathered.samples;
        debug!(count = samples.len(), "Computing statistics");

        let mut stats = ImageStatistics {
            count: samples.len() as u64,
            minimum: gathered.min,
            maximum: gathered.max,
            ..Self::default()
        };
        if samples.is_empty() {
            return stats;
        }

        if options.moments {
            let n = samples.len() as f64;
            let mean = estimators::stable_mean(&samples);
            let mut d = StableSum::new();
            let mut d2 = StableSum::new();
            let mut sq = StableSum::new();
            for &v in &samples {
                d.add(v - mean);
                d2.add((v - mean) * (v - mean));
                sq.add(v * v);
            }
            stats.mean = mean;
            stats.sum_of_squares = sq.value();
            if samples.len() > 1 {
                stats.variance = ((d2.value() - d.value() * d.value() / n) / (n - 1.0)).max(0.0);
                stats.std_dev = stats.variance.sqrt();
            }
        }

        let needs_median = options.median || options.bwmv || options.pbmv;
        if needs_median {
            let median = estimators::median(&mut samples);
            let mad = estimators::mad(&samples, median);
            if options.median {
                stats.median = median;
                stats.avg_dev = estimators::avg_dev(&samples, median);
                stats.mad = mad;
            }
            if options.bwmv {
                stats.bwmv = estimators::biweight_midvariance(&samples, median, mad, BWMV_K);
            }
            if options.pbmv {
                stats.pbmv = estimators::bend_midvariance(&samples, median, PBMV_BETA);
            }
        }
        if options.sn {
            stats.sn = estimators::sn(&mut samples.clone());
        }
        if options.qn {
            stats.qn = estimators::qn(&mut samples);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce;
    use approx::assert_relative_eq;
    use pxl_core::ColorSpace;

    fn image() -> Image<f64> {
        let plane: Vec<f64> = (0..400).map(|i| ((i * 37) % 101) as f64 / 100.0).collect();
        Image::from_planes(vec![plane], 20, 20, ColorSpace::Gray).unwrap()
    }

    #[test]
    fn test_bundle_matches_individual_reductions() {
        let img = image();
        let all = Scope::new();
        let s = ImageStatistics::compute(&img, &all, &StatisticsOptions::all());
        assert_eq!(s.count, reduce::count(&img, &all));
        assert_relative_eq!(s.mean, reduce::mean(&img, &all), max_relative = 1e-12);
        assert_relative_eq!(s.variance, reduce::variance(&img, &all), max_relative = 1e-9);
        assert_relative_eq!(s.median, reduce::median(&img, &all));
        assert_relative_eq!(s.mad, reduce::mad(&img, &all));
        assert_relative_eq!(s.sn, reduce::sn(&img, &all));
        assert_relative_eq!(s.qn, reduce::qn(&img, &all));
        assert_relative_eq!(s.bwmv, reduce::biweight_midvariance(&img, &all, BWMV_K), max_relative = 1e-12);
        assert_eq!(s.minimum, reduce::locate_minimum_sample_value(&img, &all));
        assert_eq!(s.maximum, reduce::locate_maximum_sample_value(&img, &all));
    }

    #[test]
    fn test_rejection_limits() {
        let img = Image::from_planes(vec![vec![0.0f32, 0.2, 0.4, 1.0]], 4, 1, ColorSpace::Gray).unwrap();
        let opts = StatisticsOptions::default().with_rejection(Some(0.0), Some(1.0));
        let s = ImageStatistics::compute(&img, &Scope::new(), &opts);
        assert_eq!(s.count, 2);
        assert_relative_eq!(s.mean, 0.3, epsilon = 1e-6);
        assert_eq!(s.minimum.position, Point::new(1, 0));
        assert_eq!(s.maximum.position, Point::new(2, 0));
    }

    #[test]
    fn test_disabled_statistics_stay_zero() {
        let img = image();
        let opts = StatisticsOptions {
            moments: false,
            median: false,
            ..StatisticsOptions::default()
        };
        let s = ImageStatistics::compute(&img, &Scope::new(), &opts);
        assert_eq!(s.count, 400);
        assert_eq!((s.mean, s.median, s.sn), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_image() {
        let s = ImageStatistics::compute(&Image::<u8>::default(), &Scope::new(), &StatisticsOptions::all());
        assert_eq!(s, ImageStatistics::default());
        assert!(!s.minimum.is_found());
    }
}
