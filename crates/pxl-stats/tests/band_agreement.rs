//! Reductions must not depend on how many row bands they are split into.

use approx::assert_relative_eq;
use pxl_core::parallel::row_bands;
use pxl_core::{ColorSpace, Image, ImageOp, Point, ProcessingConfig, Rect, Scope};
use pxl_stats::{ImageStatistics, StatisticsOptions, reduce};

fn noise(width: u32, height: u32) -> Image<f32> {
    let mut state = 0x9e37_79b9u32;
    let plane = (0..width * height)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect();
    Image::from_planes(vec![plane], width, height, ColorSpace::Gray).unwrap()
}

/// Runs `f` on a dedicated pool of `threads` workers, so band counts do not
/// depend on the machine running the tests.
fn on_pool<R: Send>(threads: usize, f: impl FnOnce() -> R + Send) -> R {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap()
        .install(f)
}

/// Row bands a full-image reduction of `img` is split into.
fn bands(img: &Image<f32>) -> usize {
    let sel = img.parse_selection(&Scope::new()).unwrap();
    row_bands(sel.rect, img.threads_for(&sel)).len()
}

#[test]
fn test_moments_agree_across_thread_counts() {
    let img = noise(257, 131);
    let all = Scope::new();
    let reduce_all = || {
        (
            reduce::mean(&img, &all),
            reduce::norm(&img, &all),
            reduce::variance(&img, &all),
            reduce::extreme_sample_values(&img, &all),
            reduce::median(&img, &all),
        )
    };

    let (one, serial) = on_pool(1, || (bands(&img), reduce_all()));
    assert_eq!(one, 1);
    for n in [2, 3, 8] {
        let (count, split) = on_pool(n, || (bands(&img), reduce_all()));
        assert_eq!(count, n);
        assert_relative_eq!(serial.0, split.0, epsilon = 1e-9);
        assert_relative_eq!(serial.1, split.1, epsilon = 1e-9);
        assert_relative_eq!(serial.2, split.2, epsilon = 1e-9);
        assert_eq!(serial.3, split.3);
        assert_eq!(serial.4, split.4);
    }
}

#[test]
fn test_locate_ties_across_bands() {
    // Equal maxima in the first, middle and last bands of an 8-way split.
    let mut img = noise(64, 64);
    img.set_processing_config(ProcessingConfig::default().with_overhead_limit(64));
    img.apply_scalar(0.5, ImageOp::Min, &Scope::new()).unwrap();
    for (x, y) in [(40, 60), (7, 30), (3, 30), (50, 2), (9, 2)] {
        img.set_sample(x, y, 0, 1.0).unwrap();
    }
    img.set_sample(0, 0, 0, 0.0).unwrap();
    img.set_sample(63, 63, 0, 0.0).unwrap();

    for n in [1, 2, 3, 8] {
        let (count, max, min, stats) = on_pool(n, || {
            (
                bands(&img),
                reduce::locate_maximum_sample_value(&img, &Scope::new()),
                reduce::locate_minimum_sample_value(&img, &Scope::new()),
                ImageStatistics::compute(&img, &Scope::new(), &StatisticsOptions::default()),
            )
        });
        assert_eq!(count, n);
        assert_eq!(max.position, Point::new(9, 2));
        assert_eq!(min.position, Point::new(0, 0));
        assert_eq!(stats.maximum.position, Point::new(9, 2));
        assert_eq!(stats.minimum.position, Point::new(0, 0));
    }
}

#[test]
fn test_statistics_of_sub_rectangle() {
    let img = noise(64, 64);
    let rect = Rect::new(10, 20, 30, 15);
    let scope = Scope::new().rect(rect);
    let stats = ImageStatistics::compute(&img, &scope, &StatisticsOptions::all());
    assert_eq!(stats.count, 450);
    let sub = {
        let mut s = img.clone();
        s.select_rectangle(rect);
        s.selected_subset()
    };
    assert_relative_eq!(stats.median, reduce::median(&sub, &Scope::new()));
    assert_relative_eq!(stats.qn, reduce::qn(&sub, &Scope::new()));
    let min = stats.minimum.position;
    assert!(rect.contains(min.x as u32, min.y as u32));
}

#[test]
fn test_range_clipping_excludes_samples() {
    let mut img = noise(50, 50);
    img.set_range_clipping(0.25, 0.75);
    img.enable_range_clipping(true);
    let kept = reduce::count(&img, &Scope::new());
    let samples = reduce::collect_samples(&img, &Scope::new());
    assert_eq!(kept as usize, samples.len());
    assert!(samples.iter().all(|&v| v > 0.25 && v < 0.75));
    assert!(kept < 2500);
}
