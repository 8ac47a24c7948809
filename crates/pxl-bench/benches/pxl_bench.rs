//! Benchmarks for pxl operations.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use pxl_core::{ColorSpace, Image, ImageOp, Rect, Scope};
use pxl_stats::{ImageStatistics, StatisticsOptions, reduce};

/// Deterministic RGB test image.
fn test_image(size: u32) -> Image<f32> {
    let n = (size * size) as usize;
    let planes = (0..3)
        .map(|c| (0..n).map(|i| ((i * (c + 5)) % 251) as f32 / 250.0).collect())
        .collect();
    Image::from_planes(planes, size, size, ColorSpace::Rgb).expect("test image")
}

/// Benchmark elementwise operators.
fn bench_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("arithmetic");

    for size in [256u32, 1024, 2048] {
        let image = test_image(size);
        group.throughput(Throughput::Elements(image.number_of_samples() as u64));

        group.bench_with_input(BenchmarkId::new("mul_scalar", size), &image, |b, img| {
            b.iter(|| {
                let mut img = img.clone();
                img.apply_scalar(black_box(0.5), ImageOp::Mul, &Scope::new()).expect("mul");
                img
            })
        });

        let rhs = test_image(size);
        group.bench_with_input(BenchmarkId::new("add_image", size), &image, |b, img| {
            b.iter(|| img.applied(black_box(&rhs), ImageOp::Add).expect("add"))
        });

        group.bench_with_input(BenchmarkId::new("screen_rect", size), &image, |b, img| {
            let scope = Scope::new().rect(Rect::new(size / 4, size / 4, size / 2, size / 2));
            b.iter(|| {
                let mut img = img.clone();
                img.apply_scalar(black_box(0.25), ImageOp::Screen, &scope).expect("screen");
                img
            })
        });
    }

    group.finish();
}

/// Benchmark reductions and robust estimators.
fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [256u32, 1024] {
        let image = test_image(size);
        let scope = Scope::new().channel(0);
        group.throughput(Throughput::Elements(image.number_of_pixels() as u64));

        group.bench_with_input(BenchmarkId::new("mean", size), &image, |b, img| {
            b.iter(|| reduce::mean(black_box(img), &scope))
        });

        group.bench_with_input(BenchmarkId::new("median", size), &image, |b, img| {
            b.iter(|| reduce::median(black_box(img), &scope))
        });

        group.bench_with_input(BenchmarkId::new("qn", size), &image, |b, img| {
            b.iter(|| reduce::qn(black_box(img), &scope))
        });

        group.bench_with_input(BenchmarkId::new("all", size), &image, |b, img| {
            let options = StatisticsOptions::all();
            b.iter(|| ImageStatistics::compute(black_box(img), &scope, &options))
        });
    }

    group.finish();
}

/// Benchmark whole-image color space conversion.
fn bench_color(c: &mut Criterion) {
    let mut group = c.benchmark_group("color");

    for size in [256u32, 1024] {
        let image = test_image(size);
        group.throughput(Throughput::Elements(image.number_of_pixels() as u64));

        for target in [ColorSpace::Hsv, ColorSpace::CieLab, ColorSpace::Gray] {
            group.bench_with_input(BenchmarkId::new(target.to_string(), size), &image, |b, img| {
                b.iter(|| {
                    let mut img = img.clone();
                    pxl_color::set_color_space(&mut img, target, None).expect("convert");
                    img
                })
            });
        }

        group.bench_with_input(BenchmarkId::new("lightness", size), &image, |b, img| {
            b.iter(|| pxl_color::lightness(black_box(img), None).expect("lightness"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_arithmetic, bench_statistics, bench_color);

criterion_main!(benches);
