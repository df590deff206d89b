// benches/benchmarks.rs -- Per-stage and full-chain CPU benchmarks.
//
//   cargo bench --bench benchmarks
//
// All inputs are synthetic: a 256×256 texture with a handful of painted
// strokes, the size the painting tool works at interactively.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use seamfill::buffer::ImageBuffer;
use seamfill::composite::Composite;
use seamfill::fill::{fill_composite, FillMode, FillOptions};
use seamfill::flood::{default_iterations, FloodFiller};
use seamfill::image::Image;
use seamfill::pyramid::{max_levels, ConvolutionPyramid};

// ============================================================
// Helpers
// ============================================================

/// A few diagonal strokes and blobs in different colors.
fn make_composite(w: usize, h: usize, channels: usize) -> Composite {
    let mut c = Composite::new(w, h, channels).expect("valid composite");
    for stroke in 0..5 {
        let col = [0.2 * stroke as f32, 1.0 - 0.15 * stroke as f32, 0.5, 1.0];
        let x0 = 20 + stroke * 40;
        for t in 0..h / 2 {
            let x = (x0 + t / 3) % w;
            let y = (30 + t) % h;
            for dy in 0..3 {
                for dx in 0..3 {
                    c.paint_texel((x + dx).min(w - 1), (y + dy).min(h - 1), &col[..channels]);
                }
            }
        }
    }
    c
}

/// Premultiplied single-channel colors and their weight plane.
fn make_weighted(c: &Composite) -> (ImageBuffer, Image<f32>) {
    let (w, h) = (c.width(), c.height());
    let mut colors = ImageBuffer::new(w, h, 1).expect("valid buffer");
    let mut weight = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if c.is_seed(x, y) {
                colors.set(x, y, 0, c.color.get(x, y, 0));
                weight.set(x, y, 1.0);
            }
        }
    }
    (colors, weight)
}

// ============================================================
// Per-stage benchmarks
// ============================================================

fn bench_flood(c: &mut Criterion) {
    let (w, h) = (256, 256);
    let comp = make_composite(w, h, 3);
    let mut flood = FloodFiller::new(w, h).expect("valid flood");

    let mut group = c.benchmark_group("flood");
    group.bench_function("jfa_256x256", |b| {
        b.iter(|| flood.floodfill(&comp, default_iterations(w, h)))
    });
    group.finish();
}

fn bench_pyramid(c: &mut Criterion) {
    let (w, h) = (256, 256);
    let (src, weight) = make_weighted(&make_composite(w, h, 1));

    let mut group = c.benchmark_group("pyramid");
    for levels in [4, max_levels(w, h)] {
        let mut pyr = ConvolutionPyramid::build_weighted(w, h, levels, 1).expect("valid pyramid");
        group.bench_function(BenchmarkId::new("replace_256x256", levels), |b| {
            b.iter(|| pyr.process_weighted(&src, &weight))
        });
    }
    group.finish();
}

// ============================================================
// Full chain
// ============================================================

fn bench_fill(c: &mut Criterion) {
    let (w, h) = (256, 256);
    let comp = make_composite(w, h, 3);

    let mut group = c.benchmark_group("fill");
    for mode in [FillMode::Poisson, FillMode::Laplacian] {
        let options = FillOptions { mode, ..Default::default() };
        group.bench_function(BenchmarkId::new("rgb_256x256", format!("{mode:?}")), |b| {
            b.iter(|| fill_composite(&comp, &options))
        });
    }
    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(benches, bench_flood, bench_pyramid, bench_fill);
criterion_main!(benches);
