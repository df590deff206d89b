// benches/gpu_benchmarks.rs — GPU fill benchmarks.
//
// Mirrors benchmarks.rs structure. Each CPU stage has a corresponding GPU
// benchmark in the same group for direct comparison.
//
//   cargo bench --bench gpu_benchmarks
//
//
// CRITERION + GPU CAVEATS
// ────────────────────────
// Criterion measures wall time including CPU overhead (texture uploads,
// bind group creation, submit, readback). GPU shader execution is included
// in the readback poll. That is the right metric for the painting tool: the
// texture only changes once the filled result is back on the CPU.
//
// The first few iterations pay shader compilation costs on some drivers, so
// warmup_time is set explicitly.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use seamfill::buffer::ImageBuffer;
use seamfill::composite::Composite;
use seamfill::fill::{fill_composite, FillMode, FillOptions};
use seamfill::flood::{default_iterations, FloodFiller};
use seamfill::gpu::flood::{GpuFlood, GpuFloodPipeline};
use seamfill::gpu::pyramid::{GpuPyramid, GpuPyramidPipeline};
use seamfill::gpu::{GpuDevice, GpuFillPipeline};
use seamfill::image::Image;
use seamfill::kernels::{KernelCache, KernelKey, KernelSet};
use seamfill::pyramid::{max_levels, ConvolutionPyramid};

// ============================================================
// Shared helpers
// ============================================================

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
// Flood: CPU vs GPU
// ============================================================

fn bench_flood(c: &mut Criterion) {
    let (w, h) = (256, 256);
    let comp = make_composite(w, h, 3);
    let iterations = default_iterations(w, h);

    let gpu = GpuDevice::new().expect("no GPU adapter");
    let pipe = GpuFloodPipeline::new(&gpu);
    let mut gpu_flood = GpuFlood::new(&gpu, w, h).expect("flood slots");
    let mut cpu_flood = FloodFiller::new(w, h).expect("valid flood");

    let mut group = c.benchmark_group("flood");
    group.warm_up_time(Duration::from_secs(2));
    group.bench_function("cpu_256x256", |b| {
        b.iter(|| cpu_flood.floodfill(&comp, iterations))
    });
    group.bench_function("gpu_256x256", |b| {
        b.iter(|| gpu_flood.floodfill(&gpu, &pipe, &comp, iterations))
    });
    group.finish();
}

// ============================================================
// Pyramid: CPU vs GPU
// ============================================================

fn bench_pyramid(c: &mut Criterion) {
    let (w, h) = (256, 256);
    let levels = max_levels(w, h);
    let (src, weight) = make_weighted(&make_composite(w, h, 1));

    let gpu = GpuDevice::new().expect("no GPU adapter");
    let pipe = GpuPyramidPipeline::new(&gpu);
    let mut cache = KernelCache::new();
    let table = cache.get(KernelKey { width: w, height: h, levels, set: KernelSet::Membrane });
    let gpu_pyr = GpuPyramid::new_weighted(&gpu, table).expect("pyramid textures");
    let mut cpu_pyr = ConvolutionPyramid::build_weighted(w, h, levels, 1).expect("valid pyramid");

    let mut group = c.benchmark_group("pyramid");
    group.warm_up_time(Duration::from_secs(2));
    group.bench_function("cpu_replace_256x256", |b| {
        b.iter(|| cpu_pyr.process_weighted(&src, &weight))
    });
    group.bench_function("gpu_replace_256x256", |b| {
        b.iter(|| gpu_pyr.process_weighted(&gpu, &pipe, &src, &weight))
    });
    group.finish();
}

// ============================================================
// Full chain: CPU vs GPU
// ============================================================

fn bench_fill(c: &mut Criterion) {
    let gpu = GpuDevice::new().expect("no GPU adapter");
    let mut pipeline = GpuFillPipeline::new(&gpu);

    let mut group = c.benchmark_group("fill");
    group.warm_up_time(Duration::from_secs(2));
    for size in [256usize, 512] {
        let comp = make_composite(size, size, 3);
        for mode in [FillMode::Poisson, FillMode::Laplacian] {
            let options = FillOptions { mode, ..Default::default() };
            let id = format!("{mode:?}_{size}");
            group.bench_function(BenchmarkId::new("cpu", &id), |b| {
                b.iter(|| fill_composite(&comp, &options))
            });
            // Textures persist across iterations; only the first one allocates.
            group.bench_function(BenchmarkId::new("gpu", &id), |b| {
                b.iter(|| pipeline.fill(&gpu, &comp, &options))
            });
        }
    }
    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(benches, bench_flood, bench_pyramid, bench_fill);
criterion_main!(benches);
