// demos/gpu_fill.rs — GPU fill vs CPU reference.
//
// Builds an RGBA composite from an image (or a generated pattern), keeps
// every texel of a sparse grid of squares as seeds, and fills the rest on
// both the CPU and the GPU. Alpha is filled like the other channels. Per-channel max error is printed; the three panels
// (seeds, CPU, GPU) are saved to a PNG.
//
// USAGE
// ─────
//   cargo run --example gpu_fill                          # generated pattern
//   cargo run --example gpu_fill -- path/to/img.png       # any image file
//   cargo run --example gpu_fill -- path/to/img.png laplacian out.png

use seamfill::convert::{buffer_from_rgba8, buffer_to_rgba8};
use seamfill::gpu::{GpuDevice, GpuFillPipeline};
use seamfill::{fill_composite, Composite, FillMode, FillOptions, ImageBuffer};

fn main() {
    // --- Parse arguments ---
    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(2).map(String::as_str) {
        Some("laplacian") => FillMode::Laplacian,
        _ => FillMode::Poisson,
    };
    let out_path = args.get(3).cloned().unwrap_or_else(|| "gpu_fill.png".to_string());

    // --- Load or generate source ---
    let src = match args.get(1) {
        Some(path) => load_rgba(path),
        None => {
            println!("[gpu_fill] no image path given, using generated pattern");
            gradient_pattern(320, 240)
        }
    };
    let (w, h) = (src.width(), src.height());

    let mut composite = Composite::new(w, h, 4).expect("valid composite");
    for y in 0..h {
        for x in 0..w {
            if (x / 6) % 5 == 0 && (y / 6) % 5 == 0 {
                let p = src.pixel(x, y);
                composite.paint_texel(x, y, &p);
            }
        }
    }
    println!("[gpu_fill] {w}×{h}, {} seeds, {mode:?}", composite.seed_count());
    let options = FillOptions { mode, ..Default::default() };

    // --- CPU ---
    let t = std::time::Instant::now();
    let cpu = fill_composite(&composite, &options).unwrap_or_else(|e| panic!("CPU fill failed: {e}"));
    println!("[gpu_fill] CPU: {:.1} ms", t.elapsed().as_secs_f64() * 1e3);

    // --- GPU ---
    let gpu = GpuDevice::new().unwrap_or_else(|e| panic!("GPU init failed: {e}"));
    println!("[gpu_fill] GPU: {gpu}");
    let mut pipeline = GpuFillPipeline::new(&gpu);
    // First call allocates and compiles; time the second.
    pipeline.fill(&gpu, &composite, &options).unwrap_or_else(|e| panic!("GPU fill failed: {e}"));
    let t = std::time::Instant::now();
    let gpu_out = pipeline.fill(&gpu, &composite, &options).unwrap_or_else(|e| panic!("GPU fill failed: {e}"));
    println!("[gpu_fill] GPU: {:.1} ms", t.elapsed().as_secs_f64() * 1e3);

    for ch in 0..4 {
        let err = cpu
            .plane(ch)
            .as_slice()
            .iter()
            .zip(gpu_out.plane(ch).as_slice())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        println!("[gpu_fill] channel {ch}: max_err={err:.5}");
    }

    // --- Save seeds | CPU | GPU ---
    let panels = [
        buffer_to_rgba8(&composite.color),
        buffer_to_rgba8(&cpu),
        buffer_to_rgba8(&gpu_out),
    ];
    let (pw, ph) = (w as u32, h as u32);
    let mut atlas = image::RgbaImage::new(pw * 3, ph);
    for (k, panel) in panels.iter().enumerate() {
        for (i, px) in panel.chunks_exact(4).enumerate() {
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            atlas.put_pixel(k as u32 * pw + x, y, image::Rgba([px[0], px[1], px[2], px[3]]));
        }
    }
    atlas.save(&out_path).unwrap_or_else(|e| panic!("failed to write {out_path}: {e}"));
    println!("[gpu_fill] written to {out_path}");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load any image format supported by the `image` crate as RGBA floats.
fn load_rgba(path: &str) -> ImageBuffer {
    let img = image::open(path)
        .unwrap_or_else(|e| panic!("failed to open {path}: {e}"))
        .to_rgba8();
    let (w, h) = img.dimensions();
    buffer_from_rgba8(img.as_raw(), w as usize, h as usize).unwrap_or_else(|e| panic!("bad image {path}: {e}"))
}

/// Smooth two-axis color gradient, fading out to the right.
fn gradient_pattern(width: usize, height: usize) -> ImageBuffer {
    let mut buf = ImageBuffer::new(width, height, 4).unwrap_or_else(|e| panic!("{e}"));
    for y in 0..height {
        for x in 0..width {
            let u = x as f32 / width as f32;
            let v = y as f32 / height as f32;
            buf.set_pixel(x, y, &[u, v, 1.0 - 0.5 * (u + v), 1.0 - 0.5 * u]);
        }
    }
    buf
}
