// demos/paint_fill.rs — Paint a few strokes and save the filled texture.
//
// Drives the painting tool the way an editor would: stroke samples in UV
// space, one `update()` per frame until the fill lands. The composite and
// the filled result are written side by side to a PNG.
//
// USAGE
// ─────
//   cargo run --example paint_fill                         # Poisson, 256×256
//   cargo run --example paint_fill -- laplacian            # Laplacian solver
//   cargo run --example paint_fill -- poisson out.png 512  # path and size
//
// Set RUST_LOG-style verbosity with SEAMFILL_LOG=debug.

use seamfill::brush::{BrushMode, BrushShape, StrokePoint};
use seamfill::convert::buffer_to_rgba8;
use seamfill::{FillMode, ImageBuffer, PainterConfig, PaintingTool, ToolState};

/// Minimal stderr logger; the library only emits through `log`.
struct StderrLogger(log::LevelFilter);

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.0
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging() {
    let level = match std::env::var("SEAMFILL_LOG").as_deref() {
        Ok("trace") => log::LevelFilter::Trace,
        Ok("debug") => log::LevelFilter::Debug,
        Ok("warn") => log::LevelFilter::Warn,
        _ => log::LevelFilter::Info,
    };
    let logger: &'static StderrLogger = Box::leak(Box::new(StderrLogger(level)));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    init_logging();

    // --- Parse arguments ---
    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        Some("laplacian") => FillMode::Laplacian,
        _ => FillMode::Poisson,
    };
    let out_path = args.get(2).cloned().unwrap_or_else(|| "paint_fill.png".to_string());
    let size: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(256);

    let target = ImageBuffer::filled(size, size, &[0.5, 0.5, 0.5]).expect("valid target");
    let config = PainterConfig { fill_mode: mode, passes_per_frame: 4, ..Default::default() };
    let mut tool = PaintingTool::new(config, target).expect("valid tool");

    // --- Strokes ---
    let strokes: [([f32; 4], (f32, f32), (f32, f32)); 3] = [
        ([0.9, 0.2, 0.1, 1.0], (0.15, 0.2), (0.45, 0.35)),
        ([0.1, 0.6, 0.9, 1.0], (0.7, 0.15), (0.8, 0.8)),
        ([0.95, 0.85, 0.2, 1.0], (0.2, 0.85), (0.5, 0.6)),
    ];
    for (color, from, to) in strokes {
        tool.set_brush_color(color);
        for i in 0..=16 {
            let t = i as f32 / 16.0;
            let p = StrokePoint::new(from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
            tool.paint(p, size as f32 / 64.0, BrushShape::Circle, BrushMode::Draw);
        }
        tool.end_stroke();

        // One update per "frame".
        let mut frames = 0;
        while tool.state() == ToolState::Filling {
            tool.update();
            frames += 1;
        }
        log::info!("[paint_fill] stroke filled in {frames} frames");
        if let Some(msg) = tool.last_message() {
            log::warn!("[paint_fill] {msg}");
        }
    }

    // --- Save composite | result ---
    let composite = buffer_to_rgba8(&tool.composite().color);
    let result = buffer_to_rgba8(tool.result_texture());
    let w = size as u32;
    let mut atlas = image::RgbaImage::new(w * 2, w);
    for (i, px) in composite.chunks_exact(4).enumerate() {
        let (x, y) = ((i % size) as u32, (i / size) as u32);
        atlas.put_pixel(x, y, image::Rgba([px[0], px[1], px[2], px[3]]));
    }
    for (i, px) in result.chunks_exact(4).enumerate() {
        let (x, y) = ((i % size) as u32, (i / size) as u32);
        atlas.put_pixel(w + x, y, image::Rgba([px[0], px[1], px[2], px[3]]));
    }
    atlas.save(&out_path).unwrap_or_else(|e| panic!("failed to write {out_path}: {e}"));
    log::info!("[paint_fill] {mode:?} result written to {out_path}");
}
