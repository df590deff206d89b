// tests/test_painting.rs — Painting tool state machine and backend handling.

use seamfill::brush::{BrushMode, BrushShape, StrokePoint};
use seamfill::buffer::ImageBuffer;
use seamfill::composite::Composite;
use seamfill::fill::{FillMode, FillOptions};
use seamfill::gpu::GpuError;
use seamfill::painting::{FillBackend, PainterConfig, PaintingTool, ToolState};
use seamfill::FillError;

/// Backend that accepts every fill and fails it on the first advance, the
/// way a GPU backend does when an allocation runs out of memory.
#[derive(Default)]
struct FailingBackend {
    busy: bool,
    begins: usize,
}

impl FillBackend for FailingBackend {
    fn begin(&mut self, _composite: &Composite, _options: &FillOptions) -> Result<(), FillError> {
        self.busy = true;
        self.begins += 1;
        Ok(())
    }

    fn advance(&mut self, _budget: usize) -> Result<Option<ImageBuffer>, FillError> {
        self.busy = false;
        Err(FillError::Device(GpuError::OutOfMemory("pyramid level 0".into())))
    }

    fn cancel(&mut self) {
        self.busy = false;
    }

    fn is_busy(&self) -> bool {
        self.busy
    }
}

fn target() -> ImageBuffer {
    ImageBuffer::filled(32, 32, &[0.1, 0.2, 0.3]).unwrap()
}

fn dab(tool: &mut PaintingTool<impl FillBackend>, u: f32, v: f32) {
    tool.paint(StrokePoint::new(u, v), 2.0, BrushShape::Circle, BrushMode::Draw);
}

#[test]
fn stroke_fill_cycle_updates_the_texture() {
    let mut tool = PaintingTool::new(PainterConfig::default(), target()).unwrap();
    tool.set_brush_color([1.0, 0.0, 0.0, 1.0]);
    dab(&mut tool, 0.25, 0.25);
    dab(&mut tool, 0.3, 0.25);
    assert_eq!(tool.state(), ToolState::Drawing);
    tool.end_stroke();
    assert_eq!(tool.state(), ToolState::Filling);

    assert!(tool.flush());
    assert_eq!(tool.state(), ToolState::Idle);
    assert!(tool.last_message().is_none());
    let p = tool.result_texture().pixel(31, 31);
    assert!((p[0] - 1.0).abs() < 1e-4 && p[1].abs() < 1e-4, "{p:?}");
}

#[test]
fn rgba_texture_fills_in_poisson_mode() {
    let rgba = ImageBuffer::filled(32, 32, &[0.1, 0.2, 0.3, 1.0]).unwrap();
    let mut tool = PaintingTool::new(PainterConfig::default(), rgba).unwrap();
    assert_eq!(tool.config().fill_mode, FillMode::Poisson);
    tool.set_brush_color([1.0, 0.0, 0.0, 1.0]);
    dab(&mut tool, 0.25, 0.25);
    tool.end_stroke();

    assert!(tool.flush());
    assert!(tool.last_message().is_none());
    let p = tool.result_texture().pixel(31, 31);
    assert_eq!(tool.result_texture().channels(), 4);
    assert!((p[0] - 1.0).abs() < 1e-4 && p[1].abs() < 1e-4, "{p:?}");
    assert!((p[3] - 1.0).abs() < 1e-4, "{p:?}");
}

#[test]
fn fill_spreads_over_several_updates() {
    let config = PainterConfig { passes_per_frame: 1, ..Default::default() };
    let mut tool = PaintingTool::new(config, target()).unwrap();
    dab(&mut tool, 0.5, 0.5);
    tool.end_stroke();
    let mut frames = 1;
    while !tool.update() {
        frames += 1;
        assert_eq!(tool.state(), ToolState::Filling);
    }
    assert!(frames > 5, "one pass per frame should take several frames, took {frames}");
}

#[test]
fn new_stroke_cancels_running_fill() {
    let config = PainterConfig { passes_per_frame: 1, ..Default::default() };
    let mut tool = PaintingTool::new(config, target()).unwrap();
    dab(&mut tool, 0.5, 0.5);
    tool.end_stroke();
    assert!(!tool.update());
    dab(&mut tool, 0.1, 0.1);
    assert_eq!(tool.state(), ToolState::Drawing);
    assert!(!tool.backend().is_busy());
    // The texture is untouched until a fill completes.
    assert_eq!(tool.result_texture().max_abs_diff(&target()), 0.0);
}

#[test]
fn failed_fill_keeps_texture_and_reports() {
    let mut tool = PaintingTool::with_backend(PainterConfig::default(), target(), FailingBackend::default()).unwrap();
    dab(&mut tool, 0.5, 0.5);
    tool.end_stroke();
    assert_eq!(tool.state(), ToolState::Filling);
    assert!(!tool.update());
    assert_eq!(tool.state(), ToolState::Idle);
    assert_eq!(tool.result_texture().max_abs_diff(&target()), 0.0);
    let msg = tool.last_message().expect("failure message");
    assert!(msg.starts_with("Fill failed"), "{msg}");
    assert!(msg.contains("out of GPU memory"), "{msg}");

    // The tool stays usable.
    dab(&mut tool, 0.2, 0.2);
    tool.end_stroke();
    assert_eq!(tool.backend().begins, 2);
}

#[test]
fn empty_composite_skips_fill() {
    let mut tool = PaintingTool::new(PainterConfig::default(), target()).unwrap();
    tool.trigger_fill();
    assert_eq!(tool.state(), ToolState::Idle);
    assert!(!tool.update());

    // Paint then erase everything: still nothing to fill.
    dab(&mut tool, 0.5, 0.5);
    tool.paint(StrokePoint::new(0.5, 0.5), 4.0, BrushShape::Square, BrushMode::Erase);
    tool.end_stroke();
    assert_eq!(tool.state(), ToolState::Idle);
    assert!(tool.composite().is_empty());
}

#[test]
fn switching_mode_restarts_the_fill() {
    let config = PainterConfig { passes_per_frame: 1, ..Default::default() };
    let mut tool = PaintingTool::new(config, target()).unwrap();
    dab(&mut tool, 0.5, 0.5);
    tool.end_stroke();
    tool.update();
    tool.set_fill_mode(FillMode::Laplacian);
    assert_eq!(tool.config().fill_mode, FillMode::Laplacian);
    assert_eq!(tool.state(), ToolState::Filling);
    assert!(tool.flush());
}

#[test]
fn set_target_resets_everything() {
    let mut tool = PaintingTool::new(PainterConfig::default(), target()).unwrap();
    dab(&mut tool, 0.5, 0.5);
    tool.set_target(ImageBuffer::new(16, 8, 1).unwrap()).unwrap();
    assert_eq!(tool.state(), ToolState::Idle);
    assert!(tool.composite().is_empty());
    assert_eq!((tool.composite().width(), tool.composite().channels()), (16, 1));
    assert!(tool.set_target(ImageBuffer::new(4, 4, 4).unwrap()).is_ok());
}
