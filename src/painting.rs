// painting.rs — Interactive painting tool.
//
// Turns stroke input into composite writes and drives a fill backend a few
// passes per frame:
//
//   Idle ──paint──▶ Drawing ──end_stroke──▶ Filling ──update…──▶ Idle
//                      ▲                       │
//                      └─────────paint─────────┘   (cancels the fill)
//
// The target texture is only replaced when a fill chain finishes
// successfully. A failed fill leaves it as it was and records a message
// for the user. A fill is only started when the composite's dirty rect
// shows a change since the last successful one (or the mode changed).
//
// NEW RUST CONCEPTS:
// - Default type parameters (`PaintingTool<B = CpuFillBackend>`): the
//   common case needs no turbofish, the GPU backend slots in the same way.
// - `std::mem::replace` to swap a finished buffer in without cloning.

use crate::brush::{Brush, BrushMode, BrushShape, StrokePoint};
use crate::buffer::ImageBuffer;
use crate::composite::Composite;
use crate::error::FillError;
use crate::fill::{FillMode, FillOptions, FillStrategy, Filler};
use crate::flood::{default_iterations, FloodFiller};
use crate::kernels::KernelCache;
use crate::pyramid::max_levels;

/// Painting tool configuration.
#[derive(Debug, Clone)]
pub struct PainterConfig {
    /// Solver used by `trigger_fill`.
    pub fill_mode: FillMode,
    /// Jump flood passes; `None` uses `ceil(log2(max(w, h)))`.
    pub flood_iterations: Option<usize>,
    /// Pyramid depth; `None` uses the deepest the texture allows.
    pub pyramid_levels: Option<usize>,
    /// Backend passes run per `update()` call.
    pub passes_per_frame: usize,
    /// Start a fill automatically when a stroke ends.
    pub fill_on_release: bool,
    /// Color used by `paint` in draw mode.
    pub brush_color: [f32; 4],
}

impl Default for PainterConfig {
    fn default() -> Self {
        PainterConfig {
            fill_mode: FillMode::Poisson,
            flood_iterations: None,
            pyramid_levels: None,
            passes_per_frame: 8,
            fill_on_release: true,
            brush_color: [1.0; 4],
        }
    }
}

impl PainterConfig {
    fn fill_options(&self) -> FillOptions {
        FillOptions {
            mode: self.fill_mode,
            flood_iterations: self.flood_iterations,
            pyramid_levels: self.pyramid_levels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Idle,
    Drawing,
    Filling,
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Something that can run a flood + fill chain in bounded slices.
pub trait FillBackend {
    /// Start filling `composite`. Drops any fill already in progress.
    ///
    /// # Errors
    /// Configuration or device errors; nothing is started.
    fn begin(&mut self, composite: &Composite, options: &FillOptions) -> Result<(), FillError>;

    /// Run at most `budget` passes (at least one). Returns the filled
    /// buffer once the whole chain has succeeded.
    fn advance(&mut self, budget: usize) -> Result<Option<ImageBuffer>, FillError>;

    /// Abandon the running fill, if any. The backend stays reusable.
    fn cancel(&mut self);

    /// True between `begin` and the final `advance`.
    fn is_busy(&self) -> bool;
}

enum CpuStage {
    Flood,
    Solve,
}

struct CpuJob {
    composite: Composite,
    stage: CpuStage,
}

/// Key a built filler is valid for: (mode, width, height, channels, levels).
type FillerKey = (FillMode, usize, usize, usize, usize);

/// CPU reference backend. Flood passes and pyramid passes both count
/// against the per-frame budget.
#[derive(Default)]
pub struct CpuFillBackend {
    cache: KernelCache,
    flood: Option<FloodFiller>,
    filler: Option<(FillerKey, Filler)>,
    job: Option<CpuJob>,
}

impl CpuFillBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel tables built so far.
    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    fn advance_inner(&mut self, budget: usize) -> Result<Option<ImageBuffer>, FillError> {
        let CpuFillBackend { flood, filler, job, .. } = self;
        let Some(job) = job.as_mut() else {
            return Ok(None);
        };
        let flood = flood.as_mut().ok_or(FillError::NotPrepared)?;
        let (_, filler) = filler.as_mut().ok_or(FillError::NotPrepared)?;

        for _ in 0..budget.max(1) {
            match job.stage {
                CpuStage::Flood => {
                    if flood.step() {
                        let result = flood.extract()?;
                        filler.preproc(&job.composite, &result)?;
                        filler.prepare();
                        job.stage = CpuStage::Solve;
                    }
                }
                CpuStage::Solve => {
                    if filler.step()? {
                        return filler.finish().map(Some);
                    }
                }
            }
        }
        Ok(None)
    }
}

impl FillBackend for CpuFillBackend {
    fn begin(&mut self, composite: &Composite, options: &FillOptions) -> Result<(), FillError> {
        self.job = None;
        let (w, h, ch) = (composite.width(), composite.height(), composite.channels());

        if self.flood.as_ref().map(|f| (f.width(), f.height())) != Some((w, h)) {
            self.flood = Some(FloodFiller::new(w, h)?);
        }
        let levels = options.pyramid_levels.unwrap_or_else(|| max_levels(w, h));
        let key = (options.mode, w, h, ch, levels);
        if self.filler.as_ref().map(|(k, _)| *k) != Some(key) {
            let filler = Filler::new(options.mode, w, h, ch, Some(levels), &mut self.cache)?;
            log::info!("[seamfill::painting] built {:?} filler for {w}×{h}×{ch}", options.mode);
            self.filler = Some((key, filler));
        }

        let iterations = options.flood_iterations.unwrap_or_else(|| default_iterations(w, h));
        if let Some(flood) = self.flood.as_mut() {
            flood.begin(composite, iterations)?;
        }
        self.job = Some(CpuJob { composite: composite.clone(), stage: CpuStage::Flood });
        Ok(())
    }

    fn advance(&mut self, budget: usize) -> Result<Option<ImageBuffer>, FillError> {
        let out = self.advance_inner(budget);
        if !matches!(out, Ok(None)) {
            self.job = None;
        }
        out
    }

    fn cancel(&mut self) {
        self.job = None;
    }

    fn is_busy(&self) -> bool {
        self.job.is_some()
    }
}

// ---------------------------------------------------------------------------
// PaintingTool
// ---------------------------------------------------------------------------

/// Brush input, composite, and fill orchestration for one target texture.
pub struct PaintingTool<B: FillBackend = CpuFillBackend> {
    config: PainterConfig,
    backend: B,
    composite: Composite,
    target: ImageBuffer,
    state: ToolState,
    /// Last stamp center of the current stroke, in texels.
    last_point: Option<(f32, f32)>,
    last_message: Option<String>,
    /// Mode of the fill the target holds, while the composite is clean.
    filled_with: Option<FillMode>,
}

impl PaintingTool<CpuFillBackend> {
    /// Tool with the CPU backend painting onto `target`.
    pub fn new(config: PainterConfig, target: ImageBuffer) -> Result<Self, FillError> {
        Self::with_backend(config, target, CpuFillBackend::new())
    }
}

impl<B: FillBackend> PaintingTool<B> {
    /// # Errors
    /// Propagates composite allocation errors (channel count).
    pub fn with_backend(config: PainterConfig, target: ImageBuffer, backend: B) -> Result<Self, FillError> {
        let composite = Composite::new(target.width(), target.height(), target.channels())?;
        Ok(PaintingTool {
            config,
            backend,
            composite,
            target,
            state: ToolState::Idle,
            last_point: None,
            last_message: None,
            filled_with: None,
        })
    }

    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn composite(&self) -> &Composite {
        &self.composite
    }

    /// The texture as of the last successful fill.
    pub fn result_texture(&self) -> &ImageBuffer {
        &self.target
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Message from the last failed fill, cleared by the next success.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn set_brush_color(&mut self, color: [f32; 4]) {
        self.config.brush_color = color;
    }

    /// Switch solver. A running fill restarts with the new mode.
    pub fn set_fill_mode(&mut self, mode: FillMode) {
        if self.config.fill_mode == mode {
            return;
        }
        self.config.fill_mode = mode;
        if self.state == ToolState::Filling {
            self.backend.cancel();
            self.trigger_fill();
        }
    }

    /// Replace the target texture. Resets the composite and drops any
    /// running fill.
    pub fn set_target(&mut self, target: ImageBuffer) -> Result<(), FillError> {
        let composite = Composite::new(target.width(), target.height(), target.channels())?;
        self.backend.cancel();
        self.composite = composite;
        self.target = target;
        self.state = ToolState::Idle;
        self.last_point = None;
        self.filled_with = None;
        Ok(())
    }

    /// Drop every painted texel. The target keeps its last fill.
    pub fn clear_composite(&mut self) {
        self.backend.cancel();
        self.composite.clear();
        self.state = ToolState::Idle;
        self.last_point = None;
        self.filled_with = None;
    }

    /// Add one stroke sample. Consecutive samples of a stroke are joined
    /// with evenly spaced stamps.
    pub fn paint(&mut self, point: StrokePoint, radius: f32, shape: BrushShape, mode: BrushMode) {
        if self.state == ToolState::Filling {
            self.backend.cancel();
            log::debug!("[seamfill::painting] fill cancelled by new stroke");
        }
        self.state = ToolState::Drawing;

        let brush = Brush { radius, shape, mode, color: self.config.brush_color };
        let px = point.to_pixel(self.composite.width(), self.composite.height());
        match self.last_point {
            Some(prev) => {
                brush.stamp_segment(&mut self.composite, prev, px);
            }
            None => {
                brush.stamp(&mut self.composite, px);
            }
        }
        self.last_point = Some(px);
    }

    /// Finish the current stroke. Starts a fill if `fill_on_release` is set.
    pub fn end_stroke(&mut self) {
        if self.state != ToolState::Drawing {
            return;
        }
        self.last_point = None;
        if self.config.fill_on_release {
            self.trigger_fill();
        } else {
            self.state = ToolState::Idle;
        }
    }

    /// Start a fill of the current composite. Nothing happens for an empty
    /// composite, or when nothing was painted since the last successful fill
    /// in the same mode.
    pub fn trigger_fill(&mut self) {
        self.last_point = None;
        if self.composite.is_empty() {
            log::debug!("[seamfill::painting] nothing painted, fill skipped");
            self.backend.cancel();
            self.state = ToolState::Idle;
            return;
        }
        let dirty = self.composite.take_dirty();
        if dirty.is_none() && self.filled_with == Some(self.config.fill_mode) {
            log::debug!("[seamfill::painting] composite unchanged, fill skipped");
            return;
        }
        if let Some(r) = dirty {
            log::debug!(
                "[seamfill::painting] refill after {}×{} changed at ({}, {})",
                r.width(),
                r.height(),
                r.x0,
                r.y0
            );
        }
        self.filled_with = None;
        match self.backend.begin(&self.composite, &self.config.fill_options()) {
            Ok(()) => self.state = ToolState::Filling,
            Err(e) => self.fail(e),
        }
    }

    /// Run up to `passes_per_frame` backend passes. Returns true when the
    /// target texture changed.
    pub fn update(&mut self) -> bool {
        if self.state != ToolState::Filling {
            return false;
        }
        match self.backend.advance(self.config.passes_per_frame) {
            Ok(Some(filled)) => {
                let _old = std::mem::replace(&mut self.target, filled);
                self.state = ToolState::Idle;
                self.last_message = None;
                self.filled_with = Some(self.config.fill_mode);
                log::info!(
                    "[seamfill::painting] fill done ({} seeds)",
                    self.composite.seed_count()
                );
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Call `update` until the running fill (if any) finishes. Returns true
    /// when the target changed.
    pub fn flush(&mut self) -> bool {
        while self.state == ToolState::Filling {
            if self.update() {
                return true;
            }
        }
        false
    }

    fn fail(&mut self, e: FillError) {
        log::warn!("[seamfill::painting] fill failed, texture unchanged: {e}");
        self.backend.cancel();
        self.last_message = Some(format!("Fill failed: {e}"));
        self.state = ToolState::Idle;
    }
}
