// integrator.rs — Laplacian integration over the convolution pyramid.
//
// Reconstructs a color potential from its Laplacian. Level 0 holds the
// negated 5-point Laplacian of the whole flooded color field, so every
// stroke's color and the seams between strokes survive integration. The
// integration kernel set with Accumulate mode then sums every level's
// contribution into an approximate inverse Laplacian.
//
// The potential is only defined up to a constant. One anchor texel fixes
// it: after the walk, every channel is shifted so the anchor reproduces its
// painted color. The integration kernels are an approximation, so the
// other seeds drift a little from their painted colors; a membrane walk
// over the seed residuals pulls them back and spreads the correction
// smoothly:
//
//   raw     = pyramid(−∇² flood.color) + (known(anchor) − raw(anchor))
//   e       = known − raw              at seeds
//   result  = raw + membrane(e)
//
// A uniform shift of every seed leaves the Laplacian and the residuals
// unchanged, so the result shifts by exactly that amount.

use crate::buffer::ImageBuffer;
use crate::composite::Composite;
use crate::convolution::neg_laplacian;
use crate::error::FillError;
use crate::fill::FillStrategy;
use crate::flood::FloodResult;
use crate::kernels::{KernelCache, KernelKey, KernelSet};
use crate::poisson::Membrane;
use crate::pyramid::{CombineMode, ConvolutionPyramid, WEIGHT_EPSILON};

struct IntegratorInput {
    composite: Composite,
    anchor: Option<(usize, usize)>,
    /// Anchored potential, set once the integration walk is done.
    raw: Option<ImageBuffer>,
}

/// Seeded gradient integration.
pub struct LaplacianIntegrator {
    pyramid: ConvolutionPyramid,
    correction: Membrane,
    channels: usize,
    anchor_override: Option<(usize, usize)>,
    input: Option<IntegratorInput>,
    cursor: usize,
    empty: bool,
    stage: ImageBuffer,
}

impl LaplacianIntegrator {
    /// # Errors
    /// `UnsupportedChannels` unless `1 <= channels <= 4`, plus any pyramid
    /// build error.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        levels: usize,
        cache: &mut KernelCache,
    ) -> Result<Self, FillError> {
        let mut pyramid = ConvolutionPyramid::build_with_channels(width, height, levels, channels)?;
        pyramid.set_kernels(cache.get(KernelKey {
            width,
            height,
            levels,
            set: KernelSet::Integration,
        }))?;
        Ok(LaplacianIntegrator {
            stage: ImageBuffer::new(width, height, channels)?,
            correction: Membrane::new(width, height, channels, levels, cache)?,
            pyramid,
            channels,
            anchor_override: None,
            input: None,
            cursor: 0,
            empty: false,
        })
    }

    pub fn config(&self) -> (usize, usize, usize) {
        (self.pyramid.width(), self.pyramid.height(), self.channels)
    }

    /// Pin the reference texel. Takes effect on the next `preproc`; an
    /// anchor that is not a seed there falls back to the default.
    pub fn set_anchor(&mut self, anchor: Option<(usize, usize)>) {
        self.anchor_override = anchor;
    }

    /// Anchor resolved by the last `preproc`, `None` if it saw no seeds.
    pub fn anchor(&self) -> Option<(usize, usize)> {
        self.input.as_ref().and_then(|i| i.anchor)
    }

    /// Unclamped potential: anchored and residual-corrected. Runs any
    /// passes still pending.
    ///
    /// # Errors
    /// `NotPrepared` before `preproc`.
    pub fn reconstruct(&mut self) -> Result<ImageBuffer, FillError> {
        while !self.step()? {}
        let input = self.input.as_ref().ok_or(FillError::NotPrepared)?;
        let Some(raw) = input.raw.as_ref() else {
            return Ok(input.composite.color.clone());
        };

        let (residual, weight) = self.correction.extract()?;
        let mut out = raw.clone();
        for c in 0..self.channels {
            let e = residual.plane(c);
            for (x, y, w) in weight.pixels() {
                if w > WEIGHT_EPSILON {
                    let v = out.get(x, y, c) + e.get(x, y) / w;
                    out.set(x, y, c, v);
                }
            }
        }
        Ok(out)
    }

    /// Passes of the integration walk; the correction walk has as many.
    fn integration_passes(&self) -> usize {
        self.pyramid.pass_count()
    }

    /// Anchor the integrated field and stage the seed residuals.
    fn begin_correction(&mut self) -> Result<(), FillError> {
        let input = self.input.as_mut().ok_or(FillError::NotPrepared)?;
        let Some(anchor) = input.anchor else {
            return Ok(());
        };
        let mut raw = self.pyramid.extract();
        apply_anchor(&mut raw, &input.composite.color, anchor);
        for c in 0..self.channels {
            let known = input.composite.color.plane(c);
            let dst = self.stage.plane_mut(c);
            for (x, y, v) in raw.plane(c).pixels() {
                dst.set(x, y, known.get(x, y) - v);
            }
        }
        self.correction.load(&input.composite, &self.stage)?;
        input.raw = Some(raw);
        Ok(())
    }

    fn check_input(&self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError> {
        let (w, h) = (self.pyramid.width(), self.pyramid.height());
        for got in [(composite.width(), composite.height()), (flood.color.width(), flood.color.height())] {
            if got != (w, h) {
                return Err(FillError::DimensionMismatch { expected: (w, h), got });
            }
        }
        for got in [composite.channels(), flood.color.channels()] {
            if got != self.channels {
                return Err(FillError::ChannelMismatch { expected: self.channels, got });
            }
        }
        Ok(())
    }
}

/// Shift every channel of `raw` so that it equals `known` at `anchor`.
pub(crate) fn apply_anchor(raw: &mut ImageBuffer, known: &ImageBuffer, anchor: (usize, usize)) {
    let (ax, ay) = anchor;
    for c in 0..raw.channels() {
        let offset = known.get(ax, ay, c) - raw.get(ax, ay, c);
        for v in raw.plane_mut(c).as_mut_slice() {
            *v += offset;
        }
    }
}

/// Seed closest to the seed centroid; ties go to the lowest linear index.
pub(crate) fn default_anchor(composite: &Composite) -> Option<(usize, usize)> {
    let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0usize);
    for (x, y, _) in composite.validity.pixels() {
        if composite.is_seed(x, y) {
            sx += x as f64;
            sy += y as f64;
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    let (cx, cy) = (sx / n as f64, sy / n as f64);

    let mut best = None;
    let mut best_d = f64::INFINITY;
    for (x, y, _) in composite.validity.pixels() {
        if !composite.is_seed(x, y) {
            continue;
        }
        let d = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
        if d < best_d {
            best_d = d;
            best = Some((x, y));
        }
    }
    best
}

impl FillStrategy for LaplacianIntegrator {
    fn preproc(&mut self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError> {
        self.check_input(composite, flood)?;
        self.cursor = 0;
        self.empty = composite.is_empty();

        let anchor = match self.anchor_override {
            Some((x, y))
                if x < composite.width() && y < composite.height() && composite.is_seed(x, y) =>
            {
                Some((x, y))
            }
            Some(a) => {
                log::warn!("[seamfill::integrator] anchor {a:?} is not a seed, using default");
                default_anchor(composite)
            }
            None => default_anchor(composite),
        };
        self.input = Some(IntegratorInput { composite: composite.clone(), anchor, raw: None });
        if self.empty {
            log::debug!("[seamfill::integrator] no seeds, fill short-circuits");
            return Ok(());
        }

        for c in 0..self.channels {
            let lap = neg_laplacian(flood.color.plane(c));
            self.stage.plane_mut(c).clone_from(&lap);
        }
        self.pyramid.load(&self.stage)
    }

    fn prepare(&mut self) {
        self.cursor = 0;
    }

    fn step(&mut self) -> Result<bool, FillError> {
        if self.input.is_none() {
            return Err(FillError::NotPrepared);
        }
        let total = self.pass_count();
        if self.empty || self.cursor >= total {
            return Ok(true);
        }
        let first = self.integration_passes();
        if self.cursor < first {
            self.pyramid.run_pass(self.cursor, CombineMode::Accumulate);
        } else {
            if self.cursor == first {
                self.begin_correction()?;
            }
            self.correction.run_pass(self.cursor - first);
        }
        self.cursor += 1;
        Ok(self.cursor >= total)
    }

    fn finish(&mut self) -> Result<ImageBuffer, FillError> {
        let mut out = self.reconstruct()?;
        out.clamp01();
        log::debug!(
            "[seamfill::integrator] fill of {}×{} done",
            self.pyramid.width(),
            self.pyramid.height()
        );
        Ok(out)
    }

    fn pass_count(&self) -> usize {
        self.integration_passes() + self.correction.pass_count()
    }

    fn is_short_circuit(&self) -> bool {
        self.empty
    }
}
