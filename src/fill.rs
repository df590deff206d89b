// fill.rs — Fill strategies over the convolution pyramid.
//
// Both solvers follow the same four-step protocol, which is what lets the
// painting tool drive either of them a few passes per frame:
//
//   preproc(composite, flood)  seed pyramid level 0 from the inputs
//   prepare()                  rewind the pass cursor
//   step()                     run one pyramid pass; true when done
//   finish()                   read back and post-process the result
//
// `compose()` is the blocking form: every remaining step, then finish.
//
// `Filler` is a tagged enum over the two strategies. The set is closed and
// selected by a mode field, so a `match` is all the dispatch needed.

use crate::buffer::ImageBuffer;
use crate::composite::Composite;
use crate::error::FillError;
use crate::flood::{default_iterations, FloodFiller, FloodResult};
use crate::integrator::LaplacianIntegrator;
use crate::kernels::KernelCache;
use crate::poisson::PoissonFiller;
use crate::pyramid::max_levels;

/// Common protocol for pyramid-based fills.
pub trait FillStrategy {
    /// Seed level 0 from a composite and its flood fill.
    ///
    /// # Errors
    /// `DimensionMismatch` / `ChannelMismatch` if either input does not
    /// match the solver's configuration.
    fn preproc(&mut self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError>;

    /// Rewind to the first pyramid pass.
    fn prepare(&mut self);

    /// Run one pass. Returns `Ok(true)` once every pass has run.
    ///
    /// # Errors
    /// `NotPrepared` before `preproc`.
    fn step(&mut self) -> Result<bool, FillError>;

    /// Produce the filled buffer. Runs any passes still pending.
    fn finish(&mut self) -> Result<ImageBuffer, FillError>;

    /// Passes in one solve.
    fn pass_count(&self) -> usize;

    /// True when the last `preproc` saw no seeds and the solve is a no-op.
    fn is_short_circuit(&self) -> bool;

    /// Run every remaining pass, then `finish`.
    fn compose(&mut self) -> Result<ImageBuffer, FillError> {
        while !self.step()? {}
        self.finish()
    }
}

/// Which solver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Membrane interpolation: painted texels are boundary values.
    #[default]
    Poisson,
    /// Gradient integration: painted texels contribute their Laplacian.
    Laplacian,
}

/// Either solver, selected at construction.
pub enum Filler {
    Poisson(PoissonFiller),
    Laplacian(LaplacianIntegrator),
}

impl Filler {
    /// Build the solver for `mode`. `levels = None` uses the deepest
    /// pyramid the resolution allows.
    pub fn new(
        mode: FillMode,
        width: usize,
        height: usize,
        channels: usize,
        levels: Option<usize>,
        cache: &mut KernelCache,
    ) -> Result<Self, FillError> {
        let levels = levels.unwrap_or_else(|| max_levels(width, height));
        Ok(match mode {
            FillMode::Poisson => {
                Filler::Poisson(PoissonFiller::new(width, height, channels, levels, cache)?)
            }
            FillMode::Laplacian => Filler::Laplacian(LaplacianIntegrator::new(
                width, height, channels, levels, cache,
            )?),
        })
    }

    pub fn mode(&self) -> FillMode {
        match self {
            Filler::Poisson(_) => FillMode::Poisson,
            Filler::Laplacian(_) => FillMode::Laplacian,
        }
    }

    /// (width, height, color channels) the solver was built for.
    pub fn config(&self) -> (usize, usize, usize) {
        match self {
            Filler::Poisson(p) => p.config(),
            Filler::Laplacian(l) => l.config(),
        }
    }
}

impl FillStrategy for Filler {
    fn preproc(&mut self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError> {
        match self {
            Filler::Poisson(p) => p.preproc(composite, flood),
            Filler::Laplacian(l) => l.preproc(composite, flood),
        }
    }

    fn prepare(&mut self) {
        match self {
            Filler::Poisson(p) => p.prepare(),
            Filler::Laplacian(l) => l.prepare(),
        }
    }

    fn step(&mut self) -> Result<bool, FillError> {
        match self {
            Filler::Poisson(p) => p.step(),
            Filler::Laplacian(l) => l.step(),
        }
    }

    fn finish(&mut self) -> Result<ImageBuffer, FillError> {
        match self {
            Filler::Poisson(p) => p.finish(),
            Filler::Laplacian(l) => l.finish(),
        }
    }

    fn pass_count(&self) -> usize {
        match self {
            Filler::Poisson(p) => p.pass_count(),
            Filler::Laplacian(l) => l.pass_count(),
        }
    }

    fn is_short_circuit(&self) -> bool {
        match self {
            Filler::Poisson(p) => p.is_short_circuit(),
            Filler::Laplacian(l) => l.is_short_circuit(),
        }
    }
}

/// Options for the one-shot [`fill_composite`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub mode: FillMode,
    /// Jump flood passes; `None` uses `ceil(log2(max(w, h)))`.
    pub flood_iterations: Option<usize>,
    /// Pyramid depth; `None` uses the maximum.
    pub pyramid_levels: Option<usize>,
}

/// Flood, then solve, in one call.
///
/// An empty composite returns its color unchanged without building
/// anything.
pub fn fill_composite(composite: &Composite, options: &FillOptions) -> Result<ImageBuffer, FillError> {
    if composite.is_empty() {
        log::debug!("[seamfill::fill] empty composite, nothing to fill");
        return Ok(composite.color.clone());
    }
    let (w, h) = (composite.width(), composite.height());
    let iterations = options.flood_iterations.unwrap_or_else(|| default_iterations(w, h));

    let mut flood = FloodFiller::new(w, h)?;
    let flooded = flood.floodfill(composite, iterations)?;

    let mut cache = KernelCache::new();
    let mut filler = Filler::new(
        options.mode,
        w,
        h,
        composite.channels(),
        options.pyramid_levels,
        &mut cache,
    )?;
    filler.preproc(composite, &flooded)?;
    filler.prepare();
    filler.compose()
}
