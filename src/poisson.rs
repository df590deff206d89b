// poisson.rs — Membrane (Poisson) fill over the convolution pyramid.
//
// Unknown texels get a smooth interpolation of the painted ones. Painted
// texels act as Dirichlet boundary values. Instead of iterating a linear
// solver, the membrane kernel set turns the pyramid into a wide
// interpolating filter, evaluated in homogeneous form:
//
//   level 0 = (rgb · v, v)        v = 1 at seeds, 0 elsewhere
//   result  = rgb' / v'           after the pyramid (Replace mode)
//
// The weight v rides in the pyramid's own weight plane, so every color
// channel count from 1 to 4 works. Replace mode re-asserts known data at
// every level, and at level 0 that means the seeds come back exactly. The
// final pass also writes the composite's own color at every seed.
//
// Values are not clamped inside the pyramid. The result is clamped to
// [0, 1] once, at the end.

use crate::buffer::ImageBuffer;
use crate::composite::Composite;
use crate::error::FillError;
use crate::fill::FillStrategy;
use crate::flood::FloodResult;
use crate::image::Image;
use crate::kernels::{KernelCache, KernelKey, KernelSet};
use crate::pyramid::{CombineMode, ConvolutionPyramid, WEIGHT_EPSILON};

/// Weighted membrane walk: seed values premultiplied by the seed mask go
/// in, a smooth interpolation plus its weight comes out. Shared by the
/// Poisson fill and the Laplacian residual correction.
pub(crate) struct Membrane {
    pyramid: ConvolutionPyramid,
    stage: ImageBuffer,
    mask: Image<f32>,
}

impl Membrane {
    pub(crate) fn new(
        width: usize,
        height: usize,
        channels: usize,
        levels: usize,
        cache: &mut KernelCache,
    ) -> Result<Self, FillError> {
        let mut pyramid = ConvolutionPyramid::build_weighted(width, height, levels, channels)?;
        pyramid.set_kernels(cache.get(KernelKey {
            width,
            height,
            levels,
            set: KernelSet::Membrane,
        }))?;
        Ok(Membrane {
            pyramid,
            stage: ImageBuffer::new(width, height, channels)?,
            mask: Image::new(width, height),
        })
    }

    /// Stage `values · v` and `v`, with v = 1 at the composite's seeds.
    pub(crate) fn load(&mut self, composite: &Composite, values: &ImageBuffer) -> Result<(), FillError> {
        for y in 0..composite.height() {
            for x in 0..composite.width() {
                let v = if composite.is_seed(x, y) { 1.0 } else { 0.0 };
                for c in 0..self.stage.channels() {
                    self.stage.set(x, y, c, values.get(x, y, c) * v);
                }
                self.mask.set(x, y, v);
            }
        }
        self.pyramid.load(&self.stage)?;
        self.pyramid.load_weight(&self.mask)
    }

    pub(crate) fn pass_count(&self) -> usize {
        self.pyramid.pass_count()
    }

    pub(crate) fn run_pass(&mut self, k: usize) {
        self.pyramid.run_pass(k, CombineMode::Replace);
    }

    /// Solved premultiplied values and their weight.
    pub(crate) fn extract(&self) -> Result<(ImageBuffer, Image<f32>), FillError> {
        let weight = self.pyramid.extract_weight().ok_or(FillError::MissingWeights)?;
        Ok((self.pyramid.extract(), weight))
    }

    pub(crate) fn pyramid(&self) -> &ConvolutionPyramid {
        &self.pyramid
    }
}

struct PoissonInput {
    composite: Composite,
    fallback: ImageBuffer,
}

/// Seeded membrane fill.
pub struct PoissonFiller {
    membrane: Membrane,
    color_channels: usize,
    input: Option<PoissonInput>,
    cursor: usize,
    empty: bool,
}

impl PoissonFiller {
    /// # Errors
    /// `UnsupportedChannels` unless `1 <= color_channels <= 4`, plus any
    /// pyramid build error.
    pub fn new(
        width: usize,
        height: usize,
        color_channels: usize,
        levels: usize,
        cache: &mut KernelCache,
    ) -> Result<Self, FillError> {
        Ok(PoissonFiller {
            membrane: Membrane::new(width, height, color_channels, levels, cache)?,
            color_channels,
            input: None,
            cursor: 0,
            empty: false,
        })
    }

    pub fn config(&self) -> (usize, usize, usize) {
        let p = self.membrane.pyramid();
        (p.width(), p.height(), self.color_channels)
    }

    pub fn pyramid(&self) -> &ConvolutionPyramid {
        self.membrane.pyramid()
    }

    fn check_input(&self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError> {
        let (w, h, _) = self.config();
        for got in [(composite.width(), composite.height()), (flood.color.width(), flood.color.height())] {
            if got != (w, h) {
                return Err(FillError::DimensionMismatch { expected: (w, h), got });
            }
        }
        for got in [composite.channels(), flood.color.channels()] {
            if got != self.color_channels {
                return Err(FillError::ChannelMismatch { expected: self.color_channels, got });
            }
        }
        Ok(())
    }
}

impl FillStrategy for PoissonFiller {
    fn preproc(&mut self, composite: &Composite, flood: &FloodResult) -> Result<(), FillError> {
        self.check_input(composite, flood)?;
        self.cursor = 0;
        self.empty = composite.is_empty();
        self.input = Some(PoissonInput {
            composite: composite.clone(),
            fallback: flood.color.clone(),
        });
        if self.empty {
            log::debug!("[seamfill::poisson] no seeds, fill short-circuits");
            return Ok(());
        }

        self.membrane.load(composite, &composite.color)
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
        self.membrane.run_pass(self.cursor);
        self.cursor += 1;
        Ok(self.cursor >= total)
    }

    fn finish(&mut self) -> Result<ImageBuffer, FillError> {
        while !self.step()? {}
        let input = self.input.as_ref().ok_or(FillError::NotPrepared)?;
        if self.empty {
            return Ok(input.composite.color.clone());
        }

        let (solved, weight) = self.membrane.extract()?;
        let cc = self.color_channels;
        let (w, h) = (solved.width(), solved.height());
        let mut out = ImageBuffer::new(w, h, cc)?;
        for y in 0..h {
            for x in 0..w {
                if input.composite.is_seed(x, y) {
                    for c in 0..cc {
                        out.set(x, y, c, input.composite.color.get(x, y, c));
                    }
                    continue;
                }
                let wgt = weight.get(x, y);
                if wgt > WEIGHT_EPSILON {
                    for c in 0..cc {
                        out.set(x, y, c, solved.get(x, y, c) / wgt);
                    }
                } else {
                    for c in 0..cc {
                        out.set(x, y, c, input.fallback.get(x, y, c));
                    }
                }
            }
        }
        out.clamp01();
        log::debug!("[seamfill::poisson] fill of {w}×{h} done");
        Ok(out)
    }

    fn pass_count(&self) -> usize {
        self.membrane.pass_count()
    }

    fn is_short_circuit(&self) -> bool {
        self.empty
    }
}
