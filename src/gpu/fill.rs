// gpu/fill.rs — Flood + solve chain on the GPU.
//
// One command buffer per fill:
//
//   upload color, validity
//   flood_seed, flood_jump × n, flood_resolve       → flooded color
//   Poisson:
//     seed_stage, weight_stage                      → membrane level 0
//     membrane walk (Replace)
//     poisson_finish                                → result
//   Laplacian:
//     laplacian_stage                               → integration level 0
//     integration walk (Accumulate)
//     residual_stage, weight_stage                  → membrane level 0
//     membrane walk (Replace)
//     laplacian_finish                              → result
//   readback
//
// The anchor texel is picked on the CPU and passed in the uniform block;
// the offset itself is read on the GPU, so nothing runs after readback.
//
// Every allocation and the submission run inside error scopes, so running
// out of GPU memory comes back as `FillError::Device` instead of a panic.
// The pyramids and flood slots are kept between fills of the same
// configuration.

use crate::buffer::ImageBuffer;
use crate::composite::{Composite, SEED_THRESHOLD};
use crate::error::FillError;
use crate::fill::{FillMode, FillOptions};
use crate::flood::default_iterations;
use crate::gpu::device::GpuDevice;
use crate::gpu::flood::{GpuFlood, GpuFloodPipeline};
use crate::gpu::image::{buffer_to_texels, plane_to_texels, GpuImage};
use crate::gpu::pass::{ComputeProgram, PassLayout};
use crate::gpu::pyramid::{GpuPyramid, GpuPyramidPipeline};
use crate::integrator::default_anchor;
use crate::kernels::{KernelCache, KernelKey, KernelSet};
use crate::painting::FillBackend;
use crate::pyramid::{level_layouts, CombineMode, PYRAMID_PADDING, WEIGHT_EPSILON};

const SHADER: &str = include_str!("../shaders/fill.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FillParams {
    size: [u32; 2],
    pad: u32,
    color_channels: u32,
    threshold: f32,
    epsilon: f32,
    anchor: [u32; 2],
}

/// Validate a fill request and return the key of the pyramid that solves
/// it: Membrane for Poisson, Integration for Laplacian. Both modes also
/// walk a Membrane pyramid of the same size and depth.
///
/// # Errors
/// `InvalidLevels` for a depth the resolution does not allow.
pub fn fill_key(composite: &Composite, options: &FillOptions) -> Result<KernelKey, FillError> {
    let (w, h) = (composite.width(), composite.height());
    let set = match options.mode {
        FillMode::Poisson => KernelSet::Membrane,
        FillMode::Laplacian => KernelSet::Integration,
    };
    let max = level_layouts(w, h, PYRAMID_PADDING).len();
    let levels = options.pyramid_levels.unwrap_or(max);
    if levels == 0 || levels > max {
        return Err(FillError::InvalidLevels { requested: levels, max, width: w, height: h });
    }
    Ok(KernelKey { width: w, height: h, levels, set })
}

/// Keep `slot` holding a pyramid for `key`, reallocating on a change.
fn ensure_pyramid(
    gpu: &GpuDevice,
    cache: &mut KernelCache,
    slot: &mut Option<GpuPyramid>,
    key: KernelKey,
    weighted: bool,
) -> Result<(), FillError> {
    if slot.as_ref().map(|p| p.table().key) != Some(key) {
        // Free the old levels before allocating new ones.
        *slot = None;
        let table = cache.get(key);
        *slot = Some(if weighted { GpuPyramid::new_weighted(gpu, table)? } else { GpuPyramid::new(gpu, table)? });
    }
    Ok(())
}

/// Compiled fill kernels plus the resources reused across fills.
pub struct GpuFillPipeline {
    layout: PassLayout,
    seed_stage: ComputeProgram,
    weight_stage: ComputeProgram,
    laplacian_stage: ComputeProgram,
    residual_stage: ComputeProgram,
    poisson_finish: ComputeProgram,
    laplacian_finish: ComputeProgram,
    pyramid_pipe: GpuPyramidPipeline,
    flood_pipe: GpuFloodPipeline,
    cache: KernelCache,
    /// Weighted, Membrane kernels.
    membrane: Option<GpuPyramid>,
    /// Integration kernels, Laplacian fills only.
    integration: Option<GpuPyramid>,
    flood: Option<GpuFlood>,
}

impl GpuFillPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let layout = PassLayout::new(gpu);
        let module = layout.shader(gpu, "seamfill::fill", SHADER);
        GpuFillPipeline {
            seed_stage: ComputeProgram::new(gpu, &layout, &module, "seed_stage"),
            weight_stage: ComputeProgram::new(gpu, &layout, &module, "weight_stage"),
            laplacian_stage: ComputeProgram::new(gpu, &layout, &module, "laplacian_stage"),
            residual_stage: ComputeProgram::new(gpu, &layout, &module, "residual_stage"),
            poisson_finish: ComputeProgram::new(gpu, &layout, &module, "poisson_finish"),
            laplacian_finish: ComputeProgram::new(gpu, &layout, &module, "laplacian_finish"),
            pyramid_pipe: GpuPyramidPipeline::new(gpu),
            flood_pipe: GpuFloodPipeline::new(gpu),
            layout,
            cache: KernelCache::new(),
            membrane: None,
            integration: None,
            flood: None,
        }
    }

    /// Kernel tables built so far.
    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    /// Drop the cached pyramids and flood slots.
    pub fn release(&mut self) {
        self.membrane = None;
        self.integration = None;
        self.flood = None;
    }

    /// Flood and solve `composite`, blocking until the result is read back.
    ///
    /// An empty composite returns its color unchanged.
    ///
    /// # Errors
    /// Configuration errors from [`fill_key`], `Device` for allocation,
    /// validation, or readback failures.
    pub fn fill(
        &mut self,
        gpu: &GpuDevice,
        composite: &Composite,
        options: &FillOptions,
    ) -> Result<ImageBuffer, FillError> {
        if composite.is_empty() {
            log::debug!("[seamfill::gpu] empty composite, nothing to fill");
            return Ok(composite.color.clone());
        }
        let key = fill_key(composite, options)?;
        let (w, h, ch) = (composite.width(), composite.height(), composite.channels());

        let membrane_key = KernelKey { set: KernelSet::Membrane, ..key };
        ensure_pyramid(gpu, &mut self.cache, &mut self.membrane, membrane_key, true)?;
        if options.mode == FillMode::Laplacian {
            ensure_pyramid(gpu, &mut self.cache, &mut self.integration, key, false)?;
        }
        if self.flood.as_ref().map(|f| (f.width(), f.height())) != Some((w, h)) {
            self.flood = None;
            self.flood = Some(GpuFlood::new(gpu, w, h)?);
        }
        let GpuFillPipeline {
            layout,
            seed_stage,
            weight_stage,
            laplacian_stage,
            residual_stage,
            poisson_finish,
            laplacian_finish,
            pyramid_pipe,
            flood_pipe,
            membrane,
            integration,
            flood,
            ..
        } = self;
        let membrane = membrane.as_ref().ok_or(FillError::NotPrepared)?;
        let flood = flood.as_mut().ok_or(FillError::NotPrepared)?;
        let m0 = membrane.level(0);
        let m0_weight = m0.weight.as_ref().ok_or(FillError::MissingWeights)?;
        let integration = match options.mode {
            FillMode::Poisson => None,
            FillMode::Laplacian => Some(integration.as_ref().ok_or(FillError::NotPrepared)?),
        };

        let (gw, gh) = (w as u32, h as u32);
        let (color, validity, flooded, out) = gpu.scoped("fill inputs", || {
            (
                GpuImage::upload(gpu, &buffer_to_texels(&composite.color), gw, gh, "fill.color"),
                GpuImage::upload(gpu, &plane_to_texels(&composite.validity), gw, gh, "fill.validity"),
                GpuImage::new(gpu, gw, gh, "fill.flooded"),
                GpuImage::new(gpu, gw, gh, "fill.result"),
            )
        })?;

        // Non-empty, so there is always a seed to anchor on.
        let (ax, ay) = default_anchor(composite).unwrap_or_default();
        let params = FillParams {
            size: [gw, gh],
            pad: PYRAMID_PADDING as u32,
            color_channels: ch as u32,
            threshold: SEED_THRESHOLD,
            epsilon: WEIGHT_EPSILON,
            anchor: [ax as u32, ay as u32],
        };
        let params = bytemuck::bytes_of(&params);
        let iterations = options.flood_iterations.unwrap_or_else(|| default_iterations(w, h));

        gpu.scoped("fill passes", || {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuFillPipeline::fill") });
            flood.record(gpu, flood_pipe, &mut encoder, &validity, iterations);
            flood.record_resolve(gpu, flood_pipe, &mut encoder, &color, &flooded);

            match integration {
                None => {
                    seed_stage.dispatch(gpu, layout, &mut encoder, &[&color, &validity], &m0.input, params);
                    weight_stage.dispatch(gpu, layout, &mut encoder, &[&color, &validity], &m0_weight.input, params);
                    membrane.record_all(gpu, pyramid_pipe, &mut encoder, CombineMode::Replace);
                    poisson_finish.dispatch(
                        gpu,
                        layout,
                        &mut encoder,
                        &[&m0.output, &m0_weight.output, &validity, &flooded],
                        &out,
                        params,
                    );
                }
                Some(integration) => {
                    let i0 = integration.level(0);
                    laplacian_stage.dispatch(gpu, layout, &mut encoder, &[&flooded, &validity], &i0.input, params);
                    integration.record_all(gpu, pyramid_pipe, &mut encoder, CombineMode::Accumulate);
                    residual_stage.dispatch(
                        gpu,
                        layout,
                        &mut encoder,
                        &[&i0.output, &validity, &color],
                        &m0.input,
                        params,
                    );
                    weight_stage.dispatch(gpu, layout, &mut encoder, &[&color, &validity], &m0_weight.input, params);
                    membrane.record_all(gpu, pyramid_pipe, &mut encoder, CombineMode::Replace);
                    laplacian_finish.dispatch(
                        gpu,
                        layout,
                        &mut encoder,
                        &[&i0.output, &m0.output, &m0_weight.output, &color],
                        &out,
                        params,
                    );
                }
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;

        let result = out.readback_buffer(gpu, ch)?;
        log::debug!("[seamfill::gpu] {:?} fill of {w}×{h}×{ch} done", options.mode);
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Painting backend
// ---------------------------------------------------------------------------

/// [`FillBackend`] running the whole chain in one GPU submission on the
/// first `advance` after `begin`.
pub struct GpuFillBackend {
    gpu: GpuDevice,
    pipeline: GpuFillPipeline,
    job: Option<(Composite, FillOptions)>,
}

impl GpuFillBackend {
    pub fn new(gpu: GpuDevice) -> Self {
        let pipeline = GpuFillPipeline::new(&gpu);
        GpuFillBackend { gpu, pipeline, job: None }
    }

    pub fn gpu(&self) -> &GpuDevice {
        &self.gpu
    }

    pub fn pipeline(&self) -> &GpuFillPipeline {
        &self.pipeline
    }
}

impl FillBackend for GpuFillBackend {
    fn begin(&mut self, composite: &Composite, options: &FillOptions) -> Result<(), FillError> {
        self.job = None;
        fill_key(composite, options)?;
        self.job = Some((composite.clone(), *options));
        Ok(())
    }

    fn advance(&mut self, _budget: usize) -> Result<Option<ImageBuffer>, FillError> {
        let Some((composite, options)) = self.job.take() else {
            return Ok(None);
        };
        self.pipeline.fill(&self.gpu, &composite, &options).map(Some)
    }

    fn cancel(&mut self) {
        self.job = None;
    }

    fn is_busy(&self) -> bool {
        self.job.is_some()
    }
}
