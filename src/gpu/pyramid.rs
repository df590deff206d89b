// gpu/pyramid.rs — Convolution pyramid on the GPU.
//
// Mirrors `ConvolutionPyramid` in pyramid.rs pass for pass. The CPU version
// is the reference; the tests below compare the two after every pass.
//
// Each level owns four `Rgba32Float` textures of its own size:
//
//   input   a_i
//   output  â_i
//   tmp     row-filtered scratch
//   tmp2    second row-filtered scratch (the residual branch on the way up)
//
// A weighted pyramid adds `w_input` / `w_output` per level, holding the
// weight plane in the x channel. The weight chain runs through the same
// filters and reuses tmp / tmp2.
//
// Separable filters are split into a row pass and a column pass, because a
// storage texture cannot be read and written in the same dispatch:
//
//   downscale(i)   conv_rows(a_i, h1) → tmp_i
//                  down_cols(tmp_i, h1, shift_i) → a_{i+1}
//   coarsest       conv_rows(a_L, g) → tmp2_L
//                  combine(tmp2_L·g) → â_L
//   upscale(i)     up_rows(â_{i+1}, h2, shift_i) → tmp_i
//                  conv_rows(a_i, g) → tmp2_i
//                  combine(tmp_i·h2 + tmp2_i·g) → â_i
//   reassert(i)    reassert(â_i, a_i, w_i, ŵ_i) → tmp_i
//                  reassert_weight(ŵ_i, w_i) → tmp2_i
//                  copy tmp_i → â_i, tmp2_i → ŵ_i
//
// Channels map to RGBA; channels the CPU pyramid does not have stay 0 on
// the GPU and never influence the used ones.
//
// PIPELINE LIFETIME
// ─────────────────
// `GpuPyramidPipeline` compiles the shader once. `GpuPyramid` owns the
// textures for one (resolution, depth) and is reused across fills.
//
// NEW RUST CONCEPTS
// ─────────────────
// - `#[repr(C)]` + `bytemuck::Pod` — the uniform block is uploaded with
//   `bytemuck::bytes_of`. The layout must match WGSL's uniform rules
//   (16-byte aligned arrays), which a size test pins down.

use std::sync::Arc;

use crate::buffer::ImageBuffer;
use crate::error::FillError;
use crate::gpu::device::GpuDevice;
use crate::gpu::image::{buffer_to_texels, texels_to_buffer, GpuImage, Texel};
use crate::gpu::pass::{ComputeProgram, PassLayout};
use crate::image::Image;
use crate::kernels::KernelTable;
use crate::pyramid::{level_layouts, CombineMode, LevelLayout, PYRAMID_PADDING, WEIGHT_EPSILON};

const SHADER: &str = include_str!("../shaders/pyramid.wgsl");

// ---------------------------------------------------------------------------
// Uniform block
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct PyramidParams {
    src_size: [u32; 2],
    dst_size: [u32; 2],
    shift: [u32; 2],
    taps_len: u32,
    taps2_len: u32,
    has_coarse: u32,
    gain: f32,
    epsilon: f32,
    _pad: [u32; 5],
    taps: [f32; 8],
    taps2: [f32; 8],
}

impl PyramidParams {
    fn new(src: (u32, u32), dst: (u32, u32), shift: (usize, usize), taps: &[f32]) -> Self {
        let mut p = PyramidParams {
            src_size: [src.0, src.1],
            dst_size: [dst.0, dst.1],
            shift: [shift.0 as u32, shift.1 as u32],
            taps_len: taps.len() as u32,
            taps2_len: 0,
            has_coarse: 0,
            gain: 1.0,
            epsilon: WEIGHT_EPSILON,
            _pad: [0; 5],
            taps: [0.0; 8],
            taps2: [0.0; 8],
        };
        p.taps[..taps.len()].copy_from_slice(taps);
        p
    }

    fn with_taps2(mut self, taps2: &[f32]) -> Self {
        self.taps2_len = taps2.len() as u32;
        self.taps2[..taps2.len()].copy_from_slice(taps2);
        self.has_coarse = 1;
        self
    }

    fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Compiled pyramid kernels.
pub struct GpuPyramidPipeline {
    layout: PassLayout,
    conv_rows: ComputeProgram,
    down_cols: ComputeProgram,
    up_rows: ComputeProgram,
    combine: ComputeProgram,
    reassert: ComputeProgram,
    reassert_weight: ComputeProgram,
}

impl GpuPyramidPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let layout = PassLayout::new(gpu);
        let module = layout.shader(gpu, "seamfill::pyramid", SHADER);
        GpuPyramidPipeline {
            conv_rows: ComputeProgram::new(gpu, &layout, &module, "conv_rows"),
            down_cols: ComputeProgram::new(gpu, &layout, &module, "down_cols"),
            up_rows: ComputeProgram::new(gpu, &layout, &module, "up_rows"),
            combine: ComputeProgram::new(gpu, &layout, &module, "combine"),
            reassert: ComputeProgram::new(gpu, &layout, &module, "reassert"),
            reassert_weight: ComputeProgram::new(gpu, &layout, &module, "reassert_weight"),
            layout,
        }
    }
}

// ---------------------------------------------------------------------------
// Pyramid
// ---------------------------------------------------------------------------

/// Weight textures of one level.
pub struct GpuWeight {
    pub input: GpuImage,
    pub output: GpuImage,
}

pub struct GpuLevel {
    pub input: GpuImage,
    pub output: GpuImage,
    pub weight: Option<GpuWeight>,
    tmp: GpuImage,
    tmp2: GpuImage,
    pub layout: LevelLayout,
}

impl GpuLevel {
    fn size(&self) -> (u32, u32) {
        (self.layout.width as u32, self.layout.height as u32)
    }

    /// (a_i, â_i) pairs: the colors, then the weight if present.
    fn chains(&self) -> impl Iterator<Item = (&GpuImage, &GpuImage)> + '_ {
        std::iter::once((&self.input, &self.output))
            .chain(self.weight.as_ref().map(|w| (&w.input, &w.output)))
    }
}

/// GPU-resident pyramid for one (resolution, depth, kernel table).
pub struct GpuPyramid {
    levels: Vec<GpuLevel>,
    width: usize,
    height: usize,
    table: Arc<KernelTable>,
}

impl GpuPyramid {
    /// Allocate every level inside an error scope.
    ///
    /// # Errors
    /// `EmptyDimensions`, `InvalidLevels` like the CPU pyramid,
    /// `DimensionMismatch` if `table` was built for another size, and
    /// `Device` when allocation fails.
    pub fn new(gpu: &GpuDevice, table: Arc<KernelTable>) -> Result<Self, FillError> {
        Self::new_inner(gpu, table, false)
    }

    /// Like [`GpuPyramid::new`], plus the weight textures `Replace` needs.
    pub fn new_weighted(gpu: &GpuDevice, table: Arc<KernelTable>) -> Result<Self, FillError> {
        Self::new_inner(gpu, table, true)
    }

    fn new_inner(gpu: &GpuDevice, table: Arc<KernelTable>, weighted: bool) -> Result<Self, FillError> {
        let key = table.key;
        let (width, height, levels) = (key.width, key.height, key.levels);
        if width == 0 || height == 0 {
            return Err(FillError::EmptyDimensions);
        }
        let layouts = level_layouts(width, height, PYRAMID_PADDING);
        if levels == 0 || levels > layouts.len() {
            return Err(FillError::InvalidLevels { requested: levels, max: layouts.len(), width, height });
        }

        let built = gpu.scoped("pyramid levels", || {
            layouts
                .iter()
                .take(levels)
                .enumerate()
                .map(|(i, l)| {
                    let (w, h) = (l.width as u32, l.height as u32);
                    GpuLevel {
                        input: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].input")),
                        output: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].output")),
                        weight: weighted.then(|| GpuWeight {
                            input: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].w_input")),
                            output: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].w_output")),
                        }),
                        tmp: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].tmp")),
                        tmp2: GpuImage::new(gpu, w, h, &format!("pyramid[{i}].tmp2")),
                        layout: *l,
                    }
                })
                .collect::<Vec<_>>()
        })?;

        log::info!(
            "[seamfill::gpu] pyramid of {levels} levels for {width}×{height} ({:?} kernels{})",
            key.set,
            if weighted { ", weighted" } else { "" }
        );
        Ok(GpuPyramid { levels: built, width, height, table })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> &GpuLevel {
        &self.levels[i]
    }

    pub fn table(&self) -> &KernelTable {
        &self.table
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_weighted(&self) -> bool {
        self.levels[0].weight.is_some()
    }

    /// `2·(L − 1) + 1`, as on the CPU.
    pub fn pass_count(&self) -> usize {
        2 * (self.levels.len() - 1) + 1
    }

    /// Upload `src` into the padded level-0 input.
    ///
    /// # Errors
    /// `DimensionMismatch` for a buffer of another size.
    pub fn load(&self, gpu: &GpuDevice, src: &ImageBuffer) -> Result<(), FillError> {
        self.check_size(src.width(), src.height())?;
        let l0 = &self.levels[0];
        l0.input.write(gpu, &self.pad(&buffer_to_texels(src)));
        Ok(())
    }

    /// Upload `weight` into the padded level-0 weight input.
    ///
    /// # Errors
    /// `MissingWeights` on an unweighted pyramid, `DimensionMismatch` for a
    /// plane of another size.
    pub fn load_weight(&self, gpu: &GpuDevice, weight: &Image<f32>) -> Result<(), FillError> {
        self.check_size(weight.width(), weight.height())?;
        let w = self.levels[0].weight.as_ref().ok_or(FillError::MissingWeights)?;
        let inner: Vec<Texel> = weight.as_slice().iter().map(|&v| [v, 0.0, 0.0, 0.0]).collect();
        w.input.write(gpu, &self.pad(&inner));
        Ok(())
    }

    fn check_size(&self, w: usize, h: usize) -> Result<(), FillError> {
        if (w, h) != (self.width, self.height) {
            return Err(FillError::DimensionMismatch { expected: (self.width, self.height), got: (w, h) });
        }
        Ok(())
    }

    /// Place unpadded texels inside a zeroed level-0 grid.
    fn pad(&self, inner: &[Texel]) -> Vec<Texel> {
        let l0 = &self.levels[0];
        let p = PYRAMID_PADDING;
        let mut texels: Vec<Texel> = vec![[0.0; 4]; l0.layout.width * l0.layout.height];
        for y in 0..self.height {
            let dst = (y + p) * l0.layout.width + p;
            texels[dst..dst + self.width].copy_from_slice(&inner[y * self.width..(y + 1) * self.width]);
        }
        texels
    }

    /// Record pass `k` of the walk.
    ///
    /// # Panics
    /// Panics if `k >= pass_count()`, or for `Replace` on an unweighted
    /// pyramid.
    pub fn record_pass(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        encoder: &mut wgpu::CommandEncoder,
        k: usize,
        mode: CombineMode,
    ) {
        assert!(k < self.pass_count(), "pass {k} out of range");
        let last = self.levels.len() - 1;
        let level = if k < last {
            self.record_downscale(gpu, pipe, encoder, k);
            return;
        } else if k == last {
            self.record_coarsest(gpu, pipe, encoder);
            last
        } else {
            let i = 2 * last - k;
            self.record_upscale(gpu, pipe, encoder, i);
            i
        };
        if mode == CombineMode::Replace {
            self.record_reassert(gpu, pipe, encoder, level);
        }
    }

    /// Record the whole walk.
    pub fn record_all(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        encoder: &mut wgpu::CommandEncoder,
        mode: CombineMode,
    ) {
        for k in 0..self.pass_count() {
            self.record_pass(gpu, pipe, encoder, k, mode);
        }
    }

    fn record_downscale(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        encoder: &mut wgpu::CommandEncoder,
        i: usize,
    ) {
        let (fine, coarse) = (&self.levels[i], &self.levels[i + 1]);
        let h1 = &self.table.kernels.h1;
        let rows = PyramidParams::new(fine.size(), fine.size(), (0, 0), h1);
        let cols = PyramidParams::new(fine.size(), coarse.size(), fine.layout.shift, h1);
        for ((src, _), (dst, _)) in fine.chains().zip(coarse.chains()) {
            pipe.conv_rows.dispatch(gpu, &pipe.layout, encoder, &[src], &fine.tmp, bytemuck::bytes_of(&rows));
            pipe.down_cols.dispatch(gpu, &pipe.layout, encoder, &[&fine.tmp], dst, bytemuck::bytes_of(&cols));
        }
    }

    fn record_coarsest(&self, gpu: &GpuDevice, pipe: &GpuPyramidPipeline, encoder: &mut wgpu::CommandEncoder) {
        let lvl = &self.levels[self.levels.len() - 1];
        let g = &self.table.kernels.g;
        let rows = PyramidParams::new(lvl.size(), lvl.size(), (0, 0), g);
        for (input, output) in lvl.chains() {
            pipe.conv_rows.dispatch(gpu, &pipe.layout, encoder, &[input], &lvl.tmp2, bytemuck::bytes_of(&rows));
            pipe.combine.dispatch(gpu, &pipe.layout, encoder, &[&lvl.tmp2, &lvl.tmp2], output, bytemuck::bytes_of(&rows));
        }
    }

    fn record_upscale(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        encoder: &mut wgpu::CommandEncoder,
        i: usize,
    ) {
        let (fine, coarse) = (&self.levels[i], &self.levels[i + 1]);
        let k = &self.table.kernels;
        let up = PyramidParams::new(coarse.size(), fine.size(), fine.layout.shift, &k.h2);
        let rows = PyramidParams::new(fine.size(), fine.size(), (0, 0), &k.g);
        let comb = rows.with_taps2(&k.h2);
        for ((input, output), (_, coarse_out)) in fine.chains().zip(coarse.chains()) {
            pipe.up_rows.dispatch(gpu, &pipe.layout, encoder, &[coarse_out], &fine.tmp, bytemuck::bytes_of(&up));
            pipe.conv_rows.dispatch(gpu, &pipe.layout, encoder, &[input], &fine.tmp2, bytemuck::bytes_of(&rows));
            pipe.combine.dispatch(
                gpu,
                &pipe.layout,
                encoder,
                &[&fine.tmp, &fine.tmp2],
                output,
                bytemuck::bytes_of(&comb),
            );
        }
    }

    fn record_reassert(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        encoder: &mut wgpu::CommandEncoder,
        i: usize,
    ) {
        let lvl = &self.levels[i];
        let Some(w) = lvl.weight.as_ref() else {
            panic!("reassert({i}) on an unweighted pyramid");
        };
        let params = PyramidParams::new(lvl.size(), lvl.size(), (0, 0), &[]).with_gain(self.table.gain(i));
        let bytes = bytemuck::bytes_of(&params);
        pipe.reassert.dispatch(
            gpu,
            &pipe.layout,
            encoder,
            &[&lvl.output, &lvl.input, &w.input, &w.output],
            &lvl.tmp,
            bytes,
        );
        pipe.reassert_weight.dispatch(gpu, &pipe.layout, encoder, &[&w.output, &w.input], &lvl.tmp2, bytes);
        lvl.tmp.record_copy(encoder, &lvl.output);
        lvl.tmp2.record_copy(encoder, &w.output);
    }

    /// Read back level 0's output cropped to the unpadded size.
    ///
    /// # Errors
    /// Readback failures.
    pub fn extract(&self, gpu: &GpuDevice, channels: usize) -> Result<ImageBuffer, FillError> {
        let l0 = &self.levels[0];
        let full = l0.output.readback(gpu)?;
        let texels = crop_texels(&full, l0.layout.width, PYRAMID_PADDING, self.width, self.height);
        texels_to_buffer(&texels, self.width, self.height, channels)
    }

    /// Read back level 0's weight output.
    ///
    /// # Errors
    /// `MissingWeights` on an unweighted pyramid, readback failures.
    pub fn extract_weight(&self, gpu: &GpuDevice) -> Result<Image<f32>, FillError> {
        let l0 = &self.levels[0];
        let w = l0.weight.as_ref().ok_or(FillError::MissingWeights)?;
        let full = w.output.readback(gpu)?;
        let texels = crop_texels(&full, l0.layout.width, PYRAMID_PADDING, self.width, self.height);
        Ok(Image::from_vec(self.width, self.height, texels.iter().map(|t| t[0]).collect()))
    }

    /// load + every pass + extract, in one submission.
    ///
    /// # Errors
    /// As on the CPU: `MissingWeights` for `Replace` on an unweighted
    /// pyramid; also device and readback failures.
    pub fn process(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        src: &ImageBuffer,
        mode: CombineMode,
    ) -> Result<ImageBuffer, FillError> {
        if mode == CombineMode::Replace && !self.is_weighted() {
            return Err(FillError::MissingWeights);
        }
        self.load(gpu, src)?;
        gpu.scoped("pyramid walk", || {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuPyramid::process") });
            self.record_all(gpu, pipe, &mut encoder, mode);
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;
        self.extract(gpu, src.channels())
    }

    /// Weighted `Replace` walk: colors and weight in, both solved planes out.
    pub fn process_weighted(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuPyramidPipeline,
        src: &ImageBuffer,
        weight: &Image<f32>,
    ) -> Result<(ImageBuffer, Image<f32>), FillError> {
        self.load_weight(gpu, weight)?;
        let colors = self.process(gpu, pipe, src, CombineMode::Replace)?;
        Ok((colors, self.extract_weight(gpu)?))
    }
}

/// Copy the `w × h` window at (pad, pad) out of a row-major texel grid of
/// width `full_w`.
pub(crate) fn crop_texels(full: &[Texel], full_w: usize, pad: usize, w: usize, h: usize) -> Vec<Texel> {
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let start = (y + pad) * full_w + pad;
        out.extend_from_slice(&full[start..start + w]);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
