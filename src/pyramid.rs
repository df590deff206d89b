// pyramid.rs — Convolution pyramid (CPU reference).
//
// The pyramid approximates a large, slowly decaying convolution with a
// chain of 5-tap and 3-tap filters at decreasing resolution:
//
//   a_0     = pad(input)
//   a_{i+1} = ↓(h1 * a_i)                       downscale(i)
//   â_L     = g * a_L                           filter(L, Residual)
//   â_i     = h2 * ↑(â_{i+1}) + g * a_i         upscale(i)
//   output  = crop(â_0)
//
// Each level keeps both buffers: `input` holds a_i, `output` holds â_i.
//
// PADDING AND SHIFT
// ─────────────────
// Level 0 is the input surrounded by PYRAMID_PADDING zero texels, so the
// filters never see the image edge. Decimation does not always start at
// texel 0: each level records a per-axis `shift` (0 or 1), and downscale
// keeps fine texel `2X + shift` while upscale puts coarse texel X back at
// the same `2X + shift`. The shift is chosen so that the unpadded image's
// origin stays on the sampling lattice at every level
// (`shift = origin % 2`, `next_origin = (origin − shift) / 2`). Using one
// shift for both directions keeps down and up sampling in phase. Without
// it the reconstruction drifts by half a texel per level, which shows up
// as a seam offset.
//
//   size_{i+1} = ceil((size_i − shift_i) / 2)
//
// COMBINE MODES
// ─────────────
//   Accumulate — â_i is the plain sum above (gradient integration).
//   Replace    — after each upscale, and after the coarsest filter, known
//                data is re-asserted. A weighted pyramid carries a separate
//                weight plane `w` on every level, walked with the same
//                filters as the color planes, and the colors are
//                premultiplied by it. Per texel:
//                   coverage = clamp(a_i.w / gain_i, 0, 1)
//                   n        = lerp(â_i.c / â_i.w, a_i.c / a_i.w, coverage)
//                   â_i.c    = n · â_i.w
//                At level 0 coverage is the seed mask itself, so seeds come
//                out exactly.
//
// The walk is exposed pass by pass (`pass_count` / `run_pass`) so a caller
// can spread one solve over several frames.

use std::sync::Arc;

use crate::buffer::ImageBuffer;
use crate::convolution::{convolve_separable_into, Border, ConvolveScratch};
use crate::error::FillError;
use crate::image::Image;
use crate::kernels::{KernelId, KernelKey, KernelSet, KernelTable};

/// Zero texels added on every side of level 0.
pub const PYRAMID_PADDING: usize = 5;
/// Smallest allowed level width or height.
pub const MIN_LEVEL_SIZE: usize = 2;
/// Channel count used by `ConvolutionPyramid::build`.
pub const DEFAULT_CHANNELS: usize = 4;
/// Weights at or below this are treated as "no information".
pub const WEIGHT_EPSILON: f32 = 1e-30;

/// How upscale combines the coarse interpolation with the level's own data.
///
/// `Replace` needs a pyramid built with [`ConvolutionPyramid::build_weighted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    Accumulate,
    Replace,
}

/// Size and sampling phase of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLayout {
    pub width: usize,
    pub height: usize,
    /// Decimation phase per axis, 0 or 1.
    pub shift: (usize, usize),
    /// Position of the unpadded image's texel (0, 0) on this level's grid.
    pub origin: (usize, usize),
}

/// Compute every level layout whose size stays at or above
/// `MIN_LEVEL_SIZE` in both dimensions.
pub fn level_layouts(width: usize, height: usize, padding: usize) -> Vec<LevelLayout> {
    let mut out = Vec::new();
    let mut size = (width + 2 * padding, height + 2 * padding);
    let mut origin = (padding, padding);
    while size.0 >= MIN_LEVEL_SIZE && size.1 >= MIN_LEVEL_SIZE {
        let shift = (origin.0 % 2, origin.1 % 2);
        out.push(LevelLayout { width: size.0, height: size.1, shift, origin });
        size = ((size.0 - shift.0 + 1) / 2, (size.1 - shift.1 + 1) / 2);
        origin = ((origin.0 - shift.0) / 2, (origin.1 - shift.1) / 2);
    }
    out
}

/// Deepest pyramid that `width × height` supports.
pub fn max_levels(width: usize, height: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    level_layouts(width, height, PYRAMID_PADDING).len()
}

/// Coverage planes of a weighted level.
pub struct WeightPlanes {
    /// a_i.w
    pub input: Image<f32>,
    /// â_i.w
    pub output: Image<f32>,
}

/// One pyramid level: analysis buffer, synthesis buffer, and layout.
pub struct PyramidLevel {
    /// a_i
    pub input: ImageBuffer,
    /// â_i
    pub output: ImageBuffer,
    /// Present on weighted pyramids only.
    pub weight: Option<WeightPlanes>,
    pub width: usize,
    pub height: usize,
    /// Zero border around the image, non-zero on level 0 only.
    pub padding: usize,
    pub shift: (usize, usize),
    pub origin: (usize, usize),
}

/// Multi-level pyramid plus the scratch space its passes reuse.
pub struct ConvolutionPyramid {
    levels: Vec<PyramidLevel>,
    width: usize,
    height: usize,
    channels: usize,
    table: Arc<KernelTable>,
    scratch: ConvolveScratch,
    zero_inserted: Image<f32>,
}

impl ConvolutionPyramid {
    /// Build a `levels`-deep pyramid for `width × height` RGBA buffers.
    ///
    /// # Errors
    /// `EmptyDimensions` for a zero dimension, `InvalidLevels` if `levels`
    /// is 0 or deeper than [`max_levels`].
    pub fn build(width: usize, height: usize, levels: usize) -> Result<Self, FillError> {
        Self::build_with_channels(width, height, levels, DEFAULT_CHANNELS)
    }

    /// Build with an explicit channel count (1..=4).
    pub fn build_with_channels(
        width: usize,
        height: usize,
        levels: usize,
        channels: usize,
    ) -> Result<Self, FillError> {
        Self::build_inner(width, height, levels, channels, false)
    }

    /// Build with `channels` color planes plus a weight plane per level,
    /// as `CombineMode::Replace` needs. The weight does not count against
    /// the 4-channel limit.
    pub fn build_weighted(
        width: usize,
        height: usize,
        levels: usize,
        channels: usize,
    ) -> Result<Self, FillError> {
        Self::build_inner(width, height, levels, channels, true)
    }

    fn build_inner(
        width: usize,
        height: usize,
        levels: usize,
        channels: usize,
        weighted: bool,
    ) -> Result<Self, FillError> {
        if width == 0 || height == 0 {
            return Err(FillError::EmptyDimensions);
        }
        let layouts = level_layouts(width, height, PYRAMID_PADDING);
        if levels == 0 || levels > layouts.len() {
            return Err(FillError::InvalidLevels {
                requested: levels,
                max: layouts.len(),
                width,
                height,
            });
        }

        let mut built = Vec::with_capacity(levels);
        for (i, l) in layouts.iter().take(levels).enumerate() {
            built.push(PyramidLevel {
                input: ImageBuffer::new(l.width, l.height, channels)?,
                output: ImageBuffer::new(l.width, l.height, channels)?,
                weight: weighted.then(|| WeightPlanes {
                    input: Image::new(l.width, l.height),
                    output: Image::new(l.width, l.height),
                }),
                width: l.width,
                height: l.height,
                padding: if i == 0 { PYRAMID_PADDING } else { 0 },
                shift: l.shift,
                origin: l.origin,
            });
        }

        let table = Arc::new(KernelTable::new(KernelKey {
            width,
            height,
            levels,
            set: KernelSet::Membrane,
        }));

        log::info!(
            "[seamfill::pyramid] built {levels} levels for {width}×{height}×{channels}{} \
             (level 0 padded to {}×{})",
            if weighted { " + weight" } else { "" },
            built[0].width,
            built[0].height
        );

        Ok(ConvolutionPyramid {
            levels: built,
            width,
            height,
            channels,
            table,
            scratch: ConvolveScratch::default(),
            zero_inserted: Image::new(0, 0),
        })
    }

    /// Attach a kernel table built for this pyramid's configuration.
    ///
    /// # Errors
    /// `DimensionMismatch` / `InvalidLevels` if the table's key does not
    /// describe this pyramid.
    pub fn set_kernels(&mut self, table: Arc<KernelTable>) -> Result<(), FillError> {
        let k = table.key;
        if (k.width, k.height) != (self.width, self.height) {
            return Err(FillError::DimensionMismatch {
                expected: (self.width, self.height),
                got: (k.width, k.height),
            });
        }
        if k.levels != self.levels.len() {
            return Err(FillError::InvalidLevels {
                requested: k.levels,
                max: self.levels.len(),
                width: self.width,
                height: self.height,
            });
        }
        self.table = table;
        Ok(())
    }

    pub fn kernels(&self) -> &KernelTable {
        &self.table
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True when every level carries a weight plane.
    pub fn is_weighted(&self) -> bool {
        self.levels[0].weight.is_some()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> &PyramidLevel {
        &self.levels[i]
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    /// Level layouts, finest first.
    pub fn layouts(&self) -> Vec<LevelLayout> {
        self.levels
            .iter()
            .map(|l| LevelLayout {
                width: l.width,
                height: l.height,
                shift: l.shift,
                origin: l.origin,
            })
            .collect()
    }

    /// Copy `src` into the padded level-0 input. Padding texels are zeroed.
    ///
    /// # Errors
    /// Format mismatch with the pyramid.
    pub fn load(&mut self, src: &ImageBuffer) -> Result<(), FillError> {
        let expected = crate::buffer::BufferFormat::new(self.width, self.height, self.channels);
        expected.check(&src.format())?;
        let level0 = &mut self.levels[0];
        let p = level0.padding;
        for (dst, s) in level0.input.planes_mut().iter_mut().zip(src.planes()) {
            dst.fill(0.0);
            dst.blit(s, p, p);
        }
        Ok(())
    }

    /// Copy `weight` into the padded level-0 weight plane.
    ///
    /// # Errors
    /// `MissingWeights` on an unweighted pyramid, `DimensionMismatch` for a
    /// plane of the wrong size.
    pub fn load_weight(&mut self, weight: &Image<f32>) -> Result<(), FillError> {
        if weight.dims() != (self.width, self.height) {
            return Err(FillError::DimensionMismatch {
                expected: (self.width, self.height),
                got: weight.dims(),
            });
        }
        let level0 = &mut self.levels[0];
        let p = level0.padding;
        let planes = level0.weight.as_mut().ok_or(FillError::MissingWeights)?;
        planes.input.fill(0.0);
        planes.input.blit(weight, p, p);
        Ok(())
    }

    /// a_{i+1} = ↓(h1 * a_i), sampling fine texel `2X + shift_i`.
    ///
    /// # Panics
    /// Panics if `i + 1 >= num_levels()`.
    pub fn downscale(&mut self, i: usize) {
        assert!(i + 1 < self.levels.len(), "downscale({i}) needs level {}", i + 1);
        let ConvolutionPyramid { levels, table, scratch, .. } = self;
        let (fine, coarse) = levels.split_at_mut(i + 1);
        let fine = &fine[i];
        let coarse = &mut coarse[0];
        let (sx, sy) = fine.shift;
        let h1 = &table.kernels.h1;

        for c in 0..fine.input.channels() {
            decimate(fine.input.plane(c), coarse.input.plane_mut(c), h1, (sx, sy), scratch);
        }
        if let (Some(fw), Some(cw)) = (fine.weight.as_ref(), coarse.weight.as_mut()) {
            decimate(&fw.input, &mut cw.input, h1, (sx, sy), scratch);
        }
        log::trace!("[seamfill::pyramid] downscale {i} -> {}", i + 1);
    }

    /// â_i = k * a_i for a stationary kernel `id`.
    pub fn filter(&mut self, level: usize, id: KernelId) {
        let ConvolutionPyramid { levels, table, scratch, .. } = self;
        let lvl = &mut levels[level];
        let taps = table.kernels.taps(id);
        for c in 0..lvl.input.channels() {
            convolve_separable_into(lvl.input.plane(c), taps, taps, Border::Zero, scratch);
            lvl.output.plane_mut(c).clone_from(&scratch.output);
        }
        if let Some(w) = lvl.weight.as_mut() {
            convolve_separable_into(&w.input, taps, taps, Border::Zero, scratch);
            w.output.clone_from(&scratch.output);
        }
        log::trace!("[seamfill::pyramid] filter {level} with {id:?}");
    }

    /// â_i = h2 * ↑(â_{i+1}) + g * a_i, then the combine rule.
    ///
    /// # Panics
    /// Panics if `i + 1 >= num_levels()`.
    pub fn upscale(&mut self, i: usize, mode: CombineMode) {
        assert!(i + 1 < self.levels.len(), "upscale({i}) needs level {}", i + 1);
        {
            let ConvolutionPyramid { levels, table, scratch, zero_inserted, .. } = self;
            let (fine, coarse) = levels.split_at_mut(i + 1);
            let fine = &mut fine[i];
            let coarse = &coarse[0];
            let (sx, sy) = fine.shift;
            let h2 = &table.kernels.h2;
            let g = &table.kernels.g;

            let taps = UpTaps { h2, g, shift: (sx, sy) };
            for c in 0..fine.input.channels() {
                let (fin, fout) = (fine.input.plane(c), fine.output.plane_mut(c));
                interpolate(coarse.output.plane(c), fin, fout, &taps, zero_inserted, scratch);
            }
            if let (Some(fw), Some(cw)) = (fine.weight.as_mut(), coarse.weight.as_ref()) {
                interpolate(&cw.output, &fw.input, &mut fw.output, &taps, zero_inserted, scratch);
            }
        }
        if mode == CombineMode::Replace {
            self.reassert(i);
        }
        log::trace!("[seamfill::pyramid] upscale {} -> {i}", i + 1);
    }

    /// Pull `output` toward the known data in `input` by coverage
    /// (see the module header). Colors are premultiplied by the weight
    /// plane.
    ///
    /// # Panics
    /// Panics on an unweighted pyramid.
    pub fn reassert(&mut self, level: usize) {
        let gain = self.table.gain(level);
        let lvl = &mut self.levels[level];
        let channels = lvl.input.channels();
        let Some(weight) = lvl.weight.as_mut() else {
            panic!("reassert({level}) on an unweighted pyramid");
        };

        for y in 0..lvl.height {
            for x in 0..lvl.width {
                let wi = weight.input.get(x, y);
                let coverage = (wi / gain).clamp(0.0, 1.0);
                if coverage <= 0.0 || wi <= WEIGHT_EPSILON {
                    continue;
                }
                let wo = weight.output.get(x, y);
                if wo <= WEIGHT_EPSILON {
                    // Nothing interpolated here yet: take the known data as is.
                    for c in 0..channels {
                        let v = lvl.input.get(x, y, c);
                        lvl.output.set(x, y, c, v);
                    }
                    weight.output.set(x, y, wi);
                    continue;
                }
                for c in 0..channels {
                    let n_in = lvl.input.get(x, y, c) / wi;
                    let n_out = lvl.output.get(x, y, c) / wo;
                    let blended = n_out + (n_in - n_out) * coverage;
                    lvl.output.set(x, y, c, blended * wo);
                }
            }
        }
    }

    /// Number of passes in one full walk: `2·(L − 1) + 1`.
    pub fn pass_count(&self) -> usize {
        2 * (self.levels.len() - 1) + 1
    }

    /// Run pass `k` of the walk: downscales, the coarsest filter, then
    /// upscales back to level 0.
    ///
    /// # Panics
    /// Panics if `k >= pass_count()`, or for `Replace` on an unweighted
    /// pyramid.
    pub fn run_pass(&mut self, k: usize, mode: CombineMode) {
        let last = self.levels.len() - 1;
        assert!(k < self.pass_count(), "pass {k} out of range");
        if k < last {
            self.downscale(k);
        } else if k == last {
            self.filter(last, KernelId::Residual);
            if mode == CombineMode::Replace {
                self.reassert(last);
            }
        } else {
            self.upscale(2 * last - k, mode);
        }
    }

    /// Crop level 0's output back to the unpadded size.
    pub fn extract(&self) -> ImageBuffer {
        let l0 = &self.levels[0];
        l0.output.crop(l0.padding, l0.padding, self.width, self.height)
    }

    /// Crop level 0's weight output, `None` on an unweighted pyramid.
    pub fn extract_weight(&self) -> Option<Image<f32>> {
        let l0 = &self.levels[0];
        l0.weight.as_ref().map(|w| w.output.crop(l0.padding, l0.padding, self.width, self.height))
    }

    /// load + every pass + extract.
    ///
    /// # Errors
    /// Format mismatch, or `MissingWeights` for `Replace` on an unweighted
    /// pyramid (a weighted one reuses the last loaded weight plane).
    pub fn process(&mut self, src: &ImageBuffer, mode: CombineMode) -> Result<ImageBuffer, FillError> {
        if mode == CombineMode::Replace && !self.is_weighted() {
            return Err(FillError::MissingWeights);
        }
        self.load(src)?;
        for k in 0..self.pass_count() {
            self.run_pass(k, mode);
        }
        Ok(self.extract())
    }

    /// Load premultiplied colors and their weight, run a `Replace` walk, and
    /// return both solved planes.
    pub fn process_weighted(
        &mut self,
        src: &ImageBuffer,
        weight: &Image<f32>,
    ) -> Result<(ImageBuffer, Image<f32>), FillError> {
        self.load_weight(weight)?;
        let colors = self.process(src, CombineMode::Replace)?;
        let solved = self.extract_weight().ok_or(FillError::MissingWeights)?;
        Ok((colors, solved))
    }
}

/// a_{i+1} = ↓(h1 * a_i) for one plane.
fn decimate(src: &Image<f32>, dst: &mut Image<f32>, h1: &[f32], shift: (usize, usize), scratch: &mut ConvolveScratch) {
    convolve_separable_into(src, h1, h1, Border::Zero, scratch);
    let blurred = &scratch.output;
    let (sx, sy) = shift;
    for y in 0..dst.height() {
        for x in 0..dst.width() {
            // SAFETY: 2x + sx < fine width by the level size rule.
            unsafe {
                dst.set_unchecked(x, y, blurred.get_unchecked(2 * x + sx, 2 * y + sy));
            }
        }
    }
}

struct UpTaps<'a> {
    h2: &'a [f32],
    g: &'a [f32],
    shift: (usize, usize),
}

/// â_i = h2 * ↑(â_{i+1}) + g * a_i for one plane.
fn interpolate(
    coarse: &Image<f32>,
    fine_in: &Image<f32>,
    fine_out: &mut Image<f32>,
    taps: &UpTaps<'_>,
    zero_inserted: &mut Image<f32>,
    scratch: &mut ConvolveScratch,
) {
    let (sx, sy) = taps.shift;
    zero_inserted.clear_resize(fine_in.width(), fine_in.height());
    for y in 0..coarse.height() {
        for x in 0..coarse.width() {
            // SAFETY: same bound as decimate.
            unsafe {
                zero_inserted.set_unchecked(2 * x + sx, 2 * y + sy, coarse.get_unchecked(x, y));
            }
        }
    }
    convolve_separable_into(zero_inserted, taps.h2, taps.h2, Border::Zero, scratch);
    fine_out.clone_from(&scratch.output);

    convolve_separable_into(fine_in, taps.g, taps.g, Border::Zero, scratch);
    for (o, r) in fine_out.as_mut_slice().iter_mut().zip(scratch.output.as_slice()) {
        *o += *r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_256() {
        let l = level_layouts(256, 256, PYRAMID_PADDING);
        let widths: Vec<usize> = l.iter().map(|l| l.width).collect();
        assert_eq!(widths, vec![266, 133, 67, 33, 17, 9, 5, 3, 2]);
        assert_eq!(l[0].origin, (5, 5));
        assert_eq!(l[0].shift, (1, 1));
        assert_eq!(l[1].origin, (2, 2));
        assert_eq!(l[1].shift, (0, 0));
        assert_eq!(l[2].origin, (1, 1));
        assert_eq!(l[2].shift, (1, 1));
        assert_eq!(l[3].origin, (0, 0));
        assert_eq!(max_levels(256, 256), 9);
    }

    #[test]
    fn test_layout_origin_stays_on_lattice() {
        // The unpadded origin at level i+1, mapped back with the shift,
        // lands on the origin at level i (up to the dropped odd texel).
        for (w, h) in [(37, 23), (64, 64), (1, 9), (300, 7)] {
            let l = level_layouts(w, h, PYRAMID_PADDING);
            for pair in l.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert_eq!(2 * b.origin.0 + a.shift.0, a.origin.0);
                assert_eq!(2 * b.origin.1 + a.shift.1, a.origin.1);
                assert!(2 * (b.width - 1) + a.shift.0 < a.width);
                assert!(2 * (b.height - 1) + a.shift.1 < a.height);
            }
        }
    }

    #[test]
    fn test_invalid_levels() {
        assert!(matches!(
            ConvolutionPyramid::build(256, 256, 10),
            Err(FillError::InvalidLevels { requested: 10, max: 9, .. })
        ));
        assert!(matches!(
            ConvolutionPyramid::build(256, 256, 0),
            Err(FillError::InvalidLevels { requested: 0, .. })
        ));
        assert!(ConvolutionPyramid::build(256, 256, 9).is_ok());
        assert!(matches!(ConvolutionPyramid::build(0, 8, 1), Err(FillError::EmptyDimensions)));
    }

    #[test]
    fn test_load_rejects_mismatch() {
        let mut p = ConvolutionPyramid::build_with_channels(16, 16, 3, 2).unwrap();
        let wrong = ImageBuffer::new(16, 8, 2).unwrap();
        assert!(matches!(p.load(&wrong), Err(FillError::DimensionMismatch { .. })));
        let wrong = ImageBuffer::new(16, 16, 3).unwrap();
        assert!(matches!(p.load(&wrong), Err(FillError::ChannelMismatch { .. })));
    }

    #[test]
    fn test_pass_count() {
        let p = ConvolutionPyramid::build(64, 64, 5).unwrap();
        assert_eq!(p.pass_count(), 9);
        let p = ConvolutionPyramid::build(64, 64, 1).unwrap();
        assert_eq!(p.pass_count(), 1);
    }

    #[test]
    fn test_downscale_respects_shift() {
        // Level 0 origin 5 → shift 1. An impulse at padded texel (5, 5),
        // i.e. image texel (0, 0), must land on coarse texel (2, 2) with
        // the h1 center weight squared.
        let mut p = ConvolutionPyramid::build_with_channels(8, 8, 2, 1).unwrap();
        let mut src = ImageBuffer::new(8, 8, 1).unwrap();
        src.set(0, 0, 0, 1.0);
        p.load(&src).unwrap();
        p.downscale(0);
        let center = p.kernels().kernels.h1[2];
        let v = p.level(1).input.get(2, 2, 0);
        assert!((v - center * center).abs() < 1e-6, "got {v}");
    }

    #[test]
    fn test_constant_replace_is_exact() {
        let c = 0.37f32;
        let (w, h) = (40, 28);
        let levels = max_levels(w, h);
        let mut p = ConvolutionPyramid::build_weighted(w, h, levels, 1).unwrap();
        let src = ImageBuffer::filled(w, h, &[c]).unwrap();
        let (out, weight) = p.process_weighted(&src, &Image::filled(w, h, 1.0)).unwrap();
        for (x, y, wv) in weight.pixels() {
            let ratio = out.get(x, y, 0) / wv;
            assert!((ratio - c).abs() < 1e-5, "({x},{y}) ratio {ratio}");
        }
    }

    #[test]
    fn test_replace_without_weights() {
        let mut p = ConvolutionPyramid::build(16, 16, 3).unwrap();
        let src = ImageBuffer::new(16, 16, 4).unwrap();
        assert!(matches!(p.process(&src, CombineMode::Replace), Err(FillError::MissingWeights)));
        assert!(matches!(p.load_weight(&Image::new(16, 16)), Err(FillError::MissingWeights)));
    }

    #[test]
    fn test_constant_accumulate_ratio() {
        let c = 0.6f32;
        let (w, h) = (33, 50);
        let mut p = ConvolutionPyramid::build_with_channels(w, h, 5, 2).unwrap();
        p.set_kernels(Arc::new(KernelTable::new(KernelKey {
            width: w,
            height: h,
            levels: 5,
            set: KernelSet::Integration,
        })))
        .unwrap();
        let src = ImageBuffer::filled(w, h, &[c, 1.0]).unwrap();
        let out = p.process(&src, CombineMode::Accumulate).unwrap();
        for y in 0..h {
            for x in 0..w {
                let wgt = out.get(x, y, 1);
                assert!(wgt > 0.0);
                let ratio = out.get(x, y, 0) / wgt;
                assert!((ratio - c).abs() < 1e-4, "({x},{y}) ratio {ratio}");
            }
        }
    }

    #[test]
    fn test_set_kernels_rejects_wrong_key() {
        let mut p = ConvolutionPyramid::build(32, 32, 3).unwrap();
        let t = Arc::new(KernelTable::new(KernelKey {
            width: 32,
            height: 16,
            levels: 3,
            set: KernelSet::Integration,
        }));
        assert!(p.set_kernels(t).is_err());
    }

    #[test]
    fn test_non_power_of_two_extract_size() {
        let mut p = ConvolutionPyramid::build_with_channels(37, 23, 4, 1).unwrap();
        let src = ImageBuffer::filled(37, 23, &[1.0]).unwrap();
        let out = p.process(&src, CombineMode::Accumulate).unwrap();
        assert_eq!((out.width(), out.height(), out.channels()), (37, 23, 1));
    }
}
