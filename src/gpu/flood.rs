// gpu/flood.rs — Jump flood on the GPU.
//
// Same algorithm as flood.rs, one dispatch per offset. Slots store the
// nearest seed's coordinates instead of a linear index:
//
//   slot = (seed_x, seed_y, valid, 0)
//
// Both slots live in a `PingPong<GpuImage>`, the same type the CPU flood
// uses, so a pass can never bind its read slot as its write target.

use crate::composite::{Composite, SEED_THRESHOLD};
use crate::error::FillError;
use crate::flood::{schedule, FloodResult, PingPong, NO_SEED};
use crate::gpu::device::GpuDevice;
use crate::gpu::image::{buffer_to_texels, plane_to_texels, GpuImage};
use crate::gpu::pass::{ComputeProgram, PassLayout};
use crate::image::Image;

const SHADER: &str = include_str!("../shaders/flood.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FloodParams {
    size: [u32; 2],
    offset: u32,
    threshold: f32,
}

/// Compiled flood kernels.
pub struct GpuFloodPipeline {
    layout: PassLayout,
    seed: ComputeProgram,
    jump: ComputeProgram,
    resolve: ComputeProgram,
    distance: ComputeProgram,
}

impl GpuFloodPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let layout = PassLayout::new(gpu);
        let module = layout.shader(gpu, "seamfill::flood", SHADER);
        GpuFloodPipeline {
            seed: ComputeProgram::new(gpu, &layout, &module, "flood_seed"),
            jump: ComputeProgram::new(gpu, &layout, &module, "flood_jump"),
            resolve: ComputeProgram::new(gpu, &layout, &module, "flood_resolve"),
            distance: ComputeProgram::new(gpu, &layout, &module, "flood_distance"),
            layout,
        }
    }
}

/// Flood slots for one resolution.
pub struct GpuFlood {
    width: u32,
    height: u32,
    slots: PingPong<GpuImage>,
}

impl GpuFlood {
    /// # Errors
    /// `EmptyDimensions` for a zero dimension, `Device` on allocation
    /// failure.
    pub fn new(gpu: &GpuDevice, width: usize, height: usize) -> Result<Self, FillError> {
        if width == 0 || height == 0 {
            return Err(FillError::EmptyDimensions);
        }
        let (w, h) = (width as u32, height as u32);
        let slots = gpu.scoped("flood slots", || {
            PingPong::new(
                GpuImage::new(gpu, w, h, "flood.ping"),
                GpuImage::new(gpu, w, h, "flood.pong"),
            )
        })?;
        Ok(GpuFlood { width: w, height: h, slots })
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    fn params(&self, offset: usize) -> FloodParams {
        FloodParams {
            size: [self.width, self.height],
            offset: offset as u32,
            threshold: SEED_THRESHOLD,
        }
    }

    /// Seed + every jump of the schedule. The read slot holds the result.
    pub fn record(
        &mut self,
        gpu: &GpuDevice,
        pipe: &GpuFloodPipeline,
        encoder: &mut wgpu::CommandEncoder,
        validity: &GpuImage,
        iterations: usize,
    ) {
        let seed = self.params(0);
        let [ping, _] = self.slots.reset();
        pipe.seed.dispatch(gpu, &pipe.layout, encoder, &[validity], ping, bytemuck::bytes_of(&seed));
        for offset in schedule(iterations) {
            let params = self.params(offset);
            let (read, write) = self.slots.split();
            pipe.jump.dispatch(gpu, &pipe.layout, encoder, &[read], write, bytemuck::bytes_of(&params));
            self.slots.swap();
        }
        log::trace!("[seamfill::gpu] flood recorded, {iterations} passes");
    }

    /// Nearest seed color for every texel into `out`.
    pub fn record_resolve(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuFloodPipeline,
        encoder: &mut wgpu::CommandEncoder,
        color: &GpuImage,
        out: &GpuImage,
    ) {
        let params = self.params(0);
        pipe.resolve.dispatch(gpu, &pipe.layout, encoder, &[self.slots.read(), color], out, bytemuck::bytes_of(&params));
    }

    /// (distance, valid, seed_x, seed_y) for every texel into `out`.
    pub fn record_distance(
        &self,
        gpu: &GpuDevice,
        pipe: &GpuFloodPipeline,
        encoder: &mut wgpu::CommandEncoder,
        out: &GpuImage,
    ) {
        let params = self.params(0);
        pipe.distance.dispatch(gpu, &pipe.layout, encoder, &[self.slots.read()], out, bytemuck::bytes_of(&params));
    }

    /// Full flood of `composite` with readback, matching
    /// [`crate::flood::FloodFiller::floodfill`].
    ///
    /// # Errors
    /// `DimensionMismatch` for a composite of another size, `Device` on
    /// allocation, submission or readback failure.
    pub fn floodfill(
        &mut self,
        gpu: &GpuDevice,
        pipe: &GpuFloodPipeline,
        composite: &Composite,
        iterations: usize,
    ) -> Result<FloodResult, FillError> {
        let (w, h) = (self.width(), self.height());
        if (composite.width(), composite.height()) != (w, h) {
            return Err(FillError::DimensionMismatch { expected: (w, h), got: (composite.width(), composite.height()) });
        }
        let (gw, gh) = (self.width, self.height);
        let (color, validity, flooded, dist) = gpu.scoped("flood inputs", || {
            (
                GpuImage::upload(gpu, &buffer_to_texels(&composite.color), gw, gh, "flood.color"),
                GpuImage::upload(gpu, &plane_to_texels(&composite.validity), gw, gh, "flood.validity"),
                GpuImage::new(gpu, gw, gh, "flood.resolved"),
                GpuImage::new(gpu, gw, gh, "flood.distance"),
            )
        })?;

        gpu.scoped("flood passes", || {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuFlood::floodfill") });
            self.record(gpu, pipe, &mut encoder, &validity, iterations);
            self.record_resolve(gpu, pipe, &mut encoder, &color, &flooded);
            self.record_distance(gpu, pipe, &mut encoder, &dist);
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;

        let color = flooded.readback_buffer(gpu, composite.channels())?;
        let dist = dist.readback(gpu)?;
        let mut distance = Image::new(w, h);
        let mut nearest = Image::filled(w, h, NO_SEED);
        for (i, t) in dist.iter().enumerate() {
            let (x, y) = (i % w, i / w);
            if t[1] >= 0.5 {
                distance.set(x, y, t[0]);
                nearest.set(x, y, (t[3] as u32) * self.width + t[2] as u32);
            } else {
                distance.set(x, y, f32::INFINITY);
            }
        }
        Ok(FloodResult { color, distance, nearest })
    }
}
