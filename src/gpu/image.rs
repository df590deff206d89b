// gpu/image.rs — Float textures and CPU↔GPU transfer.
//
// Every buffer the GPU fill touches is an `Rgba32Float` 2D texture: color,
// validity, flood slots, and all four textures of every pyramid level. One
// format means one bind group layout serves every pass.
//
// Planar CPU buffers are packed into RGBA texels on the way up (missing
// channels become 0) and unpacked on the way down.
//
// ROW ALIGNMENT
// ─────────────
// `copy_buffer_to_texture` and `copy_texture_to_buffer` need
// `bytes_per_row` to be a multiple of 256. A texel is 16 bytes, so a row of
// `w` texels is padded up to `align_to(16·w, 256)` bytes in the staging
// buffer and the padding is stripped again on readback.
//
// NEW RUST CONCEPTS
// ──────────────────
// - `bytemuck::cast_slice` — reinterpret `&[[f32; 4]]` as `&[u8]` without
//   copying. Both types are `Pod`, so the cast is checked at compile time.
// - `buffer.slice(..).map_async(MapMode::Read, cb)` — asynchronous map
//   request; we poll the device until the callback fires.

use wgpu::util::DeviceExt;

use crate::buffer::{ImageBuffer, MAX_CHANNELS};
use crate::error::FillError;
use crate::gpu::device::{GpuDevice, GpuError};
use crate::image::Image;

const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Bytes per `Rgba32Float` texel.
pub const TEXEL_BYTES: u32 = 16;

pub type Texel = [f32; 4];

/// An `Rgba32Float` texture usable as sampled input, storage output, and
/// copy source/destination.
pub struct GpuImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuImage {
    /// Allocate a zero-initialised texture.
    pub fn new(gpu: &GpuDevice, width: u32, height: u32, label: &str) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuImage { texture, view, width, height }
    }

    /// Allocate and fill from row-major texels.
    ///
    /// # Panics
    /// Panics if `texels.len() != width * height`.
    pub fn upload(gpu: &GpuDevice, texels: &[Texel], width: u32, height: u32, label: &str) -> Self {
        let img = Self::new(gpu, width, height, label);
        img.write(gpu, texels);
        img
    }

    /// Overwrite the whole texture through a staging buffer.
    ///
    /// # Panics
    /// Panics if `texels.len()` does not match the texture size.
    pub fn write(&self, gpu: &GpuDevice, texels: &[Texel]) {
        let staging = pack_rows(texels, self.width, self.height);
        let staging_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuImage::staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuImage::write") });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes(self.width)),
                    rows_per_image: Some(self.height),
                },
            },
            self.copy_target(),
            extent(self.width, self.height),
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Read the whole texture back. Blocks until the GPU is idle.
    ///
    /// # Errors
    /// `MapFailed` if the readback buffer could not be mapped.
    pub fn readback(&self, gpu: &GpuDevice) -> Result<Vec<Texel>, GpuError> {
        let row_bytes = padded_row_bytes(self.width);
        let readback_buf = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GpuImage::readback"),
            size: row_bytes as u64 * self.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuImage::readback") });
        encoder.copy_texture_to_buffer(
            self.copy_target(),
            wgpu::ImageCopyBuffer {
                buffer: &readback_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(row_bytes),
                    rows_per_image: Some(self.height),
                },
            },
            extent(self.width, self.height),
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback_buf.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below; a send error cannot happen.
            let _ = sender.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| GpuError::MapFailed(e.to_string()))?
            .map_err(|e| GpuError::MapFailed(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let out = unpack_rows(&mapped, self.width, self.height);
        drop(mapped);
        readback_buf.unmap();
        Ok(out)
    }

    /// Read back into a planar buffer with `channels` channels.
    pub fn readback_buffer(&self, gpu: &GpuDevice, channels: usize) -> Result<ImageBuffer, FillError> {
        let texels = self.readback(gpu)?;
        texels_to_buffer(&texels, self.width as usize, self.height as usize, channels)
    }

    /// Record a whole-texture copy into `dst`.
    ///
    /// # Panics
    /// Panics if the sizes differ.
    pub fn record_copy(&self, encoder: &mut wgpu::CommandEncoder, dst: &GpuImage) {
        assert_eq!((self.width, self.height), (dst.width, dst.height), "copy between mismatched textures");
        encoder.copy_texture_to_texture(self.copy_target(), dst.copy_target(), extent(self.width, self.height));
    }

    fn copy_target(&self) -> wgpu::ImageCopyTexture<'_> {
        wgpu::ImageCopyTexture {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d { width, height, depth_or_array_layers: 1 }
}

// ---------------------------------------------------------------------------
// Packing helpers (pure)
// ---------------------------------------------------------------------------

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Staging row pitch for a `width`-texel row.
#[inline]
pub(crate) fn padded_row_bytes(width: u32) -> u32 {
    align_to(width * TEXEL_BYTES, COPY_ALIGNMENT)
}

/// Tightly packed texels → staging bytes with 256-byte row pitch.
pub(crate) fn pack_rows(texels: &[Texel], width: u32, height: u32) -> Vec<u8> {
    assert_eq!(texels.len(), (width * height) as usize, "texel count does not match {width}×{height}");
    let pitch = padded_row_bytes(width) as usize;
    let row = (width * TEXEL_BYTES) as usize;
    let mut out = vec![0u8; pitch * height as usize];
    for (y, src) in texels.chunks_exact(width.max(1) as usize).enumerate() {
        out[y * pitch..y * pitch + row].copy_from_slice(bytemuck::cast_slice(src));
    }
    out
}

/// Staging bytes with 256-byte row pitch → tightly packed texels.
pub(crate) fn unpack_rows(bytes: &[u8], width: u32, height: u32) -> Vec<Texel> {
    let pitch = padded_row_bytes(width) as usize;
    let row = (width * TEXEL_BYTES) as usize;
    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height as usize {
        for t in bytes[y * pitch..y * pitch + row].chunks_exact(TEXEL_BYTES as usize) {
            let mut texel = [0.0f32; 4];
            for (c, b) in t.chunks_exact(4).enumerate() {
                texel[c] = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            out.push(texel);
        }
    }
    out
}

/// Planar buffer → RGBA texels, unused channels 0.
pub fn buffer_to_texels(buf: &ImageBuffer) -> Vec<Texel> {
    let mut out = Vec::with_capacity(buf.width() * buf.height());
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            out.push(buf.pixel(x, y));
        }
    }
    out
}

/// Single plane → texels with the value in `.r`.
pub fn plane_to_texels(plane: &Image<f32>) -> Vec<Texel> {
    plane.pixels().map(|(_, _, v)| [v, 0.0, 0.0, 0.0]).collect()
}

/// RGBA texels → planar buffer keeping the first `channels` channels.
///
/// # Errors
/// `UnsupportedChannels` outside 1..=4, `DimensionMismatch` if the texel
/// count is not `width * height`.
pub fn texels_to_buffer(
    texels: &[Texel],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<ImageBuffer, FillError> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(FillError::UnsupportedChannels(channels));
    }
    if texels.len() != width * height {
        return Err(FillError::DimensionMismatch {
            expected: (width, height),
            got: (texels.len() / height.max(1), height),
        });
    }
    let mut out = ImageBuffer::new(width, height, channels)?;
    for (i, t) in texels.iter().enumerate() {
        out.set_pixel(i % width, i / width, &t[..channels]);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::run_gpu_test_in_subprocess;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(0, 256), 0);
    }

    #[test]
    fn test_padded_row_bytes() {
        // 16 texels fill one 256-byte row exactly.
        assert_eq!(padded_row_bytes(16), 256);
        assert_eq!(padded_row_bytes(17), 512);
        assert_eq!(padded_row_bytes(1), 256);
        // 266 = padded 256² pyramid level 0.
        assert_eq!(padded_row_bytes(266), 4352);
    }

    #[test]
    fn test_pack_unpack_strips_padding() {
        let texels: Vec<Texel> = (0..6).map(|i| [i as f32, -(i as f32), 0.5, 1.0]).collect();
        let bytes = pack_rows(&texels, 3, 2);
        assert_eq!(bytes.len(), 512);
        // Row 1 starts at the 256-byte pitch, not right after row 0.
        assert_eq!(&bytes[256..260], &3.0f32.to_le_bytes());
        assert!(bytes[48..256].iter().all(|&b| b == 0));
        assert_eq!(unpack_rows(&bytes, 3, 2), texels);
    }

    #[test]
    fn test_buffer_texel_conversion_pads_channels() {
        let buf = ImageBuffer::filled(2, 2, &[0.25, 0.75]).unwrap();
        let texels = buffer_to_texels(&buf);
        assert_eq!(texels[3], [0.25, 0.75, 0.0, 0.0]);
        let back = texels_to_buffer(&texels, 2, 2, 2).unwrap();
        assert_eq!(back.max_abs_diff(&buf), 0.0);
        assert!(matches!(texels_to_buffer(&texels, 3, 2, 2), Err(FillError::DimensionMismatch { .. })));
        assert!(matches!(texels_to_buffer(&texels, 2, 2, 0), Err(FillError::UnsupportedChannels(0))));
    }

    #[test]
    fn test_plane_to_texels() {
        let plane = Image::from_vec(2, 1, vec![1.0f32, 0.0]);
        assert_eq!(plane_to_texels(&plane), vec![[1.0, 0.0, 0.0, 0.0], [0.0; 4]]);
    }

    // ---- GPU round trip (subprocess-isolated) ------------------------------

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_upload_readback_round_trip() {
        let gpu = GpuDevice::new().expect("need a GPU adapter");
        // 17 texels per row forces a padded pitch.
        let texels: Vec<Texel> = (0..17 * 5).map(|i| [i as f32, 0.5, -1.0, 1e-30]).collect();
        let img = GpuImage::upload(&gpu, &texels, 17, 5, "round trip");
        let back = img.readback(&gpu).expect("readback");
        assert_eq!(back, texels);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_upload_readback_round_trip() {
        let out = run_gpu_test_in_subprocess("gpu::image::tests::inner_upload_readback_round_trip");
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }
}
