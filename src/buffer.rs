// buffer.rs — Multi-channel float image buffer.
//
// An `ImageBuffer` is what every fill stage reads and writes: 1 to 4 float
// channels of the same size. Storage is planar (one `Image<f32>` per
// channel), which keeps the separable convolutions in `convolution.rs`
// single-channel. Pyramid weight planes are separate `Image<f32>`s and do
// not count against the channel limit.
//
// On the GPU the same buffer lives in one Rgba32Float texture; unused
// channels are zero.

use crate::error::FillError;
use crate::image::Image;

/// Maximum channels per buffer (RGBA).
pub const MAX_CHANNELS: usize = 4;

/// Identity of a buffer: two buffers with equal formats are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferFormat {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl BufferFormat {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        BufferFormat { width, height, channels }
    }

    /// Return an error unless `other` has the same size and channel count.
    pub fn check(&self, other: &BufferFormat) -> Result<(), FillError> {
        if (self.width, self.height) != (other.width, other.height) {
            return Err(FillError::DimensionMismatch {
                expected: (self.width, self.height),
                got: (other.width, other.height),
            });
        }
        if self.channels != other.channels {
            return Err(FillError::ChannelMismatch {
                expected: self.channels,
                got: other.channels,
            });
        }
        Ok(())
    }
}

/// A planar float image with 1..=4 channels.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    planes: Vec<Image<f32>>,
    width: usize,
    height: usize,
}

impl ImageBuffer {
    /// Zero-filled buffer.
    ///
    /// # Errors
    /// `UnsupportedChannels` unless `1 <= channels <= 4`.
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self, FillError> {
        check_channels(channels)?;
        Ok(ImageBuffer {
            planes: (0..channels).map(|_| Image::new(width, height)).collect(),
            width,
            height,
        })
    }

    /// Buffer with every texel set to `value` (one entry per channel).
    pub fn filled(width: usize, height: usize, value: &[f32]) -> Result<Self, FillError> {
        check_channels(value.len())?;
        Ok(ImageBuffer {
            planes: value.iter().map(|&v| Image::filled(width, height, v)).collect(),
            width,
            height,
        })
    }

    /// Assemble a buffer from existing planes.
    ///
    /// # Errors
    /// `UnsupportedChannels` for 0 or more than 4 planes,
    /// `DimensionMismatch` if the planes differ in size.
    pub fn from_planes(planes: Vec<Image<f32>>) -> Result<Self, FillError> {
        check_channels(planes.len())?;
        let (width, height) = planes[0].dims();
        for p in &planes[1..] {
            if p.dims() != (width, height) {
                return Err(FillError::DimensionMismatch {
                    expected: (width, height),
                    got: p.dims(),
                });
            }
        }
        Ok(ImageBuffer { planes, width, height })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn format(&self) -> BufferFormat {
        BufferFormat::new(self.width, self.height, self.planes.len())
    }

    #[inline]
    pub fn plane(&self, c: usize) -> &Image<f32> {
        &self.planes[c]
    }

    #[inline]
    pub fn plane_mut(&mut self, c: usize) -> &mut Image<f32> {
        &mut self.planes[c]
    }

    pub fn planes(&self) -> &[Image<f32>] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Image<f32>] {
        &mut self.planes
    }

    pub fn into_planes(self) -> Vec<Image<f32>> {
        self.planes
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.planes[c].get(x, y)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, v: f32) {
        self.planes[c].set(x, y, v);
    }

    /// All channels of one texel, padded with zeros to four.
    pub fn pixel(&self, x: usize, y: usize) -> [f32; MAX_CHANNELS] {
        let mut out = [0.0; MAX_CHANNELS];
        for (c, p) in self.planes.iter().enumerate() {
            out[c] = p.get(x, y);
        }
        out
    }

    /// Write the first `channels()` entries of `value`.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: &[f32]) {
        for (p, &v) in self.planes.iter_mut().zip(value) {
            p.set(x, y, v);
        }
    }

    /// Set every texel to `value` (extra entries ignored, missing ones 0).
    pub fn fill(&mut self, value: &[f32]) {
        for (c, p) in self.planes.iter_mut().enumerate() {
            p.fill(value.get(c).copied().unwrap_or(0.0));
        }
    }

    /// Overwrite this buffer with `src`.
    ///
    /// # Errors
    /// Format mismatch.
    pub fn copy_from(&mut self, src: &ImageBuffer) -> Result<(), FillError> {
        self.format().check(&src.format())?;
        for (d, s) in self.planes.iter_mut().zip(&src.planes) {
            d.clone_from(s);
        }
        Ok(())
    }

    /// Clamp all channels to [0, 1].
    pub fn clamp01(&mut self) {
        for p in &mut self.planes {
            for v in p.as_mut_slice() {
                *v = v.clamp(0.0, 1.0);
            }
        }
    }

    /// Copy a `w × h` region into a new buffer.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> ImageBuffer {
        ImageBuffer {
            planes: self.planes.iter().map(|p| p.crop(x, y, w, h)).collect(),
            width: w,
            height: h,
        }
    }

    /// Largest per-texel difference over all channels.
    ///
    /// # Panics
    /// Panics on format mismatch.
    pub fn max_abs_diff(&self, other: &ImageBuffer) -> f32 {
        assert_eq!(self.format(), other.format(), "max_abs_diff on mismatched buffers");
        self.planes
            .iter()
            .zip(&other.planes)
            .map(|(a, b)| a.max_abs_diff(b))
            .fold(0.0, f32::max)
    }
}

fn check_channels(channels: usize) -> Result<(), FillError> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(FillError::UnsupportedChannels(channels));
    }
    Ok(())
}
