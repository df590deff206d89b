// convert.rs — Texture I/O conversions.
//
// Targets arrive and leave as interleaved 8-bit texels (RGBA8 or fewer
// channels); the fill pipeline works on planar f32 in [0, 1]. The
// functions here move between the two:
//
//   u8 42  → f32 0.1647…   (v / 255)
//   f32 x  → u8            (clamp to [0, 1], · 255, round)

use crate::buffer::ImageBuffer;
use crate::error::FillError;

/// Interleaved 8-bit texels → planar f32 buffer.
///
/// # Errors
/// `UnsupportedChannels` for 0 or more than 4 channels,
/// `DimensionMismatch` if `data.len() != width * height * channels`.
pub fn buffer_from_interleaved(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<ImageBuffer, FillError> {
    let mut out = ImageBuffer::new(width, height, channels)?;
    if data.len() != width * height * channels {
        return Err(FillError::DimensionMismatch {
            expected: (width * channels, height),
            got: (data.len() / height.max(1), height),
        });
    }
    for (i, px) in data.chunks_exact(channels).enumerate() {
        let (x, y) = (i % width, i / width);
        for (c, &v) in px.iter().enumerate() {
            out.set(x, y, c, v as f32 / 255.0);
        }
    }
    Ok(out)
}

/// RGBA8 → 4-channel buffer.
pub fn buffer_from_rgba8(data: &[u8], width: usize, height: usize) -> Result<ImageBuffer, FillError> {
    buffer_from_interleaved(data, width, height, 4)
}

/// Planar buffer → interleaved 8-bit texels with the buffer's channel count.
pub fn buffer_to_interleaved(buf: &ImageBuffer) -> Vec<u8> {
    let ch = buf.channels();
    let mut out = Vec::with_capacity(buf.width() * buf.height() * ch);
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            for c in 0..ch {
                out.push(unit_to_u8(buf.get(x, y, c)));
            }
        }
    }
    out
}

/// Planar buffer → RGBA8. Missing channels become 0, except alpha which
/// becomes 255.
pub fn buffer_to_rgba8(buf: &ImageBuffer) -> Vec<u8> {
    let ch = buf.channels();
    let mut out = Vec::with_capacity(buf.width() * buf.height() * 4);
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            let p = buf.pixel(x, y);
            for (c, &v) in p.iter().enumerate() {
                out.push(if c < ch { unit_to_u8(v) } else if c == 3 { 255 } else { 0 });
            }
        }
    }
    out
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_to_buffer() {
        let data = [255u8, 0, 51, 255, 0, 102, 0, 0];
        let buf = buffer_from_rgba8(&data, 2, 1).unwrap();
        assert_eq!(buf.channels(), 4);
        assert_eq!(buf.pixel(0, 0), [1.0, 0.0, 0.2, 1.0]);
        assert!((buf.get(1, 0, 1) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_buffer_to_rgba8_pads_alpha() {
        let buf = ImageBuffer::filled(1, 1, &[1.0, 0.5, -0.2]).unwrap();
        assert_eq!(buffer_to_rgba8(&buf), vec![255, 128, 0, 255]);
        assert_eq!(buffer_to_interleaved(&buf), vec![255, 128, 0]);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            buffer_from_interleaved(&[0u8; 10], 2, 2, 3),
            Err(FillError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            buffer_from_interleaved(&[], 0, 0, 5),
            Err(FillError::UnsupportedChannels(5))
        ));
    }
}
