// tests/test_image.rs — Integration tests for Image<T>, ImageBuffer, and conversions.
//
// These run with `cargo test --test test_image` against the public API only.

use seamfill::buffer::{BufferFormat, ImageBuffer, MAX_CHANNELS};
use seamfill::convert;
use seamfill::image::Image;
use seamfill::FillError;

// ===== Image<T> =====

#[test]
fn image_new_zero_initialized() {
    let img: Image<f32> = Image::new(100, 50);
    assert_eq!(img.dims(), (100, 50));
    assert_eq!(img.get(0, 0), 0.0);
    assert_eq!(img.get(99, 49), 0.0);
}

#[test]
fn image_borders() {
    let img = Image::from_vec(3, 2, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(img.get_clamped(-4, 0), 1.0);
    assert_eq!(img.get_clamped(10, 10), 6.0);
    assert_eq!(img.get_or_default(-1, 0), 0.0);
    assert_eq!(img.get_or_default(1, 1), 5.0);
    assert!(img.in_bounds(2, 1));
    assert!(!img.in_bounds(3, 1));
}

#[test]
fn image_crop_then_blit_restores() {
    let mut img: Image<f32> = Image::new(8, 8);
    for (i, v) in img.as_mut_slice().iter_mut().enumerate() {
        *v = i as f32;
    }
    let patch = img.crop(2, 3, 4, 2);
    assert_eq!(patch.get(0, 0), img.get(2, 3));

    let mut canvas: Image<f32> = Image::new(8, 8);
    canvas.blit(&patch, 2, 3);
    assert_eq!(canvas.get(5, 4), img.get(5, 4));
    assert_eq!(canvas.get(1, 3), 0.0);
}

// ===== ImageBuffer =====

#[test]
fn buffer_channel_limits() {
    for ch in 1..=MAX_CHANNELS {
        assert!(ImageBuffer::new(4, 4, ch).is_ok());
    }
    assert!(matches!(ImageBuffer::new(4, 4, 0), Err(FillError::UnsupportedChannels(0))));
    assert!(matches!(ImageBuffer::new(4, 4, 5), Err(FillError::UnsupportedChannels(5))));
}

#[test]
fn buffer_pixel_access_and_format() {
    let mut buf = ImageBuffer::new(5, 3, 3).unwrap();
    buf.set_pixel(4, 2, &[0.1, 0.2, 0.3]);
    assert_eq!(buf.pixel(4, 2), [0.1, 0.2, 0.3, 0.0]);
    assert_eq!(buf.format(), BufferFormat::new(5, 3, 3));
    assert!(buf.format().check(&BufferFormat::new(5, 3, 4)).is_err());
}

#[test]
fn buffer_clamp_and_diff() {
    let mut a = ImageBuffer::filled(2, 2, &[1.5, -0.5]).unwrap();
    a.clamp01();
    assert_eq!(a.pixel(1, 1), [1.0, 0.0, 0.0, 0.0]);
    let b = ImageBuffer::filled(2, 2, &[0.75, 0.0]).unwrap();
    assert_eq!(a.max_abs_diff(&b), 0.25);
}

// ===== Conversions =====

#[test]
fn rgba8_round_trip_is_lossless() {
    let data: Vec<u8> = (0..4 * 6 * 4).map(|i| (i * 37 % 256) as u8).collect();
    let buf = convert::buffer_from_rgba8(&data, 6, 4).unwrap();
    assert_eq!(convert::buffer_to_rgba8(&buf), data);
}

#[test]
fn interleaved_rgb_to_rgba_adds_opaque_alpha() {
    let rgb = [10u8, 20, 30, 40, 50, 60];
    let buf = convert::buffer_from_interleaved(&rgb, 2, 1, 3).unwrap();
    assert_eq!(convert::buffer_to_rgba8(&buf), vec![10, 20, 30, 255, 40, 50, 60, 255]);
    assert_eq!(convert::buffer_to_interleaved(&buf), rgb.to_vec());
}

#[test]
fn conversion_rejects_wrong_length() {
    assert!(matches!(
        convert::buffer_from_rgba8(&[0u8; 15], 2, 2),
        Err(FillError::DimensionMismatch { .. })
    ));
}
