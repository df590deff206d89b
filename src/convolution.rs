// convolution.rs — Separable 1D convolution and the 5-point Laplacian.
//
// Every filter in the convolution pyramid (h1, h2, g) is separable, so a 2D
// pass is a row pass followed by a column pass: O(2k) instead of O(k²) per
// texel.
//
// BORDER HANDLING
//   Border::Zero  — texels outside the image read as 0. The pyramid uses
//                   this: its level 0 is already zero-padded, and treating
//                   the outside as more zeros keeps every level linear in
//                   the input (needed for the weight-channel ratio trick).
//   Border::Clamp — replicate the edge texel. Used for the Laplacian of the
//                   flooded color field, where an edge should look flat.
//
// Interior texels (kernel fully inside) take the unchecked path; only the
// `half` texels at each end go through the border rule.

use crate::image::{Image, Pixel};

/// Out-of-bounds addressing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    Clamp,
    Zero,
}

#[inline]
fn check_kernel(kernel: &[f32]) {
    assert!(!kernel.is_empty(), "kernel must not be empty");
    assert!(kernel.len() % 2 == 1, "kernel length must be odd (got {})", kernel.len());
}

/// Convolve each row of `src` with `kernel` into `dst` (resized to match).
pub fn convolve_rows_into<T: Pixel>(
    src: &Image<T>,
    kernel: &[f32],
    border: Border,
    dst: &mut Image<f32>,
) {
    check_kernel(kernel);
    let w = src.width();
    let h = src.height();
    let half = kernel.len() / 2;
    dst.clear_resize(w, h);
    if w == 0 {
        return;
    }

    let edge = |x: usize, y: usize| -> f32 {
        let mut acc = 0.0f32;
        for (ki, &kv) in kernel.iter().enumerate() {
            let sx = x as isize + ki as isize - half as isize;
            let v = match border {
                Border::Clamp => src.get_clamped(sx, y as isize).to_f32(),
                Border::Zero => src.get_or_default(sx, y as isize).to_f32(),
            };
            acc += v * kv;
        }
        acc
    };

    for y in 0..h {
        let left_end = half.min(w);
        for x in 0..left_end {
            dst.set(x, y, edge(x, y));
        }

        if w > 2 * half {
            for x in half..(w - half) {
                let mut acc = 0.0f32;
                // SAFETY: x - half >= 0 and x + half < w.
                unsafe {
                    for (ki, &kv) in kernel.iter().enumerate() {
                        acc += src.get_unchecked(x + ki - half, y).to_f32() * kv;
                    }
                    dst.set_unchecked(x, y, acc);
                }
            }
        }

        let right_start = if w > 2 * half { w - half } else { left_end };
        for x in right_start..w {
            dst.set(x, y, edge(x, y));
        }
    }
}

/// Convolve each column of `src` with `kernel` into `dst` (resized to match).
pub fn convolve_cols_into(
    src: &Image<f32>,
    kernel: &[f32],
    border: Border,
    dst: &mut Image<f32>,
) {
    check_kernel(kernel);
    let w = src.width();
    let h = src.height();
    let half = kernel.len() / 2;
    dst.clear_resize(w, h);
    if h == 0 {
        return;
    }

    let edge = |x: usize, y: usize| -> f32 {
        let mut acc = 0.0f32;
        for (ki, &kv) in kernel.iter().enumerate() {
            let sy = y as isize + ki as isize - half as isize;
            let v = match border {
                Border::Clamp => src.get_clamped(x as isize, sy),
                Border::Zero => src.get_or_default(x as isize, sy),
            };
            acc += v * kv;
        }
        acc
    };

    let top_end = half.min(h);
    for y in 0..top_end {
        for x in 0..w {
            dst.set(x, y, edge(x, y));
        }
    }

    if h > 2 * half {
        for y in half..(h - half) {
            for x in 0..w {
                let mut acc = 0.0f32;
                // SAFETY: y - half >= 0 and y + half < h.
                unsafe {
                    for (ki, &kv) in kernel.iter().enumerate() {
                        acc += src.get_unchecked(x, y + ki - half) * kv;
                    }
                    dst.set_unchecked(x, y, acc);
                }
            }
        }
    }

    let bottom_start = if h > 2 * half { h - half } else { top_end };
    for y in bottom_start..h {
        for x in 0..w {
            dst.set(x, y, edge(x, y));
        }
    }
}

/// Row pass into a fresh image.
pub fn convolve_rows<T: Pixel>(src: &Image<T>, kernel: &[f32], border: Border) -> Image<f32> {
    let mut dst = Image::new(0, 0);
    convolve_rows_into(src, kernel, border, &mut dst);
    dst
}

/// Column pass into a fresh image.
pub fn convolve_cols(src: &Image<f32>, kernel: &[f32], border: Border) -> Image<f32> {
    let mut dst = Image::new(0, 0);
    convolve_cols_into(src, kernel, border, &mut dst);
    dst
}

/// Full separable 2D convolution: rows with `kernel_row`, then columns
/// with `kernel_col`.
///
/// # Panics
/// Panics if either kernel is empty or has even length.
pub fn convolve_separable<T: Pixel>(
    src: &Image<T>,
    kernel_row: &[f32],
    kernel_col: &[f32],
    border: Border,
) -> Image<f32> {
    let intermediate = convolve_rows(src, kernel_row, border);
    convolve_cols(&intermediate, kernel_col, border)
}

/// Reusable buffers for `convolve_separable_into`.
///
/// The pyramid runs dozens of separable passes per fill; keeping the
/// intermediate and output allocations alive avoids re-faulting pages.
pub struct ConvolveScratch {
    tmp: Image<f32>,
    pub output: Image<f32>,
}

impl ConvolveScratch {
    pub fn new(width: usize, height: usize) -> Self {
        ConvolveScratch {
            tmp: Image::new(width, height),
            output: Image::new(width, height),
        }
    }
}

impl Default for ConvolveScratch {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Separable convolution into `scratch.output`.
pub fn convolve_separable_into(
    src: &Image<f32>,
    kernel_row: &[f32],
    kernel_col: &[f32],
    border: Border,
    scratch: &mut ConvolveScratch,
) {
    convolve_rows_into(src, kernel_row, border, &mut scratch.tmp);
    convolve_cols_into(&scratch.tmp, kernel_col, border, &mut scratch.output);
}

/// Negated 5-point Laplacian, `4·c − (n + s + e + w)`, clamp-to-edge.
///
/// A flat or linear field gives 0 in the interior. The sign makes a bump
/// positive, which is what the integration pyramid expects.
pub fn neg_laplacian(src: &Image<f32>) -> Image<f32> {
    let w = src.width();
    let h = src.height();
    let mut dst = Image::new(w, h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let c = src.get_clamped(x, y);
            let n = src.get_clamped(x, y - 1);
            let s = src.get_clamped(x, y + 1);
            let e = src.get_clamped(x + 1, y);
            let wv = src.get_clamped(x - 1, y);
            dst.set(x as usize, y as usize, 4.0 * c - (n + s + e + wv));
        }
    }
    dst
}
