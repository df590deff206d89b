// image.rs — Runtime-sized single-plane image, generic over texel type.
//
// Every buffer in the fill pipeline is built out of this container:
//
//   Image<f32>  one channel of a color buffer, validity masks, distances
//   Image<u32>  nearest-seed indices in the jump flood ping/pong slots
//
// Layout is tightly packed row-major: texel (x, y) lives at `y·width + x`.
// GPU row padding is stripped at readback, so no image carries a stride.
//
// NEW RUST CONCEPTS:
// - A trait with associated constructors (`Pixel::from_f32`) lets the
//   same container hold floats and integer indices.
// - `impl Iterator` return types for texel walks without boxing.

use std::fmt;

// ---------------------------------------------------------------------------
// Pixel
// ---------------------------------------------------------------------------

/// Types that can be stored as texels in an [`Image`].
///
/// `to_f32` / `from_f32` are raw conversions (u8 200 → 200.0). Normalized
/// [0, 1] mapping lives in `convert`.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for u32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        // Saturating: NaN maps to 0, +inf to u32::MAX.
        v.round() as u32
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D image with runtime dimensions.
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Clone for Image<T> {
    fn clone(&self) -> Self {
        Image {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Reuses the existing allocation when capacities allow.
        self.data.clone_from(&source.data);
        self.width = source.width;
        self.height = source.height;
    }
}

impl<T: Pixel> Image<T> {
    /// Zero-initialized image.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    /// Image with every texel set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap a tightly packed texel vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image {
            data,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn in_bounds(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// Texel with clamp-to-edge addressing.
    ///
    /// # Panics
    /// Panics on an empty image.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> T {
        assert!(self.width > 0 && self.height > 0, "get_clamped on an empty image");
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Texel, or `T::default()` outside the image (zero border).
    #[inline]
    pub fn get_or_default(&self, x: isize, y: isize) -> T {
        if self.in_bounds(x, y) {
            self.data[y as usize * self.width + x as usize]
        } else {
            T::default()
        }
    }

    /// # Safety
    /// Caller must guarantee x < width and y < height.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width && y < self.height,
            "get_unchecked({x},{y}) out of bounds for {}x{}", self.width, self.height);
        *self.data.get_unchecked(y * self.width + x)
    }

    /// # Safety
    /// Caller must guarantee x < width and y < height.
    #[inline(always)]
    pub unsafe fn set_unchecked(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width && y < self.height);
        *self.data.get_unchecked_mut(y * self.width + x) = value;
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        *self.get_mut(x, y) = value;
    }

    /// Borrow row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Iterate texels as `(x, y, value)`, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| (x, y, self.data[y * self.width + x]))
        })
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Element count, `width · height`.
    pub fn buffer_len(&self) -> usize {
        self.data.len()
    }

    /// Set every texel to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Resize to `width × height` and zero the contents, keeping the
    /// allocation when it is large enough.
    pub fn clear_resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height, T::default());
    }

    /// Copy the `w × h` region starting at (x, y) into a new image.
    ///
    /// # Panics
    /// Panics if the region leaves the image.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> Image<T> {
        assert!(
            x + w <= self.width && y + h <= self.height,
            "crop region ({x},{y},{w},{h}) exceeds image bounds ({},{})",
            self.width,
            self.height,
        );
        let mut out = Vec::with_capacity(w * h);
        for row in y..y + h {
            let start = row * self.width + x;
            out.extend_from_slice(&self.data[start..start + w]);
        }
        Image::from_vec(w, h, out)
    }

    /// Write `src` into this image with its top-left corner at (x, y).
    ///
    /// # Panics
    /// Panics if `src` does not fit.
    pub fn blit(&mut self, src: &Image<T>, x: usize, y: usize) {
        assert!(
            x + src.width <= self.width && y + src.height <= self.height,
            "blit of {}×{} at ({x},{y}) exceeds image bounds ({},{})",
            src.width,
            src.height,
            self.width,
            self.height,
        );
        for row in 0..src.height {
            let dst = (y + row) * self.width + x;
            self.data[dst..dst + src.width].copy_from_slice(src.row(row));
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl Image<f32> {
    /// Largest absolute per-texel difference.
    ///
    /// # Panics
    /// Panics if the dimensions differ.
    pub fn max_abs_diff(&self, other: &Image<f32>) -> f32 {
        assert_eq!(self.dims(), other.dims(), "max_abs_diff on mismatched images");
        let mut max = 0.0f32;
        for y in 0..self.height {
            for (a, b) in self.row(y).iter().zip(other.row(y)) {
                max = max.max((a - b).abs());
            }
        }
        max
    }
}

impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let img: Image<f32> = Image::new(10, 5);
        assert_eq!(img.dims(), (10, 5));
        assert_eq!(img.buffer_len(), 50);
        assert!(img.pixels().all(|(_, _, v)| v == 0.0));
    }

    #[test]
    fn test_filled_u32() {
        let img = Image::filled(3, 2, u32::MAX);
        assert!(img.as_slice().iter().all(|&v| v == u32::MAX));
    }

    #[test]
    fn test_set_get() {
        let mut img: Image<u8> = Image::new(4, 3);
        img.set(0, 0, 10);
        img.set(3, 2, 255);
        assert_eq!(img.get(0, 0), 10);
        assert_eq!(img.get(3, 2), 255);
        assert_eq!(img.get(1, 1), 0);
    }

    #[test]
    fn test_clamped_and_zero_border() {
        let img = Image::from_vec(2, 2, vec![1.0f32, 2.0, 3.0, 4.0]);
        assert_eq!(img.get_clamped(-3, 0), 1.0);
        assert_eq!(img.get_clamped(5, 5), 4.0);
        assert_eq!(img.get_or_default(-1, 0), 0.0);
        assert_eq!(img.get_or_default(1, 1), 4.0);
        assert_eq!(img.get_or_default(2, 0), 0.0);
    }

    #[test]
    fn test_crop_and_blit() {
        let data: Vec<u8> = (0..16).collect();
        let img = Image::from_vec(4, 4, data);
        let c = img.crop(1, 1, 2, 2);
        assert_eq!(c.as_slice(), &[5, 6, 9, 10]);

        let mut dst: Image<u8> = Image::new(4, 4);
        dst.blit(&c, 2, 2);
        assert_eq!(dst.get(2, 2), 5);
        assert_eq!(dst.get(3, 3), 10);
        assert_eq!(dst.get(1, 1), 0);
    }

    #[test]
    fn test_clear_resize_zeroes() {
        let mut img = Image::filled(4, 4, 7.0f32);
        img.clear_resize(2, 3);
        assert_eq!(img.dims(), (2, 3));
        assert_eq!(img.buffer_len(), 6);
        assert!(img.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Image::from_vec(2, 1, vec![0.0f32, 1.0]);
        let b = Image::from_vec(2, 1, vec![0.25f32, 0.5]);
        assert_eq!(a.max_abs_diff(&b), 0.5);
    }

    #[test]
    fn test_u32_from_f32_saturates() {
        assert_eq!(u32::from_f32(f32::INFINITY), u32::MAX);
        assert_eq!(u32::from_f32(-4.0), 0);
        assert_eq!(u32::from_f32(2.6), 3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds() {
        let img: Image<u8> = Image::new(4, 4);
        img.get(4, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds image bounds")]
    fn test_crop_out_of_bounds() {
        let img: Image<u8> = Image::new(4, 4);
        let _ = img.crop(3, 0, 2, 1);
    }

    #[test]
    fn test_index_mut_write() {
        let mut img: Image<u32> = Image::new(4, 3);
        img[(1, 2)] = 42;
        assert_eq!(img[(1, 2)], 42);
        assert_eq!(img.get(1, 2), 42);
    }
}
