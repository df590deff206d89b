// composite.rs — Painted color plus validity mask.
//
// The composite is the solver's input: `color` holds whatever the brush has
// written and `validity` marks which texels are known. A texel with
// validity >= SEED_THRESHOLD is a seed: a fixed boundary value that flood
// fill and the Poisson solve must return unchanged.
//
// The composite also tracks a dirty rectangle so a caller can tell which
// texels changed since it last looked.

use crate::buffer::ImageBuffer;
use crate::error::FillError;
use crate::image::Image;

/// Validity at or above this marks a seed.
pub const SEED_THRESHOLD: f32 = 0.5;

/// Inclusive-exclusive texel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl DirtyRect {
    fn point(x: usize, y: usize) -> Self {
        DirtyRect { x0: x, y0: y, x1: x + 1, y1: y + 1 }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.x0 = self.x0.min(x);
        self.y0 = self.y0.min(y);
        self.x1 = self.x1.max(x + 1);
        self.y1 = self.y1.max(y + 1);
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// Color + validity pair consumed by the fill stages.
#[derive(Clone, Debug)]
pub struct Composite {
    pub color: ImageBuffer,
    pub validity: Image<f32>,
    dirty: Option<DirtyRect>,
}

impl Composite {
    /// Empty composite: zero color, no seeds.
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self, FillError> {
        Ok(Composite {
            color: ImageBuffer::new(width, height, channels)?,
            validity: Image::new(width, height),
            dirty: None,
        })
    }

    /// Pair an existing color buffer with a validity mask.
    ///
    /// # Errors
    /// `DimensionMismatch` if the sizes differ.
    pub fn from_parts(color: ImageBuffer, validity: Image<f32>) -> Result<Self, FillError> {
        if (color.width(), color.height()) != validity.dims() {
            return Err(FillError::DimensionMismatch {
                expected: (color.width(), color.height()),
                got: validity.dims(),
            });
        }
        Ok(Composite { color, validity, dirty: None })
    }

    pub fn width(&self) -> usize {
        self.color.width()
    }

    pub fn height(&self) -> usize {
        self.color.height()
    }

    pub fn channels(&self) -> usize {
        self.color.channels()
    }

    #[inline]
    pub fn is_seed(&self, x: usize, y: usize) -> bool {
        self.validity.get(x, y) >= SEED_THRESHOLD
    }

    pub fn seed_count(&self) -> usize {
        self.validity
            .pixels()
            .filter(|&(_, _, v)| v >= SEED_THRESHOLD)
            .count()
    }

    /// True when nothing has been painted.
    pub fn is_empty(&self) -> bool {
        !self.validity.pixels().any(|(_, _, v)| v >= SEED_THRESHOLD)
    }

    /// Mark (x, y) as a seed with `color`.
    pub fn paint_texel(&mut self, x: usize, y: usize, color: &[f32]) {
        self.color.set_pixel(x, y, color);
        self.validity.set(x, y, 1.0);
        self.mark_dirty(x, y);
    }

    /// Clear the seed at (x, y); its color is reset to zero.
    pub fn erase_texel(&mut self, x: usize, y: usize) {
        self.color.set_pixel(x, y, &[0.0; crate::buffer::MAX_CHANNELS]);
        self.validity.set(x, y, 0.0);
        self.mark_dirty(x, y);
    }

    /// Drop every seed.
    pub fn clear(&mut self) {
        self.color.fill(&[]);
        self.validity.fill(0.0);
        self.dirty = None;
    }

    /// Texels changed since the last `take_dirty`.
    pub fn dirty(&self) -> Option<DirtyRect> {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> Option<DirtyRect> {
        self.dirty.take()
    }

    fn mark_dirty(&mut self, x: usize, y: usize) {
        match &mut self.dirty {
            Some(r) => r.include(x, y),
            None => self.dirty = Some(DirtyRect::point(x, y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let c = Composite::new(8, 8, 3).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.seed_count(), 0);
        assert_eq!(c.dirty(), None);
    }

    #[test]
    fn test_paint_and_erase() {
        let mut c = Composite::new(8, 8, 3).unwrap();
        c.paint_texel(2, 3, &[1.0, 0.5, 0.0]);
        c.paint_texel(5, 1, &[0.0, 0.0, 1.0]);
        assert!(c.is_seed(2, 3));
        assert_eq!(c.seed_count(), 2);
        assert_eq!(c.color.pixel(2, 3), [1.0, 0.5, 0.0, 0.0]);

        c.erase_texel(2, 3);
        assert!(!c.is_seed(2, 3));
        assert_eq!(c.seed_count(), 1);
        assert_eq!(c.color.pixel(2, 3), [0.0; 4]);
    }

    #[test]
    fn test_dirty_rect_grows_and_resets() {
        let mut c = Composite::new(16, 16, 1).unwrap();
        c.paint_texel(4, 9, &[1.0]);
        c.paint_texel(10, 2, &[1.0]);
        let r = c.take_dirty().unwrap();
        assert_eq!(r, DirtyRect { x0: 4, y0: 2, x1: 11, y1: 10 });
        assert_eq!((r.width(), r.height()), (7, 8));
        assert_eq!(c.dirty(), None);
    }

    #[test]
    fn test_threshold() {
        let color = ImageBuffer::new(2, 1, 1).unwrap();
        let validity = Image::from_vec(2, 1, vec![0.49f32, 0.5]);
        let c = Composite::from_parts(color, validity).unwrap();
        assert!(!c.is_seed(0, 0));
        assert!(c.is_seed(1, 0));
    }

    #[test]
    fn test_from_parts_mismatch() {
        let color = ImageBuffer::new(4, 4, 3).unwrap();
        let validity = Image::new(4, 5);
        assert!(matches!(
            Composite::from_parts(color, validity),
            Err(FillError::DimensionMismatch { .. })
        ));
    }
}
