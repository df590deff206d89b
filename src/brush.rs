// brush.rs — Brush stamps written into a composite.
//
// Stroke points arrive in normalized UV space ([0, 1]², v pointing down the
// texture). A stamp covers every texel whose center lies inside the brush
// shape; the texel under the stamp center is always covered, so a brush
// smaller than one texel still leaves a mark.
//
// Drawing sets texels as seeds with the brush color. Erasing clears them
// back to unknown.

use crate::composite::Composite;

/// Footprint of one stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushShape {
    /// `dx² + dy² ≤ r²`
    #[default]
    Circle,
    /// `max(|dx|, |dy|) ≤ r`
    Square,
    /// `|dx| + |dy| ≤ r`
    Diamond,
}

impl BrushShape {
    pub fn label(&self) -> &'static str {
        match self {
            BrushShape::Circle => "Circle",
            BrushShape::Square => "Square",
            BrushShape::Diamond => "Diamond",
        }
    }

    pub fn all() -> &'static [BrushShape] {
        &[BrushShape::Circle, BrushShape::Square, BrushShape::Diamond]
    }

    #[inline]
    fn contains(&self, dx: f32, dy: f32, radius: f32) -> bool {
        match self {
            BrushShape::Circle => dx * dx + dy * dy <= radius * radius,
            BrushShape::Square => dx.abs().max(dy.abs()) <= radius,
            BrushShape::Diamond => dx.abs() + dy.abs() <= radius,
        }
    }
}

/// Whether a stamp adds or removes seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushMode {
    #[default]
    Draw,
    Erase,
}

impl BrushMode {
    pub fn label(&self) -> &'static str {
        match self {
            BrushMode::Draw => "Draw",
            BrushMode::Erase => "Erase",
        }
    }
}

/// A point on the target texture in normalized UV coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokePoint {
    pub u: f32,
    pub v: f32,
}

impl StrokePoint {
    pub fn new(u: f32, v: f32) -> Self {
        StrokePoint { u, v }
    }

    /// Position in texel space for a `width × height` texture. UV is
    /// clamped to [0, 1] first.
    pub fn to_pixel(&self, width: usize, height: usize) -> (f32, f32) {
        (self.u.clamp(0.0, 1.0) * width as f32, self.v.clamp(0.0, 1.0) * height as f32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Brush {
    /// Radius in texels.
    pub radius: f32,
    pub shape: BrushShape,
    pub mode: BrushMode,
    /// Paint color; entries past the composite's channel count are ignored.
    pub color: [f32; 4],
}

impl Default for Brush {
    fn default() -> Self {
        Brush {
            radius: 4.0,
            shape: BrushShape::Circle,
            mode: BrushMode::Draw,
            color: [1.0; 4],
        }
    }
}

impl Brush {
    /// Distance between stamps along a segment: `max(radius / 2, 1)`.
    pub fn spacing(&self) -> f32 {
        (self.radius * 0.5).max(1.0)
    }

    /// Apply one stamp centered at `center` (texel space). Returns the
    /// number of texels touched.
    pub fn stamp(&self, composite: &mut Composite, center: (f32, f32)) -> usize {
        let (w, h) = (composite.width(), composite.height());
        if w == 0 || h == 0 {
            return 0;
        }
        let r = self.radius.max(0.0);
        let (cx, cy) = center;
        let x0 = (cx - r - 0.5).floor().max(0.0) as usize;
        let y0 = (cy - r - 0.5).floor().max(0.0) as usize;
        let x1 = ((cx + r + 0.5).ceil().max(0.0) as usize).min(w);
        let y1 = ((cy + r + 0.5).ceil().max(0.0) as usize).min(h);
        let hit = (
            (cx.floor().max(0.0) as usize).min(w - 1),
            (cy.floor().max(0.0) as usize).min(h - 1),
        );

        let mut touched = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if (x, y) != hit && !self.shape.contains(dx, dy, r) {
                    continue;
                }
                self.apply(composite, x, y);
                touched += 1;
            }
        }
        if !(x0..x1).contains(&hit.0) || !(y0..y1).contains(&hit.1) {
            self.apply(composite, hit.0, hit.1);
            touched += 1;
        }
        touched
    }

    /// Stamp along `from → to` at [`Brush::spacing`], both ends included.
    /// Returns the number of stamps.
    pub fn stamp_segment(&self, composite: &mut Composite, from: (f32, f32), to: (f32, f32)) -> usize {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        let steps = (len / self.spacing()).ceil() as usize;
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f32 / steps as f32 };
            self.stamp(composite, (from.0 + dx * t, from.1 + dy * t));
        }
        steps + 1
    }

    fn apply(&self, composite: &mut Composite, x: usize, y: usize) {
        match self.mode {
            BrushMode::Draw => composite.paint_texel(x, y, &self.color),
            BrushMode::Erase => composite.erase_texel(x, y),
        }
    }
}
