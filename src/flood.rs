// flood.rs — Jump flood fill (CPU reference).
//
// Propagates every seed's identity to the texels around it so that each
// texel ends up holding (approximately) its nearest seed. The result gives
// the Poisson solve a full-coverage fallback color and the Laplacian
// integrator a color field with no holes.
//
// Each slot texel stores the linear index of its current best seed
// (`y * width + x`), or NO_SEED. One pass with offset k:
//
//   for each texel p:
//     best = read[p]
//     for each of the 8 texels q = p ± k (the pass order is fixed):
//       if read[q] is closer to p than best:  best = read[q]
//     write[p] = best
//
// Offsets follow the standard schedule 2^(n−1), …, 2, 1. With
// n = ceil(log2(max(w, h))) every texel is reached.
//
// Invariants that hold after every pass:
//   - a seed's candidate is itself at distance 0, so seeds never change
//   - a texel only switches to a strictly closer candidate, so its
//     distance never increases
//
// Jump flooding is approximate: a texel can end up with a seed that is
// not the true nearest one. That is accepted here.

use crate::buffer::ImageBuffer;
use crate::composite::Composite;
use crate::error::FillError;
use crate::image::Image;

/// Slot value for "no seed found yet".
pub const NO_SEED: u32 = u32::MAX;

/// The eight neighbour directions visited by each pass, in order.
pub(crate) const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1,  0),          (1,  0),
    (-1,  1), (0,  1), (1,  1),
];

// ---------------------------------------------------------------------------
// PingPong
// ---------------------------------------------------------------------------

/// Two buffers of the same shape and an "active" index.
///
/// `split` hands out the read side and the write side as disjoint borrows,
/// so one pass can never read what it is writing. `swap` only flips the
/// index.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    active: usize,
}

impl<T> PingPong<T> {
    pub fn new(ping: T, pong: T) -> Self {
        PingPong { buffers: [ping, pong], active: 0 }
    }

    /// The buffer the next pass reads.
    pub fn read(&self) -> &T {
        &self.buffers[self.active]
    }

    /// `(read, write)` for one pass.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.buffers;
        if self.active == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn swap(&mut self) {
        self.active ^= 1;
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Both buffers, for resetting. Also resets `active` to 0.
    pub fn reset(&mut self) -> &mut [T; 2] {
        self.active = 0;
        &mut self.buffers
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// `ceil(log2(max(w, h)))`, at least 1.
pub fn default_iterations(width: usize, height: usize) -> usize {
    let m = width.max(height).max(2);
    (usize::BITS - (m - 1).leading_zeros()) as usize
}

/// Jump offsets for `iterations` passes: 2^(n−1), …, 2, 1.
pub fn schedule(iterations: usize) -> Vec<usize> {
    (0..iterations).rev().map(|i| 1usize << i.min(usize::BITS as usize - 1)).collect()
}

// ---------------------------------------------------------------------------
// FloodResult
// ---------------------------------------------------------------------------

/// Output of a flood fill.
#[derive(Clone, Debug)]
pub struct FloodResult {
    /// Color of each texel's nearest seed; zero where no seed was reached.
    pub color: ImageBuffer,
    /// Euclidean distance (texels) to that seed; `f32::INFINITY` if none.
    pub distance: Image<f32>,
    /// Linear index of the seed, or `NO_SEED`.
    pub nearest: Image<u32>,
}

impl FloodResult {
    /// True when every texel found a seed.
    pub fn is_complete(&self) -> bool {
        self.nearest.as_slice().iter().all(|&s| s != NO_SEED)
    }

    /// `1 − d / max_distance`, clamped to [0, 1]. Seeds are 1, unreached 0.
    pub fn confidence(&self, max_distance: f32) -> Image<f32> {
        let (w, h) = self.distance.dims();
        let mut out = Image::new(w, h);
        for (x, y, d) in self.distance.pixels() {
            let c = if d.is_finite() && max_distance > 0.0 {
                (1.0 - d / max_distance).clamp(0.0, 1.0)
            } else if d == 0.0 {
                1.0
            } else {
                0.0
            };
            out.set(x, y, c);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// FloodFiller
// ---------------------------------------------------------------------------

/// Jump flood over nearest-seed indices.
pub struct FloodFiller {
    width: usize,
    height: usize,
    slots: PingPong<Image<u32>>,
    schedule: Vec<usize>,
    cursor: usize,
    /// Color of the composite being flooded, captured by `begin`.
    seed_color: Option<ImageBuffer>,
}

impl FloodFiller {
    /// # Errors
    /// `EmptyDimensions` for a zero dimension, `TooLarge` if `width · height`
    /// does not fit the u32 seed index.
    pub fn new(width: usize, height: usize) -> Result<Self, FillError> {
        if width == 0 || height == 0 {
            return Err(FillError::EmptyDimensions);
        }
        if width.checked_mul(height).map_or(true, |n| n >= NO_SEED as usize) {
            return Err(FillError::TooLarge { width, height });
        }
        Ok(FloodFiller {
            width,
            height,
            slots: PingPong::new(
                Image::filled(width, height, NO_SEED),
                Image::filled(width, height, NO_SEED),
            ),
            schedule: Vec::new(),
            cursor: 0,
            seed_color: None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Run a full flood: `begin`, all passes, `extract`.
    pub fn floodfill(
        &mut self,
        composite: &Composite,
        iterations: usize,
    ) -> Result<FloodResult, FillError> {
        self.begin(composite, iterations)?;
        while !self.step() {}
        self.extract()
    }

    /// Reset both slots and seed the read slot from `composite`.
    ///
    /// Safe to call in the middle of an earlier flood: nothing from the
    /// aborted run survives.
    ///
    /// # Errors
    /// `DimensionMismatch` if the composite has a different size.
    pub fn begin(&mut self, composite: &Composite, iterations: usize) -> Result<(), FillError> {
        if (composite.width(), composite.height()) != (self.width, self.height) {
            return Err(FillError::DimensionMismatch {
                expected: (self.width, self.height),
                got: (composite.width(), composite.height()),
            });
        }
        let w = self.width;
        let [ping, pong] = self.slots.reset();
        pong.fill(NO_SEED);
        for y in 0..self.height {
            let row = ping.row_mut(y);
            for (x, slot) in row.iter_mut().enumerate() {
                *slot = if composite.is_seed(x, y) { (y * w + x) as u32 } else { NO_SEED };
            }
        }
        self.seed_color = Some(composite.color.clone());
        self.schedule = schedule(iterations);
        self.cursor = 0;
        log::debug!(
            "[seamfill::flood] begin {}×{}, {} passes",
            self.width, self.height, self.schedule.len()
        );
        Ok(())
    }

    /// Passes left in the current schedule.
    pub fn remaining(&self) -> usize {
        self.schedule.len() - self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.schedule.len()
    }

    /// Run one pass and swap the slots. Returns true when the schedule is
    /// finished (also when it already was).
    pub fn step(&mut self) -> bool {
        if self.is_done() {
            return true;
        }
        let offset = self.schedule[self.cursor] as isize;
        let (w, h) = (self.width, self.height);
        let (read, write) = self.slots.split();

        for y in 0..h {
            for x in 0..w {
                // SAFETY: (x, y) is inside both slots.
                let mut best = unsafe { read.get_unchecked(x, y) };
                let mut best_d = dist2(x, y, best, w);
                for &(dx, dy) in &NEIGHBOURS {
                    let qx = x as isize + dx * offset;
                    let qy = y as isize + dy * offset;
                    if !read.in_bounds(qx, qy) {
                        continue;
                    }
                    let cand = unsafe { read.get_unchecked(qx as usize, qy as usize) };
                    if cand == NO_SEED || cand == best {
                        continue;
                    }
                    let d = dist2(x, y, cand, w);
                    if d < best_d {
                        best = cand;
                        best_d = d;
                    }
                }
                unsafe { write.set_unchecked(x, y, best) };
            }
        }

        self.slots.swap();
        self.cursor += 1;
        log::trace!("[seamfill::flood] pass {} offset {offset}", self.cursor);
        self.is_done()
    }

    /// Current distance estimate per texel (∞ where no seed yet).
    pub fn distance_map(&self) -> Image<f32> {
        let read = self.slots.read();
        let mut out = Image::new(self.width, self.height);
        for (x, y, s) in read.pixels() {
            let d = dist2(x, y, s, self.width);
            out.set(x, y, if d == u64::MAX { f32::INFINITY } else { (d as f64).sqrt() as f32 });
        }
        out
    }

    /// Nearest-seed indices as of the last completed pass.
    pub fn nearest(&self) -> &Image<u32> {
        self.slots.read()
    }

    /// Resolve the current slot into colors and distances.
    ///
    /// # Errors
    /// `NotPrepared` if `begin` was never called.
    pub fn extract(&self) -> Result<FloodResult, FillError> {
        let seed_color = self.seed_color.as_ref().ok_or(FillError::NotPrepared)?;
        let nearest = self.slots.read().clone();
        let mut color = ImageBuffer::new(self.width, self.height, seed_color.channels())?;
        for (x, y, s) in nearest.pixels() {
            if s == NO_SEED {
                continue;
            }
            let (sx, sy) = unpack(s, self.width);
            color.set_pixel(x, y, &seed_color.pixel(sx, sy));
        }
        Ok(FloodResult {
            color,
            distance: self.distance_map(),
            nearest,
        })
    }
}

#[inline]
fn unpack(index: u32, width: usize) -> (usize, usize) {
    let i = index as usize;
    (i % width, i / width)
}

/// Squared distance from (x, y) to seed `s`; `u64::MAX` for NO_SEED.
#[inline]
fn dist2(x: usize, y: usize, s: u32, width: usize) -> u64 {
    if s == NO_SEED {
        return u64::MAX;
    }
    let (sx, sy) = unpack(s, width);
    let dx = x as i64 - sx as i64;
    let dy = y as i64 - sy as i64;
    (dx * dx + dy * dy) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite_with(w: usize, h: usize, seeds: &[(usize, usize, [f32; 3])]) -> Composite {
        let mut c = Composite::new(w, h, 3).unwrap();
        for &(x, y, col) in seeds {
            c.paint_texel(x, y, &col);
        }
        c
    }

    #[test]
    fn test_default_iterations() {
        assert_eq!(default_iterations(256, 256), 8);
        assert_eq!(default_iterations(257, 3), 9);
        assert_eq!(default_iterations(1, 1), 1);
        assert_eq!(default_iterations(100, 40), 7);
    }

    #[test]
    fn test_schedule_halves_to_one() {
        assert_eq!(schedule(4), vec![8, 4, 2, 1]);
        assert_eq!(schedule(1), vec![1]);
        assert!(schedule(0).is_empty());
    }

    #[test]
    fn test_ping_pong_split_never_aliases() {
        let mut pp = PingPong::new(vec![1], vec![2]);
        {
            let (r, w) = pp.split();
            assert_eq!(r, &vec![1]);
            w[0] = 3;
        }
        pp.swap();
        assert_eq!(pp.read(), &vec![3]);
        assert_eq!(pp.active(), 1);
        let (r, _) = pp.split();
        assert_eq!(r, &vec![3]);
    }

    #[test]
    fn test_single_seed_covers_everything() {
        let c = composite_with(32, 20, &[(7, 11, [0.2, 0.4, 0.6])]);
        let mut f = FloodFiller::new(32, 20).unwrap();
        let r = f.floodfill(&c, default_iterations(32, 20)).unwrap();
        assert!(r.is_complete());
        for (x, y, _) in r.distance.pixels() {
            assert_eq!(r.color.pixel(x, y), [0.2, 0.4, 0.6, 0.0]);
        }
        // Single seed: jump flood is exact.
        assert!((r.distance.get(31, 0) - ((24.0f32 * 24.0 + 11.0 * 11.0).sqrt())).abs() < 1e-4);
    }

    #[test]
    fn test_seeds_are_immutable_every_pass() {
        let seeds = [(3, 3, [1.0, 0.0, 0.0]), (20, 9, [0.0, 1.0, 0.0]), (12, 15, [0.0, 0.0, 1.0])];
        let c = composite_with(24, 18, &seeds);
        let mut f = FloodFiller::new(24, 18).unwrap();
        f.begin(&c, 5).unwrap();
        loop {
            let done = f.step();
            for &(x, y, _) in &seeds {
                assert_eq!(f.nearest().get(x, y), (y * 24 + x) as u32);
            }
            if done {
                break;
            }
        }
        let r = f.extract().unwrap();
        for &(x, y, col) in &seeds {
            assert_eq!(&r.color.pixel(x, y)[..3], &col);
            assert_eq!(r.distance.get(x, y), 0.0);
        }
    }

    #[test]
    fn test_distance_never_increases() {
        let c = composite_with(
            40,
            30,
            &[(0, 0, [1.0; 3]), (39, 29, [0.5; 3]), (20, 5, [0.25; 3])],
        );
        let mut f = FloodFiller::new(40, 30).unwrap();
        f.begin(&c, default_iterations(40, 30)).unwrap();
        let mut prev = f.distance_map();
        loop {
            let done = f.step();
            let cur = f.distance_map();
            for (x, y, d) in cur.pixels() {
                assert!(d <= prev.get(x, y), "({x},{y}) grew {} -> {d}", prev.get(x, y));
            }
            if done {
                break;
            }
            prev = cur;
        }
    }

    #[test]
    fn test_restart_discards_aborted_state() {
        let mut f = FloodFiller::new(16, 16).unwrap();
        let a = composite_with(16, 16, &[(1, 1, [1.0, 0.0, 0.0])]);
        f.begin(&a, 4).unwrap();
        f.step();
        f.step();

        let b = composite_with(16, 16, &[(14, 14, [0.0, 0.0, 1.0])]);
        let r = f.floodfill(&b, 4).unwrap();
        assert_eq!(r.nearest.get(1, 1), (14 * 16 + 14) as u32);
        assert_eq!(r.color.pixel(0, 0), [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_composite_leaves_everything_unreached() {
        let c = Composite::new(8, 8, 3).unwrap();
        let mut f = FloodFiller::new(8, 8).unwrap();
        let r = f.floodfill(&c, 3).unwrap();
        assert!(!r.is_complete());
        assert!(r.distance.pixels().all(|(_, _, d)| d.is_infinite()));
        assert!(r.confidence(10.0).pixels().all(|(_, _, v)| v == 0.0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let c = Composite::new(8, 4, 3).unwrap();
        let mut f = FloodFiller::new(8, 8).unwrap();
        assert!(matches!(f.begin(&c, 3), Err(FillError::DimensionMismatch { .. })));
        assert!(matches!(f.extract(), Err(FillError::NotPrepared)));
    }

    #[test]
    fn test_index_overflow_is_an_error() {
        // 2^16 × 2^16 = 2^32 texels, one past the last addressable index.
        assert!(matches!(
            FloodFiller::new(1 << 16, 1 << 16),
            Err(FillError::TooLarge { width: 65536, height: 65536 })
        ));
        assert!(matches!(FloodFiller::new(usize::MAX, 2), Err(FillError::TooLarge { .. })));
    }
}
