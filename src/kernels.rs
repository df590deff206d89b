// kernels.rs — Filter kernel sets for the convolution pyramid.
//
// A convolution pyramid approximates one large convolution with three small
// separable filters applied at every level:
//
//   h1  analysis     blur before decimating level i into level i+1
//   h2  synthesis    interpolate a zero-upsampled coarse level back up
//   g   residual     the level's own contribution, added on the way up
//
// Two sets are used. Their taps are the optimized values from Farbman et al.,
// "Convolution Pyramids" (SIGGRAPH Asia 2011):
//
//   Membrane  (boundary interpolation, Poisson fill)
//     h1 = [0.1507, 0.6836, 1.0334, 0.6836, 0.1507]
//     h2 = 0.0270 · h1
//     g  = [0.0312, 0.7753, 0.0312]
//
//   Integration  (gradient-field integration)
//     h1 = [0.15, 0.5, 0.7, 0.5, 0.15]
//     h2 = h1
//     g  = [0.175, 0.547, 0.175]
//
// `KernelTable` is the per-(resolution, depth, set) bundle the pyramid
// needs at run time: the kernels plus the analysis gain at every level.
// `KernelCache` builds each table once and hands out `Arc`s, so every fill
// at the same resolution shares the same immutable table.
//
// NEW RUST CONCEPTS:
// - `HashMap::entry(..).or_insert_with(..)` for build-on-first-use caches.
// - `Arc<T>` for cheap shared ownership of immutable data.

use std::collections::HashMap;
use std::sync::Arc;

/// Which of a set's three filters to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    /// h1
    Analysis,
    /// h2
    Synthesis,
    /// g
    Residual,
}

/// Named kernel families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelSet {
    Membrane,
    Integration,
}

/// One set of separable pyramid filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterKernels {
    pub h1: [f32; 5],
    pub h2: [f32; 5],
    pub g: [f32; 3],
}

const MEMBRANE_H1: [f32; 5] = [0.1507, 0.6836, 1.0334, 0.6836, 0.1507];
const MEMBRANE_H2_SCALE: f32 = 0.0270;

impl FilterKernels {
    pub fn membrane() -> Self {
        FilterKernels {
            h1: MEMBRANE_H1,
            h2: MEMBRANE_H1.map(|v| v * MEMBRANE_H2_SCALE),
            g: [0.0312, 0.7753, 0.0312],
        }
    }

    pub fn integration() -> Self {
        let h1 = [0.15, 0.5, 0.7, 0.5, 0.15];
        FilterKernels {
            h1,
            h2: h1,
            g: [0.175, 0.547, 0.175],
        }
    }

    pub fn for_set(set: KernelSet) -> Self {
        match set {
            KernelSet::Membrane => Self::membrane(),
            KernelSet::Integration => Self::integration(),
        }
    }

    /// Taps of one filter as a slice (5 taps for h1/h2, 3 for g).
    pub fn taps(&self, id: KernelId) -> &[f32] {
        match id {
            KernelId::Analysis => &self.h1,
            KernelId::Synthesis => &self.h2,
            KernelId::Residual => &self.g,
        }
    }

    /// Gain of the separable 2D analysis filter on a constant field,
    /// `(Σ h1)²`.
    pub fn analysis_gain_2d(&self) -> f32 {
        let s: f32 = self.h1.iter().sum();
        s * s
    }
}

/// Key of a kernel table: one per resolution, depth and kernel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub width: usize,
    pub height: usize,
    pub levels: usize,
    pub set: KernelSet,
}

/// Immutable per-level kernel data for one pyramid configuration.
#[derive(Debug, Clone)]
pub struct KernelTable {
    pub key: KernelKey,
    pub kernels: FilterKernels,
    /// `gains[i]` is what a constant field of 1 becomes at level i after
    /// i analysis passes, ignoring the border: `(Σh1)^(2i)`.
    pub gains: Vec<f32>,
}

impl KernelTable {
    pub fn new(key: KernelKey) -> Self {
        let kernels = FilterKernels::for_set(key.set);
        let step = kernels.analysis_gain_2d();
        let mut gains = Vec::with_capacity(key.levels);
        let mut g = 1.0f32;
        for _ in 0..key.levels {
            gains.push(g);
            g *= step;
        }
        KernelTable { key, kernels, gains }
    }

    #[inline]
    pub fn gain(&self, level: usize) -> f32 {
        self.gains[level]
    }
}

/// Build-once store of kernel tables.
#[derive(Debug, Default)]
pub struct KernelCache {
    tables: HashMap<KernelKey, Arc<KernelTable>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table for `key`, building it on first request.
    pub fn get(&mut self, key: KernelKey) -> Arc<KernelTable> {
        self.tables
            .entry(key)
            .or_insert_with(|| {
                log::debug!(
                    "[seamfill::kernels] building {:?} table for {}×{}, {} levels",
                    key.set, key.width, key.height, key.levels
                );
                Arc::new(KernelTable::new(key))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
