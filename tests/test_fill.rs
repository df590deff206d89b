// tests/test_fill.rs — End-to-end fills through the public API.

use seamfill::composite::Composite;
use seamfill::fill::{fill_composite, FillMode, FillOptions, FillStrategy, Filler};
use seamfill::flood::{default_iterations, FloodFiller};
use seamfill::integrator::LaplacianIntegrator;
use seamfill::kernels::KernelCache;
use seamfill::pyramid::max_levels;

fn paint_rect(c: &mut Composite, x0: usize, y0: usize, w: usize, h: usize, col: &[f32]) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            c.paint_texel(x, y, col);
        }
    }
}

// ===== Poisson =====

#[test]
fn single_red_patch_fills_the_whole_texture() {
    let (w, h) = (256, 256);
    let mut c = Composite::new(w, h, 3).unwrap();
    paint_rect(&mut c, 124, 124, 8, 8, &[1.0, 0.0, 0.0]);

    let flood = FloodFiller::new(w, h).unwrap().floodfill(&c, default_iterations(w, h)).unwrap();
    assert!(flood.is_complete());
    assert!(flood.color.plane(0).as_slice().iter().all(|&v| v == 1.0));

    let out = fill_composite(&c, &FillOptions::default()).unwrap();
    for y in (0..h).step_by(5) {
        for x in (0..w).step_by(5) {
            let p = out.pixel(x, y);
            assert!((p[0] - 1.0).abs() < 1e-4 && p[1].abs() < 1e-4 && p[2].abs() < 1e-4, "({x},{y}) {p:?}");
        }
    }
}

#[test]
fn two_patches_blend_without_interior_extrema() {
    // Black patch on the left edge, white patch on the right edge. The
    // membrane in between must rise monotonically along the center row and
    // have no local maximum or minimum anywhere away from the seeds.
    let (w, h) = (128, 64);
    let mut c = Composite::new(w, h, 1).unwrap();
    paint_rect(&mut c, 0, 28, 6, 8, &[0.0]);
    paint_rect(&mut c, w - 6, 28, 6, 8, &[1.0]);
    let out = fill_composite(&c, &FillOptions::default()).unwrap();
    let plane = out.plane(0);

    let row = plane.row(32);
    let decreases: Vec<usize> = (1..w).filter(|&x| row[x] < row[x - 1] - 1e-5).collect();
    assert!(decreases.is_empty(), "center row decreases at {decreases:?}");
    assert_eq!(row[0], 0.0);
    assert_eq!(row[w - 1], 1.0);

    let mut extrema = Vec::new();
    for (x, y, v) in plane.pixels() {
        if c.is_seed(x, y) {
            continue;
        }
        let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if (dx, dy) == (0, 0) || !plane.in_bounds(nx, ny) {
                    continue;
                }
                let n = plane.get(nx as usize, ny as usize);
                lo = lo.min(n);
                hi = hi.max(n);
            }
        }
        if v > hi + 1e-6 || v < lo - 1e-6 {
            extrema.push((x, y, v));
        }
    }
    assert!(extrema.is_empty(), "interior extrema: {extrema:?}");
}

#[test]
fn poisson_fills_rgba_composites() {
    let mut c = Composite::new(24, 16, 4).unwrap();
    paint_rect(&mut c, 2, 2, 3, 3, &[1.0, 0.0, 0.0, 1.0]);
    paint_rect(&mut c, 18, 10, 3, 3, &[0.0, 1.0, 0.0, 0.25]);
    let out = fill_composite(&c, &FillOptions::default()).unwrap();
    assert_eq!(out.channels(), 4);
    assert_eq!(out.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(out.pixel(19, 11), [0.0, 1.0, 0.0, 0.25]);
    let mid = out.pixel(12, 8);
    assert!(mid[3] > 0.25 && mid[3] < 1.0, "{mid:?}");
}

#[test]
fn empty_composite_is_returned_unchanged() {
    let c = Composite::new(20, 10, 3).unwrap();
    for mode in [FillMode::Poisson, FillMode::Laplacian] {
        let out = fill_composite(&c, &FillOptions { mode, ..Default::default() }).unwrap();
        assert_eq!(out.max_abs_diff(&c.color), 0.0);
    }
}

// ===== Laplacian =====

#[test]
fn laplacian_strokes_keep_their_colors() {
    let (w, h) = (64, 64);
    let mut c = Composite::new(w, h, 3).unwrap();
    paint_rect(&mut c, 4, 28, 8, 8, &[1.0, 0.0, 0.0]);
    paint_rect(&mut c, 52, 28, 8, 8, &[0.0, 0.0, 1.0]);
    let out = fill_composite(&c, &FillOptions { mode: FillMode::Laplacian, ..Default::default() }).unwrap();

    let mut max_err = 0.0f32;
    for y in 0..h {
        for x in 0..w {
            if c.is_seed(x, y) {
                for ch in 0..3 {
                    max_err = max_err.max((out.get(x, y, ch) - c.color.get(x, y, ch)).abs());
                }
            }
        }
    }
    assert!(max_err < 1e-3, "max seed error {max_err}");
    let blue = out.pixel(56, 32);
    assert!(blue[2] > 0.99 && blue[0] < 0.01, "{blue:?}");
}

#[test]
fn laplacian_result_shifts_with_seed_colors() {
    // Shifting every seed by the same amount leaves the Laplacian unchanged,
    // so the whole result moves by exactly that amount.
    let (w, h) = (64, 64);
    let build = |offset: f32| {
        let mut c = Composite::new(w, h, 1).unwrap();
        paint_rect(&mut c, 10, 10, 12, 12, &[0.25 + offset]);
        paint_rect(&mut c, 40, 36, 12, 12, &[0.5 + offset]);
        c
    };
    let options = FillOptions { mode: FillMode::Laplacian, ..Default::default() };

    let solve = |c: &Composite| {
        let flood = FloodFiller::new(w, h).unwrap().floodfill(c, default_iterations(w, h)).unwrap();
        let mut cache = KernelCache::new();
        let mut li = LaplacianIntegrator::new(w, h, 1, max_levels(w, h), &mut cache).unwrap();
        li.preproc(c, &flood).unwrap();
        li.prepare();
        li.reconstruct().unwrap()
    };
    let a = solve(&build(0.0));
    let b = solve(&build(0.125));
    for y in (0..h).step_by(4) {
        for x in (0..w).step_by(4) {
            assert!((b.get(x, y, 0) - a.get(x, y, 0) - 0.125).abs() < 1e-5, "({x},{y})");
        }
    }

    let clamped = fill_composite(&build(0.0), &options).unwrap();
    assert!(clamped.plane(0).as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
}

// ===== Filler protocol =====

#[test]
fn filler_runs_incrementally() {
    let (w, h) = (48, 40);
    let mut c = Composite::new(w, h, 3).unwrap();
    paint_rect(&mut c, 5, 5, 4, 4, &[0.2, 0.4, 0.6]);
    let flood = FloodFiller::new(w, h).unwrap().floodfill(&c, default_iterations(w, h)).unwrap();

    let mut cache = KernelCache::new();
    let mut f = Filler::new(FillMode::Poisson, w, h, 3, None, &mut cache).unwrap();
    assert_eq!(f.mode(), FillMode::Poisson);
    f.preproc(&c, &flood).unwrap();
    f.prepare();
    let mut steps = 1;
    while !f.step().unwrap() {
        steps += 1;
    }
    assert_eq!(steps, f.pass_count());
    let incremental = f.finish().unwrap();

    let oneshot = fill_composite(&c, &FillOptions::default()).unwrap();
    assert_eq!(incremental.max_abs_diff(&oneshot), 0.0);
}
