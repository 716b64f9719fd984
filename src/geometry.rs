//! The two pruning rules of the pattern generator.
//!
//! `slope_within` bounds the transverse slope a pattern expresses at a given
//! recursion depth; `line_consistent` decides whether some straight line can
//! pass through every plane's bin. Both work in normalized units: plane
//! positions in (0, 1] with `z[0] = 0`, slopes as transverse fraction of the
//! detector width per unit z.
//!
//! Comparisons are equality-inclusive (`>=`) and evaluated in `f64`; for
//! certain z spacings the band test is sensitive to rounding, so behavior is
//! pinned by the scenario tests below.

use crate::pattern::Pattern;

/// Slope bound at recursion depth `depth`.
///
/// At depth `d` one bin unit corresponds to a transverse extent of `2^-d`,
/// so a pattern of signed width `w` expresses a slope of `(|w| - 1) * 2^-d`.
/// Degenerate single-column patterns (`|w| < 2`) always pass.
pub fn slope_within(width: i32, depth: u32, max_slope: f64) -> bool {
    let w = width.unsigned_abs();
    w < 2 || f64::from(w - 1) / f64::from(1u32 << depth) <= max_slope
}

/// Straight-line feasibility of a normalized pattern.
///
/// Narrows a band of candidate lines anchored at the outermost plane and
/// walks the intermediate planes inward, rejecting as soon as a bin falls a
/// full bin width outside the band. Assumes `pat.bin(0) == 0` and identical
/// bin sizes and positions in every plane.
pub fn line_consistent(pat: &Pattern, z: &[f64]) -> bool {
    let n = z.len();
    debug_assert!(n >= 2);
    debug_assert_eq!(pat.nplanes(), n);
    debug_assert_eq!(pat.bin(0), 0);

    // Left band edge anchored at the last plane's bin; the right edge minus
    // one bin width coincides with it initially.
    let mut x_l = f64::from(pat.bin(n - 1));
    let mut x_r_m1 = x_l;
    let mut z_l = z[n - 1];
    let mut z_r = z_l;

    for i in (1..n - 1).rev() {
        // Compare the band edge's intersection with plane i against the bin
        // edge, scaled by the anchor z to avoid a division (x0 = 0).
        let d_l = x_l * z[i] - f64::from(pat.bin(i)) * z_l;
        if d_l.abs() >= z_l {
            return false;
        }
        let d_r = x_r_m1 * z[i] - f64::from(pat.bin(i)) * z_r;
        if d_r.abs() >= z_r {
            return false;
        }

        if i > 1 {
            // A bin strictly inside the band tightens the respective limit.
            if d_l > 0.0 {
                x_r_m1 = f64::from(pat.bin(i));
                z_r = z[i];
            }
            if d_r < 0.0 {
                x_l = f64::from(pat.bin(i));
                z_l = z[i];
            }
        }
    }
    true
}
