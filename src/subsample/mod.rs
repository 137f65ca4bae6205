//! Equilibration detection and correlated-data subsampling.
//!
//! Molecular-dynamics observables are serially correlated and start from a
//! non-equilibrated configuration. Before any estimator sees the data we:
//!
//! 1. pick the production start index `t0` that maximizes the effective
//!    number of samples `(N - t0) / g` of the primary observable
//! 2. thin the remaining rows at the statistical-inefficiency stride `g`
//!
//! Both steps are deterministic given identical input.

use crate::domain::{EquilibrationInfo, SeriesBlock};
use crate::math::{mean, sample_variance};

/// Minimum lag to examine before an autocorrelation sign change may stop the
/// summation. Very noisy series can dip negative at lag 1 by chance.
const MIN_LAG: usize = 3;

/// Statistical inefficiency `g = 1 + 2 Σ_t (1 - t/N) C(t)` of a time series.
///
/// The normalized autocovariance sum stops at the first non-positive `C(t)`
/// past [`MIN_LAG`]. Degenerate input (short or constant) reports `g = 1`.
pub fn statistical_inefficiency(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 3 {
        return 1.0;
    }
    let m = mean(xs);
    let var = sample_variance(xs);
    if !(var.is_finite() && var > 0.0) {
        return 1.0;
    }

    let mut g = 1.0;
    for t in 1..n - 1 {
        let mut c = 0.0;
        for i in 0..n - t {
            c += (xs[i] - m) * (xs[i + t] - m);
        }
        c /= (n - t) as f64 * var;
        if c <= 0.0 && t >= MIN_LAG {
            break;
        }
        g += 2.0 * c * (1.0 - t as f64 / n as f64);
    }
    g.max(1.0)
}

/// Find the production start index that maximizes the effective sample count.
///
/// Candidate start indices are examined on an `nskip` grid. Returns
/// `(t0, g, n_eff)` for the winning candidate.
pub fn detect_equilibration(xs: &[f64], nskip: usize) -> (usize, f64, f64) {
    let n = xs.len();
    if n < 3 {
        return (0, 1.0, n as f64);
    }
    let nskip = nskip.max(1);

    let mut best = (0, 1.0, f64::NEG_INFINITY);
    let mut t0 = 0;
    while t0 < n - 2 {
        let g = statistical_inefficiency(&xs[t0..]);
        let n_eff = (n - t0) as f64 / g;
        if n_eff > best.2 {
            best = (t0, g, n_eff);
        }
        t0 += nskip;
    }
    best
}

/// Row indices of an equidistant-in-`g` subsample of `n` rows starting at `t0`.
pub fn subsample_indices(n: usize, t0: usize, g: f64) -> Vec<usize> {
    let stride = g.max(1.0);
    let mut out = Vec::new();
    let mut i = 0usize;
    loop {
        let idx = t0 + (i as f64 * stride).round() as usize;
        if idx >= n {
            break;
        }
        if out.last() != Some(&idx) {
            out.push(idx);
        }
        i += 1;
    }
    out
}

/// Remove non-equilibrated leading rows and thin to independent frames.
///
/// `col` selects the primary observable the detection runs on (column 0 for
/// both dhdl and u_nk blocks, matching how the estimates are consumed).
pub fn equilibrate(block: &SeriesBlock, col: usize) -> (SeriesBlock, EquilibrationInfo) {
    let n = block.len();
    let xs = block.column(col);
    let nskip = (n / 100).max(1);
    let (t0, g, _) = detect_equilibration(&xs, nskip);
    let indices = subsample_indices(n, t0, g);
    let filtered = block.select_rows(&indices);
    let info = EquilibrationInfo {
        t0,
        g,
        n_total: n,
        n_used: indices.len(),
    };
    (filtered, info)
}
