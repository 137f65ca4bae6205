//! Bennett acceptance ratio for adjacent state pairs.

use crate::domain::{AnalysisDataset, FreeEnergyTable};
use crate::error::{AnalysisError, AnalysisResult};
use crate::estimators::table_from_segments;
use crate::math::logsumexp;

/// Bisection stops when the bracket is narrower than this (kT).
const ROOT_TOL: f64 = 1e-12;
const MAX_BISECT: usize = 200;

/// Fit BAR on the finalized u_nk series.
///
/// For each adjacent pair (k, k+1) the forward reduced work is taken from
/// state k's samples and the reverse work from state k+1's, and Bennett's
/// implicit equation is solved by bisection. The uncertainty is the standard
/// Fermi-function fluctuation estimate.
pub fn fit_bar(dataset: &AnalysisDataset) -> AnalysisResult<FreeEnergyTable> {
    let k = dataset.n_states();
    if k < 2 {
        return Err(AnalysisError::Estimator(format!(
            "BAR needs at least two states, got {k}"
        )));
    }

    let mut seg_df = Vec::with_capacity(k - 1);
    let mut seg_var = Vec::with_capacity(k - 1);

    for i in 0..k - 1 {
        let fwd_block = &dataset.states[i].u_nk;
        let rev_block = &dataset.states[i + 1].u_nk;
        if fwd_block.columns.len() <= i + 1 || rev_block.columns.len() <= i + 1 {
            return Err(AnalysisError::Estimator(format!(
                "u_nk blocks do not evaluate states {i} and {}",
                i + 1
            )));
        }

        let w_f: Vec<f64> = fwd_block
            .values
            .iter()
            .map(|row| row[i + 1] - row[i])
            .collect();
        let w_r: Vec<f64> = rev_block
            .values
            .iter()
            .map(|row| row[i] - row[i + 1])
            .collect();
        if w_f.is_empty() || w_r.is_empty() {
            return Err(AnalysisError::Estimator(format!(
                "no samples for the {i} -> {} pair after filtering",
                i + 1
            )));
        }

        let (df, var) = bar_pair(&w_f, &w_r)?;
        seg_df.push(df);
        seg_var.push(var);
    }

    Ok(table_from_segments(&seg_df, &seg_var))
}

/// Solve one adjacent pair. Returns (ΔF, variance) in kT.
pub fn bar_pair(w_f: &[f64], w_r: &[f64]) -> AnalysisResult<(f64, f64)> {
    let n_f = w_f.len() as f64;
    let n_r = w_r.len() as f64;
    let m = (n_f / n_r).ln();

    // Exponential-averaging estimates bracket the BAR solution loosely;
    // widen by a margin and expand further if the root is not inside.
    let neg_wf: Vec<f64> = w_f.iter().map(|w| -w).collect();
    let neg_wr: Vec<f64> = w_r.iter().map(|w| -w).collect();
    let exp_fwd = -(logsumexp(&neg_wf) - n_f.ln());
    let exp_rev = logsumexp(&neg_wr) - n_r.ln();

    let mut lo = exp_fwd.min(exp_rev) - 10.0;
    let mut hi = exp_fwd.max(exp_rev) + 10.0;
    let mut widen = 0;
    while bar_objective(w_f, w_r, m, lo) > 0.0 || bar_objective(w_f, w_r, m, hi) < 0.0 {
        lo -= 50.0;
        hi += 50.0;
        widen += 1;
        if widen > 20 {
            return Err(AnalysisError::Estimator(
                "BAR could not bracket a solution; the work distributions do not overlap"
                    .to_string(),
            ));
        }
    }

    let mut iters = 0;
    while hi - lo > ROOT_TOL && iters < MAX_BISECT {
        let mid = 0.5 * (lo + hi);
        if bar_objective(w_f, w_r, m, mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        iters += 1;
    }
    let df = 0.5 * (lo + hi);

    // Fermi-function fluctuation formula for the asymptotic variance.
    let f_f: Vec<f64> = w_f.iter().map(|w| fermi(m + w - df)).collect();
    let f_r: Vec<f64> = w_r.iter().map(|w| fermi(-m + w + df)).collect();
    let var = rel_fluctuation(&f_f) / n_f + rel_fluctuation(&f_r) / n_r;

    Ok((df, var.max(0.0)))
}

/// Bennett's self-consistency residual; monotonically increasing in `df`.
fn bar_objective(w_f: &[f64], w_r: &[f64], m: f64, df: f64) -> f64 {
    let fwd: f64 = w_f.iter().map(|w| fermi(m + w - df)).sum();
    let rev: f64 = w_r.iter().map(|w| fermi(-m + w + df)).sum();
    fwd - rev
}

fn fermi(x: f64) -> f64 {
    1.0 / (1.0 + x.exp())
}

fn rel_fluctuation(fs: &[f64]) -> f64 {
    let n = fs.len() as f64;
    let mean = fs.iter().sum::<f64>() / n;
    let mean_sq = fs.iter().map(|f| f * f).sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    mean_sq / (mean * mean) - 1.0
}
