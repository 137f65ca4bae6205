//! Multistate Bennett acceptance ratio.
//!
//! Solves the self-consistent reduced free energies
//!
//! `f_k = -ln Σ_n exp(-u_kn) / Σ_l N_l exp(f_l - u_ln)`
//!
//! over all samples pooled from every state, then derives the asymptotic
//! covariance and the state-overlap matrix from the weight matrix W.

use nalgebra::DMatrix;
use tracing::debug;

use crate::domain::{AnalysisDataset, FreeEnergyTable};
use crate::error::{AnalysisError, AnalysisResult};
use crate::math::{logsumexp, pinv_symmetric};

const CONVERGENCE_TOL: f64 = 1e-8;
const MAX_ITERATIONS: usize = 10_000;

/// MBAR fit output: the pairwise table plus the state-overlap matrix.
#[derive(Debug, Clone)]
pub struct MbarOutput {
    pub table: FreeEnergyTable,
    /// `overlap[i][j]` estimates the phase-space overlap between states i and
    /// j; every row sums to 1.
    pub overlap: Vec<Vec<f64>>,
}

/// Fit MBAR on the finalized u_nk series.
pub fn fit_mbar(dataset: &AnalysisDataset) -> AnalysisResult<MbarOutput> {
    let k = dataset.n_states();
    if k < 2 {
        return Err(AnalysisError::Estimator(format!(
            "MBAR needs at least two states, got {k}"
        )));
    }

    // Pool all samples; u[s][n] is the reduced potential of sample n
    // evaluated at state s.
    let mut n_k = Vec::with_capacity(k);
    let mut u = vec![Vec::new(); k];
    for (idx, state) in dataset.states.iter().enumerate() {
        let block = &state.u_nk;
        if block.columns.len() != k {
            return Err(AnalysisError::Estimator(format!(
                "state {idx} evaluates {} target states, expected {k}",
                block.columns.len()
            )));
        }
        if block.is_empty() {
            return Err(AnalysisError::Estimator(format!(
                "state {idx} has no u_nk samples after filtering"
            )));
        }
        n_k.push(block.len());
        for row in &block.values {
            for (s, dest) in u.iter_mut().enumerate() {
                dest.push(row[s]);
            }
        }
    }
    let n_total: usize = n_k.iter().sum();
    let log_n_k: Vec<f64> = n_k.iter().map(|&n| (n as f64).ln()).collect();

    // Self-consistent iteration on the reduced free energies.
    let mut f = vec![0.0f64; k];
    let mut log_denom = vec![0.0f64; n_total];
    let mut converged = false;
    for iteration in 0..MAX_ITERATIONS {
        for (n, ld) in log_denom.iter_mut().enumerate() {
            let terms: Vec<f64> = (0..k).map(|l| log_n_k[l] + f[l] - u[l][n]).collect();
            *ld = logsumexp(&terms);
        }

        let mut f_new = Vec::with_capacity(k);
        for s in 0..k {
            let terms: Vec<f64> = (0..n_total).map(|n| -u[s][n] - log_denom[n]).collect();
            f_new.push(-logsumexp(&terms));
        }
        let shift = f_new[0];
        for v in f_new.iter_mut() {
            *v -= shift;
        }

        let delta = f
            .iter()
            .zip(&f_new)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        f = f_new;
        if delta < CONVERGENCE_TOL {
            debug!("MBAR converged after {} iterations", iteration + 1);
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(AnalysisError::Estimator(format!(
            "MBAR did not converge within {MAX_ITERATIONS} iterations"
        )));
    }

    // Final weight matrix with the converged free energies.
    for (n, ld) in log_denom.iter_mut().enumerate() {
        let terms: Vec<f64> = (0..k).map(|l| log_n_k[l] + f[l] - u[l][n]).collect();
        *ld = logsumexp(&terms);
    }
    let mut w = DMatrix::<f64>::zeros(n_total, k);
    for n in 0..n_total {
        for s in 0..k {
            w[(n, s)] = (f[s] - u[s][n] - log_denom[n]).exp();
        }
    }

    let overlap = overlap_matrix(&w, &n_k);
    let theta = covariance_matrix(&w, &n_k);

    let mut delta_f = vec![vec![0.0; k]; k];
    let mut d_delta_f = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in 0..k {
            delta_f[i][j] = f[j] - f[i];
            let var = theta[(i, i)] + theta[(j, j)] - 2.0 * theta[(i, j)];
            d_delta_f[i][j] = var.max(0.0).sqrt();
        }
    }

    Ok(MbarOutput {
        table: FreeEnergyTable { delta_f, d_delta_f },
        overlap,
    })
}

/// `O_ij = N_j Σ_n W_ni W_nj`; rows sum to 1 by the weight normalization.
fn overlap_matrix(w: &DMatrix<f64>, n_k: &[usize]) -> Vec<Vec<f64>> {
    let k = n_k.len();
    let mut out = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in 0..k {
            let mut s = 0.0;
            for n in 0..w.nrows() {
                s += w[(n, i)] * w[(n, j)];
            }
            out[i][j] = n_k[j] as f64 * s;
        }
    }
    out
}

/// Asymptotic covariance `Θ = W^T (I - W N W^T)^+ W`, computed in K×K space
/// through the eigendecomposition of `W^T W`.
fn covariance_matrix(w: &DMatrix<f64>, n_k: &[usize]) -> DMatrix<f64> {
    let k = n_k.len();
    let omega = w.transpose() * w;
    let eig = omega.symmetric_eigen();

    let mut sigma = eig.eigenvalues.clone();
    for v in sigma.iter_mut() {
        *v = v.max(0.0).sqrt();
    }
    let sigma = DMatrix::from_diagonal(&sigma);
    let v = &eig.eigenvectors;

    let n_diag =
        DMatrix::from_diagonal(&nalgebra::DVector::from_iterator(
            k,
            n_k.iter().map(|&n| n as f64),
        ));

    let inner = DMatrix::<f64>::identity(k, k) - &sigma * v.transpose() * n_diag * v * &sigma;
    v * &sigma * pinv_symmetric(&inner, 1e-10) * &sigma * v.transpose()
}
