//! Pseudo-inverse of symmetric matrices.
//!
//! The MBAR covariance computation needs a Moore–Penrose pseudo-inverse of a
//! symmetric (often rank-deficient) K×K matrix. With K tiny (number of
//! lambda states), a full symmetric eigendecomposition is both robust and
//! cheap, so we use that instead of SVD.

use nalgebra::DMatrix;

/// Moore–Penrose pseudo-inverse of a symmetric matrix.
///
/// Eigenvalues whose magnitude is below `tol * max(|eigenvalue|)` are treated
/// as zero.
pub fn pinv_symmetric(m: &DMatrix<f64>, tol: f64) -> DMatrix<f64> {
    let eig = m.clone().symmetric_eigen();
    let max_ev = eig
        .eigenvalues
        .iter()
        .fold(0.0f64, |acc, &v| acc.max(v.abs()));
    let cutoff = tol * max_ev;

    let mut inv = eig.eigenvalues.clone();
    for v in inv.iter_mut() {
        *v = if v.abs() > cutoff { 1.0 / *v } else { 0.0 };
    }

    &eig.eigenvectors * DMatrix::from_diagonal(&inv) * eig.eigenvectors.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinv_of_identity_is_identity() {
        let m = DMatrix::<f64>::identity(3, 3);
        let p = pinv_symmetric(&m, 1e-12);
        assert!((p - DMatrix::<f64>::identity(3, 3)).norm() < 1e-12);
    }

    #[test]
    fn pinv_of_singular_matrix_recovers_range() {
        // rank-1 symmetric matrix: m = v v^T with v = (1, 1)
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let p = pinv_symmetric(&m, 1e-12);
        // m * p * m == m holds for a valid pseudo-inverse
        let back = &m * &p * &m;
        assert!((back - &m).norm() < 1e-9);
    }
}
