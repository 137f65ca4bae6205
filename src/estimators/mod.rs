//! Free-energy estimators.
//!
//! All three estimators consume the finalized [`AnalysisDataset`] only:
//!
//! - TI integrates the mean ⟨dH/dλ⟩ over the lambda path (trapezoid rule)
//! - BAR solves Bennett's implicit equation per adjacent state pair
//! - MBAR solves the self-consistent reduced free energies over all states
//!   and also yields the state-overlap matrix
//!
//! Results are reported as a [`FreeEnergyTable`] of cumulative differences in
//! kT between every pair of states.

pub mod bar;
pub mod mbar;
pub mod ti;

pub use bar::*;
pub use mbar::*;
pub use ti::*;

use crate::domain::FreeEnergyTable;

/// Build the cumulative pairwise table from per-adjacent-segment estimates.
///
/// Segment variances are independent, so uncertainties add in quadrature
/// across the segments spanned by each pair.
pub(crate) fn table_from_segments(seg_df: &[f64], seg_var: &[f64]) -> FreeEnergyTable {
    let k = seg_df.len() + 1;
    let mut delta_f = vec![vec![0.0; k]; k];
    let mut d_delta_f = vec![vec![0.0; k]; k];

    for i in 0..k {
        for j in (i + 1)..k {
            let df: f64 = seg_df[i..j].iter().sum();
            let var: f64 = seg_var[i..j].iter().sum();
            delta_f[i][j] = df;
            delta_f[j][i] = -df;
            d_delta_f[i][j] = var.sqrt();
            d_delta_f[j][i] = var.sqrt();
        }
    }

    FreeEnergyTable { delta_f, d_delta_f }
}

/// Wang-Landau biasing weights for an expanded-ensemble run.
///
/// These are the free energies of every state relative to the first, rounded
/// to 5 decimals the way GROMACS expects them in the mdp options.
pub fn wang_landau_weights(ti: &FreeEnergyTable) -> Vec<f64> {
    ti.delta_f[0]
        .iter()
        .map(|v| (v * 1e5).round() / 1e5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_table_is_antisymmetric() {
        let table = table_from_segments(&[1.0, 2.0], &[0.04, 0.09]);
        assert_eq!(table.n_states(), 3);
        assert!((table.delta_f[0][2] - 3.0).abs() < 1e-12);
        assert!((table.delta_f[2][0] + 3.0).abs() < 1e-12);
        assert!((table.d_delta_f[0][2] - 0.13f64.sqrt()).abs() < 1e-12);
        assert_eq!(table.delta_f[1][1], 0.0);
    }

    #[test]
    fn wl_weights_are_rounded_first_row() {
        let table = table_from_segments(&[1.234561, -0.5], &[0.0, 0.0]);
        let w = wang_landau_weights(&table);
        assert_eq!(w, vec![0.0, 1.23456, 0.73456]);
    }
}
