//! Thermodynamic integration over the lambda path.

use crate::domain::{AnalysisDataset, FreeEnergyTable};
use crate::error::{AnalysisError, AnalysisResult};
use crate::estimators::table_from_segments;
use crate::math::{mean, sem};

/// Fit TI on the finalized dH/dλ series.
///
/// For each adjacent state pair the free-energy difference is the trapezoid
/// `Σ_c ½(⟨∂H/∂λ_c⟩_k + ⟨∂H/∂λ_c⟩_{k+1}) Δλ_c` over the lambda components,
/// with the variance propagated from the per-state standard errors. The rows
/// are already thinned to independent frames, so the plain SEM applies.
pub fn fit_ti(dataset: &AnalysisDataset) -> AnalysisResult<FreeEnergyTable> {
    let k = dataset.n_states();
    if k < 2 {
        return Err(AnalysisError::Estimator(format!(
            "TI needs at least two states, got {k}"
        )));
    }

    let n_components = dataset.states[0].dhdl.columns.len();
    let mut means = Vec::with_capacity(k);
    let mut sems = Vec::with_capacity(k);
    let mut lambdas = Vec::with_capacity(k);

    for (idx, state) in dataset.states.iter().enumerate() {
        let block = &state.dhdl;
        if block.is_empty() {
            return Err(AnalysisError::Estimator(format!(
                "state {idx} has no dH/dλ samples after filtering"
            )));
        }
        if block.columns.len() != n_components {
            return Err(AnalysisError::Estimator(format!(
                "state {idx} has {} lambda components, expected {n_components}",
                block.columns.len()
            )));
        }
        if block.state.coords.len() != n_components {
            return Err(AnalysisError::Estimator(format!(
                "state {idx} declares {} lambda coordinates for {n_components} components",
                block.state.coords.len()
            )));
        }

        let mut m = Vec::with_capacity(n_components);
        let mut s = Vec::with_capacity(n_components);
        for c in 0..n_components {
            let xs = block.column(c);
            m.push(mean(&xs));
            s.push(sem(&xs));
        }
        means.push(m);
        sems.push(s);
        lambdas.push(
            block
                .state
                .coords
                .iter()
                .map(|(_, v)| *v)
                .collect::<Vec<f64>>(),
        );
    }

    let mut seg_df = Vec::with_capacity(k - 1);
    let mut seg_var = Vec::with_capacity(k - 1);
    for i in 0..k - 1 {
        let mut df = 0.0;
        let mut var = 0.0;
        for c in 0..n_components {
            let dl = lambdas[i + 1][c] - lambdas[i][c];
            df += 0.5 * (means[i][c] + means[i + 1][c]) * dl;
            let half_dl = 0.5 * dl;
            var += half_dl * half_dl * (sems[i][c] * sems[i][c] + sems[i + 1][c] * sems[i + 1][c]);
        }
        seg_df.push(df);
        seg_var.push(var);
    }

    Ok(table_from_segments(&seg_df, &seg_var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EquilibrationInfo, LambdaState, SeriesBlock, StateDataset};

    fn dhdl_state(index: usize, lambda: f64, values: &[f64]) -> StateDataset {
        let state = LambdaState {
            index: Some(index),
            coords: vec![("fep-lambda".to_string(), lambda)],
        };
        let mut dhdl = SeriesBlock::new(state.clone(), vec!["fep-lambda".to_string()]);
        for (i, v) in values.iter().enumerate() {
            dhdl.times.push(i as f64 * 0.2);
            dhdl.values.push(vec![*v]);
        }
        let u_nk = SeriesBlock::new(state, vec![]);
        let info = EquilibrationInfo {
            t0: 0,
            g: 1.0,
            n_total: values.len(),
            n_used: values.len(),
        };
        StateDataset {
            dhdl,
            u_nk,
            dhdl_equil: info,
            u_nk_equil: info,
        }
    }

    fn dataset(states: Vec<StateDataset>) -> AnalysisDataset {
        AnalysisDataset {
            temp: 298.15,
            dt: 0.2,
            states,
        }
    }

    #[test]
    fn ti_is_exact_on_constant_gradients() {
        let ds = dataset(vec![
            dhdl_state(0, 0.0, &[2.0, 2.0, 2.0]),
            dhdl_state(1, 1.0, &[4.0, 4.0, 4.0]),
        ]);
        let table = fit_ti(&ds).unwrap();
        let (df, err) = table.total();
        assert!((df - 3.0).abs() < 1e-12);
        assert!(err.abs() < 1e-12);
    }

    #[test]
    fn ti_trapezoid_is_exact_on_linear_profiles() {
        // <dH/dl> = 1 + 2*lambda integrates to 2 over [0, 1].
        let ds = dataset(vec![
            dhdl_state(0, 0.0, &[1.0; 4]),
            dhdl_state(1, 0.5, &[2.0; 4]),
            dhdl_state(2, 1.0, &[3.0; 4]),
        ]);
        let table = fit_ti(&ds).unwrap();
        assert!((table.total().0 - 2.0).abs() < 1e-12);
        // intermediate entry too
        assert!((table.delta_f[0][1] - 0.75).abs() < 1e-12);
        assert!((table.delta_f[1][0] + 0.75).abs() < 1e-12);
    }

    #[test]
    fn ti_propagates_sampling_noise_into_uncertainty() {
        let ds = dataset(vec![
            dhdl_state(0, 0.0, &[1.0, 3.0, 2.0, 2.0]),
            dhdl_state(1, 1.0, &[4.0, 4.0, 4.0, 4.0]),
        ]);
        let table = fit_ti(&ds).unwrap();
        assert!(table.total().1 > 0.0);
    }

    #[test]
    fn ti_rejects_single_state() {
        let ds = dataset(vec![dhdl_state(0, 0.0, &[1.0, 2.0])]);
        assert!(matches!(
            fit_ti(&ds),
            Err(AnalysisError::Estimator(_))
        ));
    }

    #[test]
    fn ti_rejects_empty_state() {
        let ds = dataset(vec![
            dhdl_state(0, 0.0, &[]),
            dhdl_state(1, 1.0, &[1.0]),
        ]);
        assert!(matches!(fit_ti(&ds), Err(AnalysisError::Estimator(_))));
    }
}
