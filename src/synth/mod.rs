//! Synthetic dhdl file generation.
//!
//! Writes a directory of plausible GROMACS dhdl `.xvg` files so the whole
//! pipeline can be exercised without REMD output at hand: `states` lambda
//! states, `files_per_state` sequential files each, with consecutive files
//! of one state overlapping by `overlap_rows` repeated time frames (the
//! restart pattern the segmenter exists to clean up).
//!
//! Output is deterministic under a fixed seed.

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::{AnalysisError, AnalysisResult};

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub dir: PathBuf,
    pub states: usize,
    pub files_per_state: usize,
    pub rows_per_file: usize,
    pub overlap_rows: usize,
    pub dt: f64,
    pub temp: f64,
    pub seed: u64,
}

/// Generate the synthetic dhdl files; returns the written paths in order.
pub fn generate_dhdl_files(config: &SynthConfig) -> AnalysisResult<Vec<PathBuf>> {
    validate(config)?;
    create_dir_all(&config.dir)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, 1.0)
        .map_err(|e| AnalysisError::Invalid(format!("noise distribution: {e}")))?;

    let k = config.states;
    let lambdas: Vec<f64> = (0..k).map(|s| s as f64 / (k - 1) as f64).collect();

    let mut paths = Vec::with_capacity(k * config.files_per_state);
    let mut file_idx = 0usize;
    for (state, &lambda) in lambdas.iter().enumerate() {
        for f in 0..config.files_per_state {
            let start =
                f as f64 * (config.rows_per_file - config.overlap_rows) as f64 * config.dt;
            let path = config.dir.join(format!("md{file_idx}.xvg"));
            write_one_file(
                &path, config, state, lambda, &lambdas, start, &mut rng, &noise,
            )?;
            paths.push(path);
            file_idx += 1;
        }
    }
    Ok(paths)
}

fn validate(config: &SynthConfig) -> AnalysisResult<()> {
    if config.states < 2 {
        return Err(AnalysisError::Invalid(
            "need at least two lambda states".to_string(),
        ));
    }
    if config.files_per_state == 0 || config.rows_per_file < 2 {
        return Err(AnalysisError::Invalid(
            "need at least one file per state and two rows per file".to_string(),
        ));
    }
    if config.overlap_rows >= config.rows_per_file {
        return Err(AnalysisError::Invalid(
            "overlap must be shorter than a file".to_string(),
        ));
    }
    if !(config.dt.is_finite() && config.dt > 0.0) {
        return Err(AnalysisError::Invalid(format!(
            "time step must be positive, got {}",
            config.dt
        )));
    }
    if !(config.temp.is_finite() && config.temp > 0.0) {
        return Err(AnalysisError::Invalid(format!(
            "temperature must be positive, got {}",
            config.temp
        )));
    }
    Ok(())
}

/// Mean dH/dλ profile (kJ/mol): decreasing and smooth over lambda.
fn dhdl_mean(lambda: f64) -> f64 {
    12.0 - 8.0 * lambda
}

#[allow(clippy::too_many_arguments)]
fn write_one_file(
    path: &Path,
    config: &SynthConfig,
    state: usize,
    lambda: f64,
    lambdas: &[f64],
    start: f64,
    rng: &mut StdRng,
    noise: &Normal<f64>,
) -> AnalysisResult<()> {
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, "# synthetic dhdl data written by remd-fe synth")?;
    writeln!(out, "@    title \"dH/d\\xl\\f{{}} and \\xD\\f{{}}H\"")?;
    writeln!(out, "@    xaxis  label \"Time (ps)\"")?;
    writeln!(
        out,
        "@ subtitle \"T = {} (K) \\xl\\f{{}} state {state}: (fep-lambda) = ({lambda:.4})\"",
        config.temp
    )?;
    writeln!(out, "@ s0 legend \"Potential Energy (kJ/mol)\"")?;
    writeln!(
        out,
        "@ s1 legend \"dH/d\\xl\\f{{}} fep-lambda = {lambda:.4}\""
    )?;
    for (j, lj) in lambdas.iter().enumerate() {
        writeln!(
            out,
            "@ s{} legend \"\\xD\\f{{}}H \\xl\\f{{}} to ({lj:.4})\"",
            2 + j
        )?;
    }
    writeln!(
        out,
        "@ s{} legend \"pV (kJ/mol)\"",
        2 + lambdas.len()
    )?;

    for i in 0..config.rows_per_file {
        let t = start + i as f64 * config.dt;
        let energy = -5000.0 + 20.0 * noise.sample(rng);
        let dhdl = dhdl_mean(lambda) + noise.sample(rng);
        let pv = 0.5 + 0.01 * noise.sample(rng);

        write!(out, "{t:.4} {energy:.4} {dhdl:.4}")?;
        for &lj in lambdas {
            // ΔH to the target state along the mean profile, plus noise that
            // grows with the lambda distance.
            let dl = lj - lambda;
            let dh = dhdl_mean(lambda + 0.5 * dl) * dl + dl.abs() * noise.sample(rng);
            write!(out, " {dh:.4}")?;
        }
        writeln!(out, " {pv:.4}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReplicaChunk, StateDataset};
    use crate::io::{list_dhdl_files, parse_dhdl_file};
    use crate::segment::Segmenter;
    use crate::subsample::equilibrate;

    fn config(dir: PathBuf) -> SynthConfig {
        SynthConfig {
            dir,
            states: 3,
            files_per_state: 2,
            rows_per_file: 30,
            overlap_rows: 5,
            dt: 0.2,
            temp: 298.15,
            seed: 42,
        }
    }

    #[test]
    fn writes_one_file_per_state_segment() {
        let dir = tempfile::tempdir().unwrap();
        let paths = generate_dhdl_files(&config(dir.path().to_path_buf())).unwrap();
        assert_eq!(paths.len(), 6);
        assert!(paths.iter().all(|p| p.is_file()));
    }

    #[test]
    fn generation_is_deterministic() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = generate_dhdl_files(&config(dir_a.path().to_path_buf())).unwrap();
        let b = generate_dhdl_files(&config(dir_b.path().to_path_buf())).unwrap();

        for (pa, pb) in a.iter().zip(&b) {
            assert_eq!(
                std::fs::read_to_string(pa).unwrap(),
                std::fs::read_to_string(pb).unwrap()
            );
        }
    }

    #[test]
    fn synthetic_files_segment_back_into_states() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path().to_path_buf());
        generate_dhdl_files(&cfg).unwrap();

        let files = list_dhdl_files(&cfg.dir).unwrap();
        assert_eq!(files.len(), 6);

        let mut seg = Segmenter::new(cfg.dt, |chunk: ReplicaChunk| {
            let (dhdl, dhdl_equil) = equilibrate(&chunk.dhdl, 0);
            let (u_nk, u_nk_equil) = equilibrate(&chunk.u_nk, 0);
            Ok(StateDataset {
                dhdl,
                u_nk,
                dhdl_equil,
                u_nk_equil,
            })
        })
        .unwrap();
        for f in &files {
            seg.push(parse_dhdl_file(f, cfg.temp).unwrap()).unwrap();
        }
        let states = seg.finish().unwrap();

        assert_eq!(states.len(), 3);
        for (k, state) in states.iter().enumerate() {
            assert_eq!(state.dhdl.state.index, Some(k));
            // two files of 30 rows with 5 overlapping: 25 + 30 before filtering
            assert_eq!(state.dhdl_equil.n_total, 55);
            assert_eq!(state.u_nk.columns.len(), 3);
        }
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path().to_path_buf());
        cfg.overlap_rows = 30;
        assert!(matches!(
            generate_dhdl_files(&cfg),
            Err(AnalysisError::Invalid(_))
        ));
    }
}
