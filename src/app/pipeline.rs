//! The end-to-end analysis pipeline.
//!
//! `run_analysis` is the single entry point: it produces the finalized
//! per-state datasets (from the cache or by segmenting the dhdl directory)
//! and runs the three estimators over them.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::domain::{AnalysisDataset, AnalyzeConfig, FreeEnergyTable, ReplicaChunk, StateDataset};
use crate::error::{AnalysisError, AnalysisResult};
use crate::estimators::{MbarOutput, fit_bar, fit_mbar, fit_ti, wang_landau_weights};
use crate::io::{list_dhdl_files, parse_dhdl_file, read_cache, write_cache};
use crate::report::ordinal;
use crate::segment::Segmenter;
use crate::subsample::equilibrate;

/// Everything one analysis run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub dataset: AnalysisDataset,
    pub ti: FreeEnergyTable,
    pub bar: FreeEnergyTable,
    pub mbar: MbarOutput,
    pub wl_weights: Vec<f64>,
    pub from_cache: bool,
}

/// Run the full analysis described by `config`.
pub fn run_analysis(config: &AnalyzeConfig) -> AnalysisResult<RunOutput> {
    let (dataset, from_cache) = load_or_preprocess(config)?;

    info!("fitting TI on the dHdl series of {} states", dataset.n_states());
    let ti = fit_ti(&dataset)?;
    info!("fitting BAR on the u_nk series");
    let bar = fit_bar(&dataset)?;
    info!("fitting MBAR on the u_nk series");
    let mbar = fit_mbar(&dataset)?;
    let wl_weights = wang_landau_weights(&ti);

    Ok(RunOutput {
        dataset,
        ti,
        bar,
        mbar,
        wl_weights,
        from_cache,
    })
}

/// Load the finalized datasets from the cache, or segment the dhdl directory.
///
/// A readable cache whose temperature or time step disagree with `config` is
/// stale: we warn and re-segment rather than silently mixing settings.
pub fn load_or_preprocess(config: &AnalyzeConfig) -> AnalysisResult<(AnalysisDataset, bool)> {
    if !config.refresh && config.cache.is_file() {
        match read_cache(&config.cache) {
            Ok(dataset) => {
                if dataset.temp == config.temp && dataset.dt == config.dt {
                    info!(
                        "loaded {} preprocessed states from '{}'",
                        dataset.n_states(),
                        config.cache.display()
                    );
                    return Ok((dataset, true));
                }
                warn!(
                    "cache '{}' was built with temp={} K, dt={} ps (requested {} K, {} ps); re-segmenting",
                    config.cache.display(),
                    dataset.temp,
                    dataset.dt,
                    config.temp,
                    config.dt
                );
            }
            Err(err) => {
                warn!("ignoring unreadable cache: {err}");
            }
        }
    }

    let dataset = preprocess(config)?;
    write_cache(&config.cache, &dataset)?;
    info!("cached preprocessed data to '{}'", config.cache.display());
    Ok((dataset, false))
}

/// Parse, segment and equilibration-filter the dhdl directory.
pub fn preprocess(config: &AnalyzeConfig) -> AnalysisResult<AnalysisDataset> {
    let files = list_dhdl_files(&config.dir)?;
    if files.is_empty() {
        return Err(AnalysisError::EmptyInput(format!(
            "no dhdl .xvg files found in '{}'",
            config.dir.display()
        )));
    }
    info!(
        "segmenting {} dhdl files from '{}'",
        files.len(),
        config.dir.display()
    );

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut n_state = 0usize;
    let mut seg = Segmenter::new(config.dt, |chunk: ReplicaChunk| {
        n_state += 1;
        debug!(
            "filtering the {} state [{}]: {} rows",
            ordinal(n_state),
            chunk.dhdl.state.label(),
            chunk.dhdl.len()
        );
        let (dhdl, dhdl_equil) = equilibrate(&chunk.dhdl, 0);
        let (u_nk, u_nk_equil) = equilibrate(&chunk.u_nk, 0);
        Ok(StateDataset {
            dhdl,
            u_nk,
            dhdl_equil,
            u_nk_equil,
        })
    })?;

    for path in &files {
        bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        seg.push(parse_dhdl_file(path, config.temp)?)?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    let states = seg.finish()?;
    info!("finalized {} states", states.len());
    Ok(AnalysisDataset {
        temp: config.temp,
        dt: config.dt,
        states,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{SynthConfig, generate_dhdl_files};
    use std::path::{Path, PathBuf};

    fn synth_dir(dir: &Path) {
        generate_dhdl_files(&SynthConfig {
            dir: dir.to_path_buf(),
            states: 3,
            files_per_state: 2,
            rows_per_file: 40,
            overlap_rows: 5,
            dt: 0.2,
            temp: 298.15,
            seed: 7,
        })
        .unwrap();
    }

    fn config(dir: &Path, workdir: &Path) -> AnalyzeConfig {
        AnalyzeConfig {
            dir: dir.to_path_buf(),
            temp: 298.15,
            dt: 0.2,
            output: workdir.join("Result.txt"),
            cache: workdir.join("cache.json"),
            refresh: false,
            export: None,
            plot: false,
            plot_file: PathBuf::from("overlap_matrix.svg"),
        }
    }

    #[test]
    fn full_run_over_synthetic_data() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        synth_dir(data.path());
        let cfg = config(data.path(), work.path());

        let run = run_analysis(&cfg).unwrap();
        assert!(!run.from_cache);
        assert_eq!(run.dataset.n_states(), 3);
        assert_eq!(run.wl_weights.len(), 3);
        assert_eq!(run.wl_weights[0], 0.0);

        let (ti_df, ti_err) = run.ti.total();
        assert!(ti_df.is_finite() && ti_err.is_finite());
        let (bar_df, _) = run.bar.total();
        assert!(bar_df.is_finite());
        let (mbar_df, _) = run.mbar.table.total();
        assert!(mbar_df.is_finite());
        assert_eq!(run.mbar.overlap.len(), 3);

        assert!(cfg.cache.is_file());
    }

    #[test]
    fn second_run_hits_the_cache() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        synth_dir(data.path());
        let cfg = config(data.path(), work.path());

        let first = run_analysis(&cfg).unwrap();
        let second = run_analysis(&cfg).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);

        let (a, _) = first.ti.total();
        let (b, _) = second.ti.total();
        assert_eq!(a, b);
    }

    #[test]
    fn stale_cache_settings_trigger_resegmentation() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        synth_dir(data.path());
        let cfg = config(data.path(), work.path());

        run_analysis(&cfg).unwrap();
        let mut hotter = cfg.clone();
        hotter.temp = 310.0;
        let run = run_analysis(&hotter).unwrap();
        assert!(!run.from_cache);
        assert_eq!(run.dataset.temp, 310.0);
    }

    #[test]
    fn refresh_bypasses_the_cache() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        synth_dir(data.path());
        let mut cfg = config(data.path(), work.path());

        run_analysis(&cfg).unwrap();
        cfg.refresh = true;
        let run = run_analysis(&cfg).unwrap();
        assert!(!run.from_cache);
    }

    #[test]
    fn empty_directory_is_reported() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let cfg = config(data.path(), work.path());

        let err = run_analysis(&cfg).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput(_)));
    }
}
