//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during segmentation and estimation
//! - cached to JSON and reloaded on reruns
//! - exported to CSV for downstream scripts

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The thermodynamic state a block of samples was generated at.
///
/// GROMACS dhdl files carry the state in the subtitle line, e.g.
/// `state 2: (coul-lambda, vdw-lambda) = (0.5000, 0.0000)`. The index is
/// optional because older files omit it; the lambda coordinates are what the
/// TI estimator integrates over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaState {
    pub index: Option<usize>,
    /// Named lambda coordinates, in file order.
    pub coords: Vec<(String, f64)>,
}

impl LambdaState {
    /// Terse label for logs and reports, e.g. `state 2 (0.5000, 0.0000)`.
    pub fn label(&self) -> String {
        let coords: Vec<String> = self.coords.iter().map(|(_, v)| format!("{v:.4}")).collect();
        match self.index {
            Some(i) => format!("state {i} ({})", coords.join(", ")),
            None => format!("state ({})", coords.join(", ")),
        }
    }
}

/// One observation stream for one thermodynamic state, keyed by time.
///
/// Columnar layout: `times[i]` is the timestamp (ps) of row `i`, and
/// `values[i]` holds that row's observations (one per entry of `columns`).
///
/// For a dH/dλ block the columns are lambda components (`coul-lambda`, ...);
/// for a u_nk block they are the target states the reduced potential was
/// evaluated at. Values are always in reduced units (kT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBlock {
    pub state: LambdaState,
    pub columns: Vec<String>,
    pub times: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl SeriesBlock {
    pub fn new(state: LambdaState, columns: Vec<String>) -> Self {
        Self {
            state,
            columns,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Drop the last `n` rows (saturating).
    pub fn truncate_tail(&mut self, n: usize) {
        let keep = self.len().saturating_sub(n);
        self.times.truncate(keep);
        self.values.truncate(keep);
    }

    /// Append all rows of `other` to this block.
    pub fn extend_rows(&mut self, other: SeriesBlock) {
        self.times.extend(other.times);
        self.values.extend(other.values);
    }

    /// A copy containing only the rows at `indices` (assumed in range and ascending).
    pub fn select_rows(&self, indices: &[usize]) -> SeriesBlock {
        SeriesBlock {
            state: self.state.clone(),
            columns: self.columns.clone(),
            times: indices.iter().map(|&i| self.times[i]).collect(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    /// Copy one column out as a contiguous vector.
    pub fn column(&self, c: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[c]).collect()
    }
}

/// The dH/dλ + u_nk block pair parsed from one replica-output file.
///
/// The two series always describe the same rows, so the segmenter trims and
/// buffers them as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaChunk {
    pub dhdl: SeriesBlock,
    pub u_nk: SeriesBlock,
}

/// How the equilibration filter truncated and thinned one series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquilibrationInfo {
    /// Index of the first equilibrated row.
    pub t0: usize,
    /// Statistical inefficiency of the primary observable after `t0`.
    pub g: f64,
    /// Row count before filtering.
    pub n_total: usize,
    /// Row count kept after truncation + subsampling.
    pub n_used: usize,
}

/// One thermodynamic state's finalized data: concatenated, trimmed,
/// equilibration-filtered and subsampled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDataset {
    pub dhdl: SeriesBlock,
    pub u_nk: SeriesBlock,
    pub dhdl_equil: EquilibrationInfo,
    pub u_nk_equil: EquilibrationInfo,
}

/// All finalized per-state datasets, in the order states were encountered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDataset {
    /// Temperature (K) the reduced units were computed at.
    pub temp: f64,
    /// Sample time step (ps) used for overlap trimming.
    pub dt: f64,
    pub states: Vec<StateDataset>,
}

impl AnalysisDataset {
    pub fn n_states(&self) -> usize {
        self.states.len()
    }
}

/// Cumulative free-energy differences between all state pairs, in kT.
///
/// `delta_f[i][j]` is the free-energy difference from state `i` to state `j`
/// (antisymmetric); `d_delta_f[i][j]` is its estimated uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeEnergyTable {
    pub delta_f: Vec<Vec<f64>>,
    pub d_delta_f: Vec<Vec<f64>>,
}

impl FreeEnergyTable {
    pub fn n_states(&self) -> usize {
        self.delta_f.len()
    }

    /// End-to-end estimate: ΔF from the first to the last state, with uncertainty.
    pub fn total(&self) -> (f64, f64) {
        let k = self.n_states();
        (self.delta_f[0][k - 1], self.d_delta_f[0][k - 1])
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    /// Directory holding the dhdl files.
    pub dir: PathBuf,
    /// Temperature in Kelvin.
    pub temp: f64,
    /// Sample time step (ps).
    pub dt: f64,

    /// Results report path.
    pub output: PathBuf,
    /// Preprocessed-data cache path.
    pub cache: PathBuf,
    /// Ignore an existing cache and re-segment.
    pub refresh: bool,

    /// Optional CSV export of the finalized datasets.
    pub export: Option<PathBuf>,
    /// Render the overlap-matrix heat map.
    pub plot: bool,
    /// Heat map output path.
    pub plot_file: PathBuf,
}
