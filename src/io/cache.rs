//! Read/write the preprocessed-data cache.
//!
//! Segmentation and equilibration filtering dominate the runtime on large
//! REMD directories, so the finalized per-state datasets are cached to JSON
//! (together with the temperature and time step they were produced under)
//! and reused on reruns. `--refresh` bypasses the cache.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::AnalysisDataset;
use crate::error::{AnalysisError, AnalysisResult};

/// Bumped whenever the cached schema changes shape.
pub const CACHE_VERSION: u32 = 1;

/// On-disk cache schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub tool: String,
    pub version: u32,
    pub dataset: AnalysisDataset,
}

/// Write the finalized datasets to `path`.
pub fn write_cache(path: &Path, dataset: &AnalysisDataset) -> AnalysisResult<()> {
    let file = File::create(path).map_err(|e| {
        AnalysisError::Cache(format!("failed to create '{}': {e}", path.display()))
    })?;
    let cache = CacheFile {
        tool: "remd-fe".to_string(),
        version: CACHE_VERSION,
        dataset: dataset.clone(),
    };
    serde_json::to_writer(file, &cache)
        .map_err(|e| AnalysisError::Cache(format!("failed to write '{}': {e}", path.display())))?;
    Ok(())
}

/// Load previously finalized datasets from `path`.
pub fn read_cache(path: &Path) -> AnalysisResult<AnalysisDataset> {
    let file = File::open(path).map_err(|e| {
        AnalysisError::Cache(format!("failed to open '{}': {e}", path.display()))
    })?;
    let cache: CacheFile = serde_json::from_reader(file)
        .map_err(|e| AnalysisError::Cache(format!("invalid cache '{}': {e}", path.display())))?;
    if cache.version != CACHE_VERSION {
        return Err(AnalysisError::Cache(format!(
            "cache '{}' has schema version {} (expected {CACHE_VERSION}); rerun with --refresh",
            path.display(),
            cache.version
        )));
    }
    Ok(cache.dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EquilibrationInfo, LambdaState, SeriesBlock, StateDataset};

    fn tiny_dataset() -> AnalysisDataset {
        let state = LambdaState {
            index: Some(0),
            coords: vec![("fep-lambda".to_string(), 0.0)],
        };
        let mut dhdl = SeriesBlock::new(state.clone(), vec!["fep-lambda".to_string()]);
        dhdl.times = vec![0.0, 0.2];
        dhdl.values = vec![vec![1.0], vec![1.1]];
        let mut u_nk = SeriesBlock::new(state, vec!["0".to_string(), "1".to_string()]);
        u_nk.times = vec![0.0, 0.2];
        u_nk.values = vec![vec![0.0, 0.5], vec![0.0, 0.6]];
        let info = EquilibrationInfo {
            t0: 0,
            g: 1.0,
            n_total: 2,
            n_used: 2,
        };
        AnalysisDataset {
            temp: 298.15,
            dt: 0.2,
            states: vec![StateDataset {
                dhdl,
                u_nk,
                dhdl_equil: info,
                u_nk_equil: info,
            }],
        }
    }

    #[test]
    fn cache_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let ds = tiny_dataset();

        write_cache(&path, &ds).unwrap();
        let back = read_cache(&path).unwrap();
        assert_eq!(back.states.len(), 1);
        assert_eq!(back.states[0].dhdl.times, ds.states[0].dhdl.times);
        assert_eq!(back.temp, ds.temp);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = CacheFile {
            tool: "remd-fe".to_string(),
            version: CACHE_VERSION + 1,
            dataset: tiny_dataset(),
        };
        serde_json::to_writer(File::create(&path).unwrap(), &cache).unwrap();

        let err = read_cache(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::Cache(_)));
    }

    #[test]
    fn missing_cache_is_an_error() {
        let err = read_cache(Path::new("/no/cache/here.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::Cache(_)));
    }
}
