//! Export the finalized datasets to CSV.
//!
//! Long format, one observation per row, easy to pivot in pandas or a
//! spreadsheet.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{AnalysisDataset, SeriesBlock};
use crate::error::AnalysisResult;

/// Write every finalized row of both series to a CSV file.
pub fn write_dataset_csv(path: &Path, dataset: &AnalysisDataset) -> AnalysisResult<()> {
    let mut file = File::create(path)?;

    writeln!(file, "series,state,time_ps,column,value_kt")?;
    for (k, state) in dataset.states.iter().enumerate() {
        write_block(&mut file, "dhdl", k, &state.dhdl)?;
        write_block(&mut file, "u_nk", k, &state.u_nk)?;
    }
    Ok(())
}

fn write_block(file: &mut File, series: &str, state: usize, block: &SeriesBlock) -> AnalysisResult<()> {
    for (i, t) in block.times.iter().enumerate() {
        for (c, name) in block.columns.iter().enumerate() {
            writeln!(
                file,
                "{series},{state},{t:.4},\"{name}\",{:.10}",
                block.values[i][c]
            )?;
        }
    }
    Ok(())
}
