//! Formatted text output.
//!
//! We keep formatting code in one place so:
//! - the segmentation/estimator code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Local;

use crate::domain::{AnalysisDataset, AnalyzeConfig, FreeEnergyTable};
use crate::error::AnalysisResult;
use crate::estimators::MbarOutput;

/// Everything the report needs from one completed run.
pub struct ReportContext<'a> {
    pub config: &'a AnalyzeConfig,
    pub dataset: &'a AnalysisDataset,
    pub ti: &'a FreeEnergyTable,
    pub bar: &'a FreeEnergyTable,
    pub mbar: &'a MbarOutput,
    pub wl_weights: &'a [f64],
    pub from_cache: bool,
    pub elapsed_secs: f64,
}

/// Build the full results report.
pub fn format_report(ctx: &ReportContext<'_>) -> String {
    let mut out = String::new();

    out.push_str("=== remd-fe - REMD Free Energy Analysis ===\n");
    out.push_str(&format!("Generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!("Directory: {}\n", ctx.config.dir.display()));
    out.push_str(&format!("Temperature: {} K\n", ctx.config.temp));
    out.push_str(&format!("Time step: {} ps\n", ctx.config.dt));
    out.push_str(&format!(
        "Preprocessed data: {}\n",
        if ctx.from_cache {
            "loaded from cache"
        } else {
            "segmented from dhdl files"
        }
    ));

    out.push_str("\nPer-state datasets:\n");
    for (k, state) in ctx.dataset.states.iter().enumerate() {
        out.push_str(&format!(
            "  {:>4} state [{}]: dHdl n={}/{} (t0={}, g={:.2}) | u_nk n={}/{} (t0={}, g={:.2})\n",
            ordinal(k + 1),
            state.dhdl.state.label(),
            state.dhdl_equil.n_used,
            state.dhdl_equil.n_total,
            state.dhdl_equil.t0,
            state.dhdl_equil.g,
            state.u_nk_equil.n_used,
            state.u_nk_equil.n_total,
            state.u_nk_equil.t0,
            state.u_nk_equil.g,
        ));
    }

    out.push('\n');
    out.push_str(&format_results(ctx.ti, ctx.bar, ctx.mbar));

    out.push_str("\nAdjacent-pair free energies (kT):\n");
    out.push_str(&format!(
        "  {:<10} {:>20} {:>20} {:>20}\n",
        "pair", "TI", "BAR", "MBAR"
    ));
    for i in 0..ctx.dataset.n_states().saturating_sub(1) {
        out.push_str(&format!(
            "  {:<10} {:>20} {:>20} {:>20}\n",
            format!("{i} -> {}", i + 1),
            fmt_estimate(ctx.ti.delta_f[i][i + 1], ctx.ti.d_delta_f[i][i + 1]),
            fmt_estimate(ctx.bar.delta_f[i][i + 1], ctx.bar.d_delta_f[i][i + 1]),
            fmt_estimate(
                ctx.mbar.table.delta_f[i][i + 1],
                ctx.mbar.table.d_delta_f[i][i + 1]
            ),
        ));
    }

    let weights: Vec<String> = ctx.wl_weights.iter().map(|w| w.to_string()).collect();
    out.push_str(&format!(
        "\nEstimated Wang-Landau weights: {}\n",
        weights.join(" ")
    ));

    out.push_str("\nOverlap matrix:\n");
    for row in &ctx.mbar.overlap {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.2}")).collect();
        out.push_str(&format!("  {}\n", cells.join(" ")));
    }

    out.push_str(&format!(
        "\nTime elapsed: {:.2} seconds.\n",
        ctx.elapsed_secs
    ));
    out
}

/// The headline estimator results, also printed to the terminal.
pub fn format_results(ti: &FreeEnergyTable, bar: &FreeEnergyTable, mbar: &MbarOutput) -> String {
    let mut out = String::new();
    out.push_str("====== Results ======\n");
    let (df, err) = ti.total();
    out.push_str(&format!("TI:   {} kT\n", fmt_estimate(df, err)));
    let (df, err) = bar.total();
    out.push_str(&format!("BAR:  {} kT\n", fmt_estimate(df, err)));
    let (df, err) = mbar.table.total();
    out.push_str(&format!("MBAR: {} kT\n", fmt_estimate(df, err)));
    out
}

/// Write the report to `path`.
pub fn write_report(path: &Path, report: &str) -> AnalysisResult<()> {
    let mut file = File::create(path)?;
    file.write_all(report.as_bytes())?;
    Ok(())
}

fn fmt_estimate(df: f64, err: f64) -> String {
    format!("{df:.5} +/- {err:.5}")
}

/// English ordinal: 1st, 2nd, 3rd, 4th, ..., 11th, 12th, 13th, 21st, ...
pub fn ordinal(n: usize) -> String {
    let suffix = if matches!(n % 100, 11..=13) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{n}{suffix}")
}
