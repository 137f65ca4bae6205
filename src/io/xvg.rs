//! GROMACS dhdl `.xvg` parsing.
//!
//! A dhdl file is an xmgrace plot: `#` comment lines, `@` header lines
//! (subtitle + per-column legends) and whitespace-separated data rows keyed
//! by time. From one file we build both observation streams:
//!
//! - the dH/dλ block, one column per lambda component
//! - the u_nk block, one column per target state, computed as
//!   `β (E + ΔH_target + pV)` from the energy, ΔH and pV columns
//!
//! Energies are converted from kJ/mol to reduced units (kT) here, so nothing
//! downstream needs to know the temperature.
//!
//! A crashed run can leave the final data row incomplete; that row is dropped
//! in memory during parsing. Any other malformed row is a hard error.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::domain::{LambdaState, ReplicaChunk, SeriesBlock};
use crate::error::{AnalysisError, AnalysisResult};

/// Boltzmann constant in kJ/(mol·K), matching GROMACS units.
pub const BOLTZMANN_KJ_PER_MOL_K: f64 = 0.008_314_462_618;

/// Parse one dhdl file into its dH/dλ and u_nk blocks.
pub fn parse_dhdl_file(path: &Path, temp: f64) -> AnalysisResult<ReplicaChunk> {
    let text = fs::read_to_string(path).map_err(|e| AnalysisError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_dhdl_str(&text, temp, path)
}

/// Parse dhdl file contents already in memory.
pub fn parse_dhdl_str(text: &str, temp: f64, origin: &Path) -> AnalysisResult<ReplicaChunk> {
    if !(temp.is_finite() && temp > 0.0) {
        return Err(AnalysisError::Invalid(format!(
            "temperature must be positive, got {temp}"
        )));
    }
    let beta = 1.0 / (BOLTZMANN_KJ_PER_MOL_K * temp);

    let err = |message: String| AnalysisError::Parse {
        path: origin.to_path_buf(),
        message,
    };

    let mut state_index = None;
    let mut legends: Vec<(usize, String)> = Vec::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(header) = trimmed.strip_prefix('@') {
            let header = header.trim();
            if let Some(rest) = header.strip_prefix("subtitle") {
                if let Some(q) = quoted(rest) {
                    state_index = parse_state_index(q);
                }
            } else if let Some((idx, label)) = parse_legend(header) {
                legends.push((idx, label));
            }
            continue;
        }
        data_lines.push(trimmed);
    }

    // Classify the columns the legends describe.
    let mut dhdl_cols: Vec<(usize, String, f64)> = Vec::new(); // (column, component, lambda)
    let mut target_cols: Vec<(usize, String)> = Vec::new(); // (column, target label)
    let mut energy_col = None;
    let mut pv_col = None;

    for (idx, label) in &legends {
        if label.contains("dH/d") {
            let (name, value) = parse_dhdl_legend(label)
                .ok_or_else(|| err(format!("unrecognized dH/dl legend '{label}'")))?;
            dhdl_cols.push((*idx, name, value));
        } else if let Some(target) = label.split(" to ").nth(1) {
            target_cols.push((*idx, target.trim().to_string()));
        } else if label.contains("Energy") {
            energy_col = Some(*idx);
        } else if label.contains("pV") {
            pv_col = Some(*idx);
        } else {
            debug!("ignoring column '{label}' in {}", origin.display());
        }
    }

    if dhdl_cols.is_empty() {
        return Err(err("no dH/dl columns found in the legends".to_string()));
    }
    if target_cols.is_empty() {
        return Err(err("no \u{394}H columns found in the legends".to_string()));
    }
    if energy_col.is_none() {
        debug!(
            "{} carries no energy column; u_nk will use \u{394}H terms only",
            origin.display()
        );
    }

    let n_fields = 1 + legends.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
    let state = LambdaState {
        index: state_index,
        coords: dhdl_cols
            .iter()
            .map(|(_, name, value)| (name.clone(), *value))
            .collect(),
    };

    let mut dhdl = SeriesBlock::new(
        state.clone(),
        dhdl_cols.iter().map(|(_, name, _)| name.clone()).collect(),
    );
    let mut u_nk = SeriesBlock::new(
        state,
        target_cols.iter().map(|(_, label)| label.clone()).collect(),
    );

    let n_rows = data_lines.len();
    for (row_idx, line) in data_lines.iter().enumerate() {
        let fields: Result<Vec<f64>, _> = line.split_whitespace().map(str::parse::<f64>).collect();
        let fields = match fields {
            Ok(f) if f.len() >= n_fields => f,
            bad => {
                // GROMACS appends rows as the run progresses; a crash can cut
                // the final row short. Anything else is a corrupt file.
                if row_idx + 1 == n_rows {
                    debug!(
                        "dropping incomplete trailing record in {}",
                        origin.display()
                    );
                    break;
                }
                let detail = match bad {
                    Ok(f) => format!("{} of {n_fields} fields", f.len()),
                    Err(e) => e.to_string(),
                };
                return Err(err(format!("bad data row {}: {detail}", row_idx + 1)));
            }
        };

        let time = fields[0];
        dhdl.times.push(time);
        dhdl.values
            .push(dhdl_cols.iter().map(|(c, _, _)| beta * fields[1 + c]).collect());

        let energy = energy_col.map_or(0.0, |c| fields[1 + c]);
        let pv = pv_col.map_or(0.0, |c| fields[1 + c]);
        u_nk.times.push(time);
        u_nk.values.push(
            target_cols
                .iter()
                .map(|(c, _)| beta * (energy + fields[1 + c] + pv))
                .collect(),
        );
    }

    if dhdl.is_empty() {
        return Err(err("file contains no complete data rows".to_string()));
    }
    Ok(ReplicaChunk { dhdl, u_nk })
}

/// The text between the first and last double quote, if any.
fn quoted(s: &str) -> Option<&str> {
    let first = s.find('"')?;
    let last = s.rfind('"')?;
    if last > first {
        Some(&s[first + 1..last])
    } else {
        None
    }
}

/// `s3 legend "..."` -> `(3, label)`.
fn parse_legend(header: &str) -> Option<(usize, String)> {
    let mut tokens = header.split_whitespace();
    let s_token = tokens.next()?;
    let idx: usize = s_token.strip_prefix('s')?.parse().ok()?;
    if tokens.next()? != "legend" {
        return None;
    }
    Some((idx, quoted(header)?.to_string()))
}

/// Extract the state index from a subtitle like
/// `T = 298.15 (K) \xl\f{} state 2: (coul-lambda, vdw-lambda) = (0.5000, 0.0000)`.
fn parse_state_index(subtitle: &str) -> Option<usize> {
    let rest = subtitle.split("state ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Extract the component name and lambda value from a legend like
/// `dH/d\xl\f{} coul-lambda = 0.5000`.
fn parse_dhdl_legend(label: &str) -> Option<(String, f64)> {
    let (lhs, rhs) = label.rsplit_once('=')?;
    let value: f64 = rhs.trim().parse().ok()?;
    let name = lhs.trim_end().split_whitespace().last()?;
    Some((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"# this file was created by GROMACS
@    title "dH/d\xl\f{} and \xD\f{}H"
@    xaxis  label "Time (ps)"
@    yaxis  label "dH/d\xl\f{} and \xD\f{}H (kJ/mol [\xl\f{}]\S-1\N)"
@TYPE xy
@ subtitle "T = 298.15 (K) \xl\f{} state 1: (coul-lambda, vdw-lambda) = (0.5000, 0.0000)"
@ view 0.15, 0.15, 0.75, 0.85
@ legend on
@ s0 legend "Potential Energy (kJ/mol)"
@ s1 legend "dH/d\xl\f{} coul-lambda = 0.5000"
@ s2 legend "dH/d\xl\f{} vdw-lambda = 0.0000"
@ s3 legend "\xD\f{}H \xl\f{} to (0.0000, 0.0000)"
@ s4 legend "\xD\f{}H \xl\f{} to (0.5000, 0.0000)"
@ s5 legend "\xD\f{}H \xl\f{} to (1.0000, 0.0000)"
@ s6 legend "pV (kJ/mol)"
0.0000 -100.0 8.0 2.0 1.0 0.0 -1.0 0.5
0.2000 -101.0 8.5 2.5 1.1 0.0 -1.1 0.5
0.4000 -102.0 9.0 3.0 1.2 0.0 -1.2 0.5
0.6000 -103.0 9.5
"#;

    fn beta() -> f64 {
        1.0 / (BOLTZMANN_KJ_PER_MOL_K * 298.15)
    }

    #[test]
    fn fixture_parses_with_trailing_record_dropped() {
        let chunk = parse_dhdl_str(FIXTURE, 298.15, Path::new("md1.xvg")).unwrap();
        // the incomplete 0.6 row is gone
        assert_eq!(chunk.dhdl.len(), 3);
        assert_eq!(chunk.u_nk.len(), 3);
        assert_eq!(chunk.dhdl.times, vec![0.0, 0.2, 0.4]);
    }

    #[test]
    fn dhdl_columns_carry_state_and_reduced_units() {
        let chunk = parse_dhdl_str(FIXTURE, 298.15, Path::new("md1.xvg")).unwrap();
        let dhdl = &chunk.dhdl;
        assert_eq!(dhdl.columns, vec!["coul-lambda", "vdw-lambda"]);
        assert_eq!(dhdl.state.index, Some(1));
        assert_eq!(
            dhdl.state.coords,
            vec![
                ("coul-lambda".to_string(), 0.5),
                ("vdw-lambda".to_string(), 0.0)
            ]
        );
        assert!((dhdl.values[0][0] - beta() * 8.0).abs() < 1e-12);
        assert!((dhdl.values[2][1] - beta() * 3.0).abs() < 1e-12);
    }

    #[test]
    fn u_nk_combines_energy_delta_h_and_pv() {
        let chunk = parse_dhdl_str(FIXTURE, 298.15, Path::new("md1.xvg")).unwrap();
        let u_nk = &chunk.u_nk;
        assert_eq!(u_nk.columns.len(), 3);
        assert_eq!(u_nk.columns[0], "(0.0000, 0.0000)");
        // row 0, target 0: beta * (E + dH + pV) = beta * (-100.0 + 1.0 + 0.5)
        assert!((u_nk.values[0][0] - beta() * (-98.5)).abs() < 1e-12);
        // row 1, target 2: beta * (-101.0 - 1.1 + 0.5)
        assert!((u_nk.values[1][2] - beta() * (-101.6)).abs() < 1e-12);
    }

    #[test]
    fn interior_bad_row_is_a_parse_error() {
        let broken = FIXTURE.replace(
            "0.2000 -101.0 8.5 2.5 1.1 0.0 -1.1 0.5",
            "0.2000 -101.0 oops",
        );
        let res = parse_dhdl_str(&broken, 298.15, Path::new("md1.xvg"));
        assert!(matches!(res, Err(AnalysisError::Parse { .. })));
    }

    #[test]
    fn missing_legends_are_rejected() {
        let headerless = "0.0 1.0 2.0\n0.2 1.0 2.0\n";
        let res = parse_dhdl_str(headerless, 298.15, Path::new("md1.xvg"));
        assert!(matches!(res, Err(AnalysisError::Parse { .. })));
    }

    #[test]
    fn non_positive_temperature_is_invalid() {
        let res = parse_dhdl_str(FIXTURE, 0.0, Path::new("md1.xvg"));
        assert!(matches!(res, Err(AnalysisError::Invalid(_))));
    }

    #[test]
    fn file_roundtrip_via_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md1.xvg");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(FIXTURE.as_bytes()).unwrap();

        let chunk = parse_dhdl_file(&path, 298.15).unwrap();
        assert_eq!(chunk.dhdl.len(), 3);
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let res = parse_dhdl_file(Path::new("/no/such/file.xvg"), 298.15);
        assert!(matches!(res, Err(AnalysisError::Parse { .. })));
    }
}
