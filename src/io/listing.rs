//! Natural-order listing of dhdl files.
//!
//! REMD output directories contain files like `md0.xvg`, `md2.xvg`,
//! `md10.xvg` (possibly with backup suffixes, hence the `*.xvg*` match).
//! Lexicographic order would interleave `md10` between `md1` and `md2`, so
//! the listing compares numeric runs by value.

use std::cmp::Ordering;
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use crate::error::{AnalysisError, AnalysisResult};

/// All `*.xvg*` files directly under `dir`, in natural ascending order.
pub fn list_dhdl_files(dir: &Path) -> AnalysisResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AnalysisError::Invalid(format!("cannot read directory '{}': {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().contains(".xvg") {
            files.push(path);
        }
    }

    files.sort_by(|a, b| {
        natural_cmp(
            &a.file_name().unwrap_or_default().to_string_lossy(),
            &b.file_name().unwrap_or_default().to_string_lossy(),
        )
    });
    Ok(files)
}

/// Compare two names treating runs of digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    match na.cmp(&nb) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                } else {
                    match ca.cmp(&cb) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        ord => return ord,
                    }
                }
            }
        }
    }
}

fn take_number(it: &mut Peekable<Chars<'_>>) -> u128 {
    let mut n: u128 = 0;
    while let Some(d) = it.peek().and_then(|c| c.to_digit(10)) {
        n = n * 10 + u128::from(d);
        it.next();
    }
    n
}
