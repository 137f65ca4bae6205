//! Error type shared across the analysis pipeline.
//!
//! Every variant carries enough context for a one-line terminal message, and
//! maps to a stable process exit code so shell scripts can distinguish
//! "bad invocation" from "bad data" from "estimator did not converge".

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No input files (or chunks) were found where some were required.
    #[error("no input data: {0}")]
    EmptyInput(String),

    /// The overlap-trim arithmetic did not produce a whole number of rows,
    /// or consecutive files of one state disagree on their layout.
    #[error("malformed time series: {0}")]
    MalformedTimeSeries(String),

    /// A dhdl file could not be parsed.
    #[error("failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CLI/configuration values.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A free-energy estimator failed (no samples, no convergence, ...).
    #[error("estimator failed: {0}")]
    Estimator(String),

    /// The preprocessed-data cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),

    /// The overlap-matrix heat map could not be rendered.
    #[error("plot error: {0}")]
    Plot(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

impl AnalysisError {
    /// Stable process exit code for this error.
    ///
    /// - 2: invocation / IO / parse problems
    /// - 3: data-quality problems (empty input, inconsistent timestamps)
    /// - 4: estimator failures
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::EmptyInput(_) | AnalysisError::MalformedTimeSeries(_) => 3,
            AnalysisError::Estimator(_) => 4,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(AnalysisError::EmptyInput("x".into()).exit_code(), 3);
        assert_eq!(AnalysisError::MalformedTimeSeries("x".into()).exit_code(), 3);
        assert_eq!(AnalysisError::Estimator("x".into()).exit_code(), 4);
        assert_eq!(AnalysisError::Invalid("x".into()).exit_code(), 2);
    }
}
