//! Per-state segmentation of replica-output chunks.
//!
//! Replica-exchange runs write one dhdl file per simulation segment, and a
//! restarted segment repeats the time frames around the restart point. The
//! segmenter folds the naturally ordered chunk stream into one finalized
//! dataset per thermodynamic state:
//!
//! - a chunk whose first timestamp is `0` marks the start of a new state's
//!   trajectory and flushes the buffered chunks of the previous state
//! - consecutive chunks of the same state are joined after trimming the
//!   predecessor's rows that the successor repeats
//!
//! The fold is explicit and pure: it owns its accumulation buffer, touches no
//! files, and hands each concatenated state to a caller-supplied finalizer
//! (in the pipeline: the equilibration filter).

use tracing::warn;

use crate::domain::{ReplicaChunk, SeriesBlock};
use crate::error::{AnalysisError, AnalysisResult};

/// Relative slack when checking that an overlap spans a whole number of
/// sample steps. Timestamps parsed from `%.4f` text carry ~1e-12 of float
/// noise; genuinely inconsistent files are off by a large fraction of `dt`.
const INTEGRALITY_TOL: f64 = 1e-6;

/// A time-keyed block of rows that the segmenter can buffer, trim and join.
///
/// `ReplicaChunk` implements this by delegating to both of its series, so the
/// dhdl and u_nk streams stay in lockstep through every trim decision.
pub trait TimeBlock: Sized {
    fn len(&self) -> usize;
    fn first_time(&self) -> Option<f64>;
    fn last_time(&self) -> Option<f64>;
    /// Drop the last `n` rows (saturating).
    fn truncate_tail(&mut self, n: usize);
    /// Append `other`'s rows after this block's rows.
    fn extend_rows(&mut self, other: Self);
    /// Whether `other` can continue this block's series (same state, same layout).
    fn same_series(&self, other: &Self) -> bool;
}

impl TimeBlock for SeriesBlock {
    fn len(&self) -> usize {
        SeriesBlock::len(self)
    }

    fn first_time(&self) -> Option<f64> {
        SeriesBlock::first_time(self)
    }

    fn last_time(&self) -> Option<f64> {
        SeriesBlock::last_time(self)
    }

    fn truncate_tail(&mut self, n: usize) {
        SeriesBlock::truncate_tail(self, n);
    }

    fn extend_rows(&mut self, other: Self) {
        SeriesBlock::extend_rows(self, other);
    }

    fn same_series(&self, other: &Self) -> bool {
        self.state == other.state && self.columns == other.columns
    }
}

impl TimeBlock for ReplicaChunk {
    fn len(&self) -> usize {
        self.dhdl.len()
    }

    fn first_time(&self) -> Option<f64> {
        self.dhdl.first_time()
    }

    fn last_time(&self) -> Option<f64> {
        self.dhdl.last_time()
    }

    fn truncate_tail(&mut self, n: usize) {
        self.dhdl.truncate_tail(n);
        self.u_nk.truncate_tail(n);
    }

    fn extend_rows(&mut self, other: Self) {
        self.dhdl.extend_rows(other.dhdl);
        self.u_nk.extend_rows(other.u_nk);
    }

    fn same_series(&self, other: &Self) -> bool {
        TimeBlock::same_series(&self.dhdl, &other.dhdl)
            && TimeBlock::same_series(&self.u_nk, &other.u_nk)
    }
}

/// Stateful fold that turns an ordered chunk stream into finalized per-state
/// datasets.
///
/// `finalize` receives each state's concatenated, trimmed block and produces
/// whatever the caller wants to keep (the pipeline runs the equilibration
/// filter there). Chunks are buffered only within the current state segment.
pub struct Segmenter<C, T, F>
where
    C: TimeBlock,
    F: FnMut(C) -> AnalysisResult<T>,
{
    dt: f64,
    buffer: Vec<C>,
    finalized: Vec<T>,
    finalize: F,
}

impl<C, T, F> Segmenter<C, T, F>
where
    C: TimeBlock,
    F: FnMut(C) -> AnalysisResult<T>,
{
    pub fn new(dt: f64, finalize: F) -> AnalysisResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AnalysisError::Invalid(format!(
                "time step must be a positive number, got {dt}"
            )));
        }
        Ok(Self {
            dt,
            buffer: Vec::new(),
            finalized: Vec::new(),
            finalize,
        })
    }

    /// Process the next chunk in file order.
    pub fn push(&mut self, chunk: C) -> AnalysisResult<()> {
        let lower_t = chunk.first_time().ok_or_else(|| {
            AnalysisError::MalformedTimeSeries("a chunk contains no rows".to_string())
        })?;

        let Some(prev) = self.buffer.last() else {
            // First chunk of the run: the first state is implicit, whatever
            // its starting timestamp is.
            self.buffer.push(chunk);
            return Ok(());
        };

        if lower_t == 0.0 {
            // Start-of-state marker: flush everything buffered so far and
            // begin a fresh segment with this chunk.
            self.finalize_buffer()?;
            self.buffer.push(chunk);
            return Ok(());
        }

        // Continuation of the current state.
        if !prev.same_series(&chunk) {
            return Err(AnalysisError::MalformedTimeSeries(format!(
                "chunk starting at t={lower_t} continues a segment but its \
                 state or column layout differs from the previous chunk"
            )));
        }
        let upper_t = prev.last_time().ok_or_else(|| {
            AnalysisError::MalformedTimeSeries(
                "previous chunk has no rows left to join against".to_string(),
            )
        })?;

        let ratio = (upper_t - lower_t) / self.dt;
        if (ratio - ratio.round()).abs() > INTEGRALITY_TOL {
            return Err(AnalysisError::MalformedTimeSeries(format!(
                "overlap from t={lower_t} to t={upper_t} is not a whole number \
                 of dt={} steps; the files disagree on the sampling interval",
                self.dt
            )));
        }

        // +1 because the predecessor's row at exactly `lower_t` is repeated too.
        let n_discard = ratio.round() as i64 + 1;
        if n_discard >= prev.len() as i64 {
            warn!(
                "overlap trim at t={lower_t} removes all {} rows of the previous chunk",
                prev.len()
            );
            self.buffer.pop();
        } else if n_discard > 0 {
            if let Some(prev) = self.buffer.last_mut() {
                prev.truncate_tail(n_discard as usize);
            }
        } else if n_discard < 0 {
            warn!(
                "gap between t={upper_t} and t={lower_t}: chunks joined without trimming"
            );
        }

        self.buffer.push(chunk);
        Ok(())
    }

    /// Flush the final state segment and return all finalized datasets.
    pub fn finish(mut self) -> AnalysisResult<Vec<T>> {
        if self.buffer.is_empty() && self.finalized.is_empty() {
            return Err(AnalysisError::EmptyInput(
                "no chunks were provided to the segmenter".to_string(),
            ));
        }
        self.finalize_buffer()?;
        Ok(self.finalized)
    }

    fn finalize_buffer(&mut self) -> AnalysisResult<()> {
        let mut blocks = std::mem::take(&mut self.buffer).into_iter();
        let Some(mut merged) = blocks.next() else {
            return Ok(());
        };
        for block in blocks {
            merged.extend_rows(block);
        }
        let out = (self.finalize)(merged)?;
        self.finalized.push(out);
        Ok(())
    }
}
