//! Mathematical utilities: descriptive statistics and small linear algebra helpers.

pub mod linalg;
pub mod stats;

pub use linalg::*;
pub use stats::*;
