//! Results-report building and writing.

pub mod format;

pub use format::*;
