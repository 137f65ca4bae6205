//! Input/output helpers.
//!
//! - natural-order dhdl file listing (`listing`)
//! - GROMACS dhdl `.xvg` parsing (`xvg`)
//! - preprocessed-data cache read/write (`cache`)
//! - CSV export of finalized datasets (`export`)

pub mod cache;
pub mod export;
pub mod listing;
pub mod xvg;

pub use cache::*;
pub use export::*;
pub use listing::*;
pub use xvg::*;
