//! `remd-free-energy` library crate.
//!
//! The binary (`remd-fe`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future batch drivers, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod estimators;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod segment;
pub mod subsample;
pub mod synth;
