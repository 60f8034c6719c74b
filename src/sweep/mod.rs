//! Parameter sweep module.
//!
//! Backtests every combination of a grid of half-lives and score weights and
//! ranks them by information ratio.

pub mod optimizer;

pub use optimizer::{ParameterGrid, ParameterSet, ParameterSweep, SweepEntry, SweepResult};
