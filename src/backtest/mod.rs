//! Historical replay of the signal and sizing pipeline.
//!
//! Targets are recomputed at every instant of the equity proxy's native grid
//! from point-in-time signals, marked to the next instant's price change and
//! aggregated to business-day PnL.

pub mod engine;

pub use engine::{BacktestConfig, BacktestEngine, BacktestResult, PnlPoint};
