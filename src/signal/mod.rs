//! Signal computation: decayed estimators, daily projections, as-of join
//! and the per-symbol signal engine.

pub mod asof;
pub mod engine;
pub mod ewm;
pub mod resample;

pub use asof::AsOfTable;
pub use engine::{
    SignalEngine, SignalParams, SignalSeries, SignalState, TRADING_DAYS_PER_YEAR, ZSCORE_CLIP,
};
pub use resample::DailyGrid;
