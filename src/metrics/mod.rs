//! Performance metrics module.
//!
//! Statistics over the business-day PnL of a backtest:
//! - Mean, sample std-dev, hit rate
//! - Information ratio, Sortino ratio
//! - Rolling portfolio volatility
//! - Maximum drawdown of cumulative PnL

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, MonthlyPnl, PerformanceMetrics};
