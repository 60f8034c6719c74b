pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod num;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod signal;
pub mod sweep;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult};
pub use config::{ConfigError, InstrumentRoles, PipelineConfig};
pub use data::{PriceFileLoader, PricePoint, PriceSeries};
pub use error::{SignalError, SignalResult};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use num::Num;
pub use pipeline::{BacktestReport, SignalReport};
pub use report::ReportFormatter;
pub use risk::{PositionSizer, SizingConfig, Target, TargetKind};
pub use signal::{SignalEngine, SignalParams, SignalState};
pub use sweep::{ParameterGrid, ParameterSweep};
pub use validation::SeriesValidator;
