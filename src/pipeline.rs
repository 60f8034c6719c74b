//! One run of the signal pipeline.
//!
//! Loads and splices every monitored symbol, computes signal states, sizes
//! the two traded proxies and, for backtests, replays the whole history.
//! Missing symbols and invalid configuration abort the run; insufficient
//! history only degrades the outputs that depend on it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::backtest::{BacktestEngine, BacktestResult};
use crate::config::PipelineConfig;
use crate::data::{splice_symbol, LoaderError, PriceFileLoader, PriceSeries, RawPriceData};
use crate::error::{SignalError, SignalResult};
use crate::metrics::{MetricsCalculator, PerformanceMetrics};
use crate::num::Num;
use crate::risk::{PositionSizer, SignalSnapshot, TargetKind};
use crate::signal::{SignalEngine, SignalSeries};

/// Spliced series keyed by symbol.
pub type SplicedData = BTreeMap<String, PriceSeries>;

/// Target of one traded leg. Fields that could not be computed are undefined
/// and `reason` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub kind: TargetKind,
    pub instrument: String,
    pub target_position: Num,
    pub directional_score: Num,
    pub realized_daily_dollar_vol: Num,
    pub reason: Option<String>,
}

/// Latest signal state of one monitored instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub instrument: String,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_price: Num,
    pub z_score: Num,
    pub annualized_pct_volatility: Num,
    pub realized_daily_vol: Num,
}

/// Output of a live signal run.
#[derive(Debug, Clone, Serialize)]
pub struct SignalReport {
    /// Latest observation across the monitored instruments.
    pub as_of: Option<DateTime<Utc>>,
    pub summary: Vec<SummaryRow>,
    pub detail: Vec<DetailRow>,
}

/// Output of a backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub metrics: PerformanceMetrics,
}

/// Load the raw files of every monitored symbol. A symbol without a daily
/// file is missing data.
pub fn load_raw(config: &PipelineConfig, loader: &PriceFileLoader) -> SignalResult<RawPriceData> {
    let mut raw = RawPriceData::new();
    for symbol in config.instruments.monitored() {
        match loader.load_raw(std::slice::from_ref(&symbol)) {
            Ok(mut loaded) => raw.append(&mut loaded),
            Err(LoaderError::FileNotFound(path)) => {
                return Err(SignalError::MissingData(format!("{} ({})", symbol, path)));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(raw)
}

/// Splice every requested symbol.
pub fn splice_all(symbols: &[String], raw: &RawPriceData) -> SignalResult<SplicedData> {
    let mut spliced = SplicedData::new();
    for symbol in symbols {
        let series = splice_symbol(symbol, raw)?;
        info!(
            symbol = symbol.as_str(),
            observations = series.len(),
            "spliced series"
        );
        spliced.insert(symbol.clone(), series);
    }
    Ok(spliced)
}

/// Load and splice every monitored symbol.
pub fn load_spliced(config: &PipelineConfig, loader: &PriceFileLoader) -> SignalResult<SplicedData> {
    let raw = load_raw(config, loader)?;
    splice_all(&config.instruments.monitored(), &raw)
}

/// Live signals: one engine pass per monitored symbol, then the sizer on
/// each symbol's latest state.
pub fn run_signals(config: &PipelineConfig, spliced: &SplicedData) -> SignalResult<SignalReport> {
    config.validate()?;
    let engine = SignalEngine::new(config.signal)?;
    let sizer = PositionSizer::new(config.sizing.clone(), config.instruments.clone())?;

    let mut signals: Vec<SignalSeries> = Vec::new();
    for symbol in config.instruments.monitored() {
        let series = spliced
            .get(&symbol)
            .ok_or_else(|| SignalError::MissingData(symbol.clone()))?;
        signals.push(engine.compute(series));
    }

    let snapshot: SignalSnapshot = signals
        .iter()
        .filter_map(|s| s.latest().map(|st| (s.symbol().to_string(), st.into())))
        .collect();

    let summary: Vec<SummaryRow> = sizer
        .targets(&snapshot)
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(target) => SummaryRow {
                kind: outcome.kind,
                instrument: outcome.instrument,
                target_position: Num::new(target.position),
                directional_score: Num::new(target.directional_score),
                realized_daily_dollar_vol: Num::new(target.volatility_estimate),
                reason: None,
            },
            Err(e) => SummaryRow {
                kind: outcome.kind,
                directional_score: sizer.score(outcome.kind, &snapshot).ok().into(),
                realized_daily_dollar_vol: sizer
                    .dollar_volatility(&outcome.instrument, &snapshot)
                    .ok()
                    .into(),
                instrument: outcome.instrument,
                target_position: Num::UNDEFINED,
                reason: Some(e.to_string()),
            },
        })
        .collect();

    let detail: Vec<DetailRow> = signals.iter().map(detail_row).collect();
    let as_of = detail.iter().filter_map(|d| d.last_timestamp).max();

    for row in summary.iter().filter(|r| r.reason.is_some()) {
        warn!(
            instrument = row.instrument.as_str(),
            leg = row.kind.label(),
            "target degraded"
        );
    }
    info!(?as_of, targets = summary.len(), "signals computed");

    Ok(SignalReport {
        as_of,
        summary,
        detail,
    })
}

fn detail_row(signals: &SignalSeries) -> DetailRow {
    match signals.latest() {
        Some(state) => DetailRow {
            instrument: signals.symbol().to_string(),
            last_timestamp: Some(state.timestamp),
            last_price: Num::new(state.price),
            z_score: state.z_score,
            annualized_pct_volatility: state.annualized_pct_volatility,
            realized_daily_vol: state.realized_volatility,
        },
        None => DetailRow {
            instrument: signals.symbol().to_string(),
            last_timestamp: None,
            last_price: Num::UNDEFINED,
            z_score: Num::UNDEFINED,
            annualized_pct_volatility: Num::UNDEFINED,
            realized_daily_vol: Num::UNDEFINED,
        },
    }
}

/// Historical replay plus PnL statistics.
pub fn run_backtest(config: &PipelineConfig, spliced: &SplicedData) -> SignalResult<BacktestReport> {
    config.validate()?;
    let sizer = PositionSizer::new(config.sizing.clone(), config.instruments.clone())?;
    let engine = BacktestEngine::new(config.signal, sizer, config.backtest)?;

    let result = engine.run(spliced)?;
    let metrics = MetricsCalculator::calculate(&result);
    info!(
        sample_days = metrics.sample_days,
        information_ratio = %metrics.information_ratio,
        "backtest metrics"
    );
    Ok(BacktestReport { result, metrics })
}
