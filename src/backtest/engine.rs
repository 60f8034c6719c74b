//! Core backtesting engine.
//!
//! Replays the signal and sizing pipeline over the full history:
//! 1. Compute signal states for every monitored symbol
//! 2. Align z-scores, volatilities and prices onto the equity proxy's grid
//! 3. Size both legs at every grid instant from point-in-time information
//! 4. Mark each target to the next instant's price change
//! 5. Sum the portfolio PnL per business day

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::PriceSeries;
use crate::error::{SignalError, SignalResult};
use crate::num::Num;
use crate::risk::{InstrumentSignal, PositionSizer, SignalSnapshot, TargetKind};
use crate::signal::resample::business_daily_sum;
use crate::signal::{AsOfTable, DailyGrid, SignalEngine, SignalParams};

/// Configuration for backtest execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    /// Clip z-scores to [-2, 2] during the replay. Independent of the live
    /// signal setting.
    pub clip_zscore: bool,
}

/// Realized PnL of one business day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    pub date: NaiveDate,
    pub pnl: Num,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Configuration used.
    pub config: BacktestConfig,

    /// Half-life used for the rolling portfolio volatility.
    pub vol_halflife_days: f64,

    /// Instruments traded.
    pub instruments: Vec<String>,

    /// First instant of the master grid.
    pub start: Option<DateTime<Utc>>,

    /// Last instant of the master grid.
    pub end: Option<DateTime<Utc>>,

    /// Number of instants on the master grid.
    pub grid_points: usize,

    /// Portfolio PnL per business day.
    pub daily_pnl: Vec<PnlPoint>,

    /// Per-instrument PnL per business day.
    pub instrument_pnl: BTreeMap<String, Vec<PnlPoint>>,
}

impl BacktestResult {
    /// PnL of the business days that have one, in date order.
    pub fn defined_pnl(&self) -> Vec<f64> {
        self.daily_pnl.iter().filter_map(|p| p.pnl.value()).collect()
    }

    /// Number of business days with a defined PnL.
    pub fn trading_days(&self) -> usize {
        self.daily_pnl.iter().filter(|p| p.pnl.is_defined()).count()
    }

    /// Sum of all defined daily PnL.
    pub fn total_pnl(&self) -> f64 {
        self.defined_pnl().iter().sum()
    }

    /// Sum of defined daily PnL of one instrument.
    pub fn instrument_total(&self, instrument: &str) -> Num {
        let Some(points) = self.instrument_pnl.get(instrument) else {
            return Num::UNDEFINED;
        };
        points.iter().fold(Num::UNDEFINED, |acc, p| accumulate(acc, p.pnl))
    }
}

/// The main backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
    signal_engine: SignalEngine,
    sizer: PositionSizer,
}

impl BacktestEngine {
    /// Create an engine; the signal engine clips according to the backtest
    /// flag rather than the live one.
    pub fn new(
        params: SignalParams,
        sizer: PositionSizer,
        config: BacktestConfig,
    ) -> SignalResult<Self> {
        let signal_engine = SignalEngine::new(params)?.with_clipping(config.clip_zscore);
        Ok(Self {
            config,
            signal_engine,
            sizer,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the replay over spliced series keyed by symbol.
    pub fn run(&self, series: &BTreeMap<String, PriceSeries>) -> SignalResult<BacktestResult> {
        let roles = self.sizer.roles();
        let tables = self.signal_tables(series)?;

        let master = series
            .get(&roles.equity_proxy)
            .ok_or_else(|| SignalError::MissingData(roles.equity_proxy.clone()))?;
        let grid = master.timestamps();

        let positions = self.replay_positions(&grid, &tables);

        let mut instrument_instant: BTreeMap<String, Vec<Num>> = BTreeMap::new();
        for (k, kind) in TargetKind::ALL.iter().enumerate() {
            let instrument = self.sizer.instrument(*kind);
            let multiplier = self.sizer.config().multiplier(instrument)?;
            let prices = aligned_prices(instrument, series.get(instrument), &grid);
            let leg = leg_pnl(&prices, &positions[k], multiplier);

            let merged = instrument_instant
                .entry(instrument.to_string())
                .or_insert_with(|| vec![Num::UNDEFINED; grid.len()]);
            for (acc, v) in merged.iter_mut().zip(leg) {
                *acc = accumulate(*acc, v);
            }
        }

        let portfolio: Vec<Num> = (0..grid.len())
            .map(|i| {
                instrument_instant
                    .values()
                    .fold(Num::UNDEFINED, |acc, leg| accumulate(acc, leg[i]))
            })
            .collect();

        let daily_pnl = to_points(&business_daily_sum(&grid, &portfolio));
        let instrument_pnl: BTreeMap<String, Vec<PnlPoint>> = instrument_instant
            .iter()
            .map(|(instr, pnl)| (instr.clone(), to_points(&business_daily_sum(&grid, pnl))))
            .collect();

        let result = BacktestResult {
            config: self.config,
            vol_halflife_days: self.signal_engine.params().vol_halflife_days,
            instruments: roles.traded(),
            start: grid.first().copied(),
            end: grid.last().copied(),
            grid_points: grid.len(),
            daily_pnl,
            instrument_pnl,
        };

        info!(
            grid_points = result.grid_points,
            business_days = result.daily_pnl.len(),
            defined_days = result.trading_days(),
            "backtest complete"
        );

        Ok(result)
    }

    /// Z-score and realized volatility tables of every monitored symbol.
    fn signal_tables(
        &self,
        series: &BTreeMap<String, PriceSeries>,
    ) -> SignalResult<BTreeMap<String, (AsOfTable, AsOfTable)>> {
        let mut tables = BTreeMap::new();
        for symbol in self.sizer.roles().monitored() {
            let s = series
                .get(&symbol)
                .ok_or_else(|| SignalError::MissingData(symbol.clone()))?;
            let signals = self.signal_engine.compute(s);
            let z = signals.table(|st| st.z_score);
            let vol = signals.table(|st| st.realized_volatility);
            tables.insert(symbol, (z, vol));
        }
        Ok(tables)
    }

    /// Target position of each leg at every grid instant, sized from the
    /// signal values known at that instant.
    fn replay_positions(
        &self,
        grid: &[DateTime<Utc>],
        tables: &BTreeMap<String, (AsOfTable, AsOfTable)>,
    ) -> Vec<Vec<Num>> {
        let mut snapshot: SignalSnapshot = tables
            .keys()
            .map(|s| (s.clone(), InstrumentSignal::default()))
            .collect();
        let mut positions = vec![Vec::with_capacity(grid.len()); TargetKind::ALL.len()];
        let mut unsized_legs = 0usize;

        for &t in grid {
            for (symbol, signal) in snapshot.iter_mut() {
                if let Some((z, vol)) = tables.get(symbol) {
                    signal.z_score = z.lookup(t);
                    signal.realized_volatility = vol.lookup(t);
                }
            }
            for (k, kind) in TargetKind::ALL.iter().enumerate() {
                let position = match self.sizer.target(*kind, &snapshot) {
                    Ok(target) => Num::new(target.position),
                    Err(_) => {
                        unsized_legs += 1;
                        Num::UNDEFINED
                    }
                };
                positions[k].push(position);
            }
        }

        debug!(
            instants = grid.len(),
            unsized_legs, "replayed point-in-time targets"
        );
        positions
    }
}

/// Prices of an instrument carried onto the master grid. An instrument whose
/// history does not overlap the grid contributes nothing.
fn aligned_prices(
    instrument: &str,
    series: Option<&PriceSeries>,
    grid: &[DateTime<Utc>],
) -> Vec<Num> {
    let undefined = || vec![Num::UNDEFINED; grid.len()];
    let (Some(series), Some(grid_start), Some(grid_end)) = (series, grid.first(), grid.last())
    else {
        return undefined();
    };
    let (Some(start), Some(end)) = (series.start(), series.end()) else {
        warn!(instrument, "no price history, PnL undefined");
        return undefined();
    };
    if start > *grid_end || end < *grid_start {
        warn!(instrument, "price history does not overlap the backtest window");
        return undefined();
    }

    AsOfTable::new(
        series
            .points()
            .iter()
            .map(|p| (p.timestamp, Num::new(p.price))),
    )
    .broadcast(grid)
}

/// pnl[T] = (price[T+1] - price[T]) * multiplier * position[T]. The last
/// instant has no forward change.
fn leg_pnl(prices: &[Num], positions: &[Num], multiplier: f64) -> Vec<Num> {
    let n = prices.len();
    (0..n)
        .map(|i| {
            if i + 1 < n {
                (prices[i + 1] - prices[i]) * multiplier * positions[i]
            } else {
                Num::UNDEFINED
            }
        })
        .collect()
}

/// Sum that ignores undefined terms; undefined only if every term is.
fn accumulate(acc: Num, value: Num) -> Num {
    match (acc.is_defined(), value.is_defined()) {
        (_, false) => acc,
        (false, true) => value,
        (true, true) => acc + value,
    }
}

fn to_points(grid: &DailyGrid) -> Vec<PnlPoint> {
    grid.days
        .iter()
        .zip(grid.values.iter())
        .map(|(&date, &pnl)| PnlPoint { date, pnl })
        .collect()
}
