//! Performance metrics calculator.
//!
//! Calculates PnL statistics over the defined business days of a backtest.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::{BacktestResult, PnlPoint};
use crate::num::Num;
use crate::signal::ewm::ewm_std;
use crate::signal::TRADING_DAYS_PER_YEAR;

/// PnL statistics of a backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Business days with a defined PnL.
    pub sample_days: usize,

    // PnL statistics
    pub pnl_mean: Num,
    pub pnl_std: Num,
    pub total_pnl: f64,
    pub hit_rate: Num,

    // Risk-adjusted
    pub information_ratio: Num,
    pub sortino_ratio: Num,

    /// Decayed std-dev of daily PnL as of the last day.
    pub latest_rolling_portfolio_vol: Num,

    // Drawdown of cumulative PnL
    pub max_drawdown: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub drawdown_duration_days: i64,
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Sample Days: {}\n\
             Total PnL: ${:.2}\n\
             Mean Daily PnL: ${:.2}\n\
             PnL Std Dev: ${:.2}\n\
             Hit Rate: {:.1}%\n\
             \n\
             Information Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             Rolling Portfolio Vol: ${:.2}\n\
             \n\
             Max Drawdown: ${:.2} ({})",
            self.sample_days,
            self.total_pnl,
            self.pnl_mean,
            self.pnl_std,
            self.hit_rate * 100.0,
            self.information_ratio,
            self.sortino_ratio,
            self.latest_rolling_portfolio_vol,
            self.max_drawdown,
            self.max_drawdown_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
        )
    }
}

/// Drawdown analysis details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub peak_date: Option<NaiveDate>,
    pub duration_days: i64,
    pub drawdown_periods: usize,
}

/// PnL of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub year: i32,
    pub month: u32,
    pub pnl: f64,
    pub days: usize,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from a backtest result.
    pub fn calculate(result: &BacktestResult) -> PerformanceMetrics {
        let pnl = result.defined_pnl();

        let pnl_mean = Num::new(pnl.iter().mean());
        let pnl_std = Num::new(pnl.iter().std_dev());
        let information_ratio = Self::information_ratio(pnl_mean, pnl_std);
        let sortino_ratio = Self::calculate_sortino(&pnl);

        let hit_rate = if pnl.is_empty() {
            Num::UNDEFINED
        } else {
            Num::new(pnl.iter().filter(|&&p| p > 0.0).count() as f64 / pnl.len() as f64)
        };

        let daily: Vec<Num> = result.daily_pnl.iter().map(|p| p.pnl).collect();
        let latest_rolling_portfolio_vol = ewm_std(&daily, result.vol_halflife_days)
            .last()
            .copied()
            .unwrap_or(Num::UNDEFINED);

        let drawdown = Self::analyze_drawdown(&result.daily_pnl);

        PerformanceMetrics {
            sample_days: pnl.len(),
            pnl_mean,
            pnl_std,
            total_pnl: pnl.iter().sum(),
            hit_rate,
            information_ratio,
            sortino_ratio,
            latest_rolling_portfolio_vol,
            max_drawdown: drawdown.max_drawdown,
            max_drawdown_date: drawdown.max_drawdown_date,
            drawdown_duration_days: drawdown.duration_days,
        }
    }

    /// Annualized mean over std-dev; undefined for a zero or undefined std.
    pub fn information_ratio(mean: Num, std: Num) -> Num {
        mean / std * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Analyze drawdown of cumulative PnL. Undefined days are skipped.
    pub fn analyze_drawdown(daily_pnl: &[PnlPoint]) -> DrawdownAnalysis {
        let mut defined = daily_pnl
            .iter()
            .filter_map(|p| p.pnl.value().map(|v| (p.date, v)));
        let Some((first_date, first_pnl)) = defined.next() else {
            return DrawdownAnalysis::default();
        };

        let mut cumulative = first_pnl;
        // The curve starts from zero before the first day.
        let mut peak = cumulative.max(0.0);
        let mut peak_date = first_date;
        let mut max_drawdown = (peak - cumulative).max(0.0);
        let mut max_drawdown_date = (max_drawdown > 0.0).then_some(first_date);
        let mut drawdown_start: Option<NaiveDate> = (max_drawdown > 0.0).then_some(first_date);
        let mut max_duration = 0i64;
        let mut periods = 0;

        for (date, pnl) in defined {
            cumulative += pnl;
            if cumulative > peak {
                if drawdown_start.is_some() {
                    periods += 1;
                }
                peak = cumulative;
                peak_date = date;
                drawdown_start = None;
                continue;
            }

            let drawdown = peak - cumulative;
            let start = *drawdown_start.get_or_insert(date);
            let duration = (date - start).num_days();
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_drawdown_date = Some(date);
                max_duration = duration;
            }
        }
        if drawdown_start.is_some() {
            periods += 1;
        }

        DrawdownAnalysis {
            max_drawdown,
            max_drawdown_date,
            peak_date: Some(peak_date),
            duration_days: max_duration,
            drawdown_periods: periods,
        }
    }

    /// Sortino ratio (downside deviation), annualized.
    fn calculate_sortino(pnl: &[f64]) -> Num {
        if pnl.len() < 2 {
            return Num::UNDEFINED;
        }
        let mean = pnl.iter().mean();
        let downside_variance =
            pnl.iter().filter(|&&p| p < 0.0).map(|p| p.powi(2)).sum::<f64>() / pnl.len() as f64;

        Num::new(mean) / Num::new(downside_variance.sqrt()) * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Sum of defined daily PnL per calendar month.
    pub fn monthly_pnl(result: &BacktestResult) -> Vec<MonthlyPnl> {
        let mut monthly: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
        for point in &result.daily_pnl {
            if let Some(pnl) = point.pnl.value() {
                let entry = monthly
                    .entry((point.date.year(), point.date.month()))
                    .or_default();
                entry.0 += pnl;
                entry.1 += 1;
            }
        }

        monthly
            .into_iter()
            .map(|((year, month), (pnl, days))| MonthlyPnl {
                year,
                month,
                pnl,
                days,
            })
            .collect()
    }
}
