//! Parameter sweep.
//!
//! Grid search over decay half-lives and score weights. Every combination is
//! backtested on the same preloaded series and ranked by information ratio.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PipelineConfig;
use crate::data::PriceSeries;
use crate::error::SignalResult;
use crate::metrics::PerformanceMetrics;
use crate::pipeline::run_backtest;

/// Parameter values to sweep. An empty list keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterGrid {
    #[serde(default)]
    pub mean_halflife_days: Vec<f64>,
    #[serde(default)]
    pub signal_vol_halflife_days: Vec<f64>,
    #[serde(default)]
    pub vol_halflife_days: Vec<f64>,
    #[serde(default)]
    pub equity_score_weight: Vec<f64>,
    #[serde(default)]
    pub fixed_income_score_weight: Vec<f64>,
}

impl ParameterGrid {
    /// Calculate total number of parameter combinations.
    pub fn total_combinations(&self) -> usize {
        [
            &self.mean_halflife_days,
            &self.signal_vol_halflife_days,
            &self.vol_halflife_days,
            &self.equity_score_weight,
            &self.fixed_income_score_weight,
        ]
        .iter()
        .map(|axis| axis.len().max(1))
        .product()
    }

    /// Generate all parameter combinations around a base configuration.
    pub fn combinations(&self, base: &PipelineConfig) -> Vec<ParameterSet> {
        let mean = axis(&self.mean_halflife_days, base.signal.mean_halflife_days);
        let signal_vol = axis(
            &self.signal_vol_halflife_days,
            base.signal.signal_vol_halflife_days,
        );
        let vol = axis(&self.vol_halflife_days, base.signal.vol_halflife_days);
        let eq = axis(&self.equity_score_weight, base.sizing.equity_score_weight);
        let fi = axis(
            &self.fixed_income_score_weight,
            base.sizing.fixed_income_score_weight,
        );

        let mut combos = Vec::with_capacity(self.total_combinations());
        for &mean_halflife_days in &mean {
            for &signal_vol_halflife_days in &signal_vol {
                for &vol_halflife_days in &vol {
                    for &equity_score_weight in &eq {
                        for &fixed_income_score_weight in &fi {
                            combos.push(ParameterSet {
                                mean_halflife_days,
                                signal_vol_halflife_days,
                                vol_halflife_days,
                                equity_score_weight,
                                fixed_income_score_weight,
                            });
                        }
                    }
                }
            }
        }
        combos
    }
}

fn axis(values: &[f64], base: f64) -> Vec<f64> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

/// A single parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub mean_halflife_days: f64,
    pub signal_vol_halflife_days: f64,
    pub vol_halflife_days: f64,
    pub equity_score_weight: f64,
    pub fixed_income_score_weight: f64,
}

impl ParameterSet {
    /// Apply this parameter set to a pipeline config.
    pub fn apply_to_config(&self, config: &mut PipelineConfig) {
        config.signal.mean_halflife_days = self.mean_halflife_days;
        config.signal.signal_vol_halflife_days = self.signal_vol_halflife_days;
        config.signal.vol_halflife_days = self.vol_halflife_days;
        config.sizing.equity_score_weight = self.equity_score_weight;
        config.sizing.fixed_income_score_weight = self.fixed_income_score_weight;
    }

    /// Create a unique key for this parameter set.
    pub fn key(&self) -> String {
        format!(
            "mean{}_sigvol{}_vol{}_eq{:.2}_fi{:.2}",
            self.mean_halflife_days,
            self.signal_vol_halflife_days,
            self.vol_halflife_days,
            self.equity_score_weight,
            self.fixed_income_score_weight
        )
    }
}

/// Backtest outcome of one parameter set.
#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub params: ParameterSet,
    pub metrics: PerformanceMetrics,
}

/// All sweep outcomes, best information ratio first.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub entries: Vec<SweepEntry>,
}

impl SweepResult {
    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get summary string.
    pub fn summary(&self) -> String {
        let defined = self
            .entries
            .iter()
            .filter(|e| e.metrics.information_ratio.is_defined())
            .count();
        format!(
            "Parameter Sweep: {} combinations ({} with a defined IR)\n\
             Best: {} (IR {:.2})",
            self.entries.len(),
            defined,
            self.best()
                .map(|e| e.params.key())
                .unwrap_or_else(|| "n/a".to_string()),
            self.best()
                .map(|e| e.metrics.information_ratio)
                .unwrap_or_default(),
        )
    }
}

/// Sequential grid search over preloaded series.
pub struct ParameterSweep {
    base: PipelineConfig,
    grid: ParameterGrid,
}

impl ParameterSweep {
    pub fn new(base: PipelineConfig, grid: ParameterGrid) -> Self {
        Self { base, grid }
    }

    /// Sweep the grid carried by the configuration's `[sweep]` section.
    pub fn from_config(base: PipelineConfig) -> Self {
        let grid = base.sweep.clone().unwrap_or_default();
        Self::new(base, grid)
    }

    pub fn total_combinations(&self) -> usize {
        self.grid.total_combinations()
    }

    pub fn run(&self, series: &BTreeMap<String, PriceSeries>) -> SignalResult<SweepResult> {
        self.run_with_progress(series, |_, _| {})
    }

    /// Run every combination, calling `on_done(done, total)` after each.
    pub fn run_with_progress(
        &self,
        series: &BTreeMap<String, PriceSeries>,
        mut on_done: impl FnMut(usize, usize),
    ) -> SignalResult<SweepResult> {
        let combos = self.grid.combinations(&self.base);
        let total = combos.len();
        info!("Parameter combinations: {}", total);

        let mut entries = Vec::with_capacity(total);
        for (i, params) in combos.into_iter().enumerate() {
            let mut config = self.base.clone();
            params.apply_to_config(&mut config);
            config.validate()?;

            let report = run_backtest(&config, series)?;
            entries.push(SweepEntry {
                params,
                metrics: report.metrics,
            });

            on_done(i + 1, total);
            if (i + 1) % (total / 10).max(1) == 0 || i + 1 == total {
                info!(
                    "  {:.0}% ({}/{} combinations)",
                    (i + 1) as f64 / total as f64 * 100.0,
                    i + 1,
                    total
                );
            }
        }

        entries.sort_by(|a, b| {
            rank_by_information_ratio(
                a.metrics.information_ratio.value(),
                b.metrics.information_ratio.value(),
            )
        });

        if let Some(best) = entries.first() {
            info!(
                "Best params = {}, IR = {:.2}",
                best.params.key(),
                best.metrics.information_ratio
            );
        }

        Ok(SweepResult { entries })
    }
}

/// Descending; undefined ratios sort last.
fn rank_by_information_ratio(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
