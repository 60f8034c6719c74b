//! Position sizing module.
//!
//! Turns z-scores into directional scores for the two traded proxies and
//! sizes each to a fixed USD risk budget:
//! - equity score = 1 + w_eq * (-z[vol index] + z[rates]) / 2
//! - bond score = 1 + w_fi * (-z[energy])
//! - position = score / (realized vol * contract multiplier / risk scaler)
//!
//! Higher realized volatility shrinks the position proportionally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::InstrumentRoles;
use crate::error::{SignalError, SignalResult};
use crate::num::Num;
use crate::signal::SignalState;

/// Position sizing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizingConfig {
    /// Weight of the vol-index/rates composite in the equity score.
    pub equity_score_weight: f64,
    /// Weight of the energy z-score in the bond score.
    pub fixed_income_score_weight: f64,
    /// Total USD risk budget per unit of score.
    pub risk_scaler: f64,
    /// USD value of one point of price movement, per instrument.
    pub contract_multipliers: BTreeMap<String, f64>,
}

impl SizingConfig {
    /// Check weights, risk scaler and multipliers for the traded proxies.
    pub fn validate(&self, roles: &InstrumentRoles) -> SignalResult<()> {
        if !(self.risk_scaler.is_finite() && self.risk_scaler > 0.0) {
            return Err(SignalError::InvalidParameter(format!(
                "risk_scaler must be positive, got {}",
                self.risk_scaler
            )));
        }
        for (name, weight) in [
            ("equity_score_weight", self.equity_score_weight),
            ("fixed_income_score_weight", self.fixed_income_score_weight),
        ] {
            if !weight.is_finite() {
                return Err(SignalError::InvalidParameter(format!(
                    "{} must be finite",
                    name
                )));
            }
        }
        for instrument in [&roles.equity_proxy, &roles.fixed_income_proxy] {
            let multiplier = self.multiplier(instrument)?;
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return Err(SignalError::InvalidParameter(format!(
                    "contract multiplier for {} must be positive, got {}",
                    instrument, multiplier
                )));
            }
        }
        Ok(())
    }

    /// Contract multiplier lookup; unknown instruments are a configuration
    /// error.
    pub fn multiplier(&self, instrument: &str) -> SignalResult<f64> {
        self.contract_multipliers
            .get(instrument)
            .copied()
            .ok_or_else(|| {
                SignalError::InvalidParameter(format!(
                    "no contract multiplier for {}",
                    instrument
                ))
            })
    }
}

/// The two traded legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Equity,
    FixedIncome,
}

impl TargetKind {
    pub const ALL: [TargetKind; 2] = [TargetKind::Equity, TargetKind::FixedIncome];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::FixedIncome => "fixed income",
        }
    }
}

/// The inputs the sizer reads from one instrument's signal state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InstrumentSignal {
    pub z_score: Num,
    pub realized_volatility: Num,
}

impl From<&SignalState> for InstrumentSignal {
    fn from(state: &SignalState) -> Self {
        Self {
            z_score: state.z_score,
            realized_volatility: state.realized_volatility,
        }
    }
}

/// Point-in-time signal inputs keyed by instrument.
pub type SignalSnapshot = BTreeMap<String, InstrumentSignal>;

/// A risk-scaled position target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub instrument: String,
    pub directional_score: f64,
    /// Realized daily dollar volatility per contract.
    pub volatility_estimate: f64,
    /// Target holding, in contracts.
    pub position: f64,
}

/// Outcome of sizing one leg; a failed leg does not affect the other.
#[derive(Debug)]
pub struct TargetOutcome {
    pub kind: TargetKind,
    pub instrument: String,
    pub result: SignalResult<Target>,
}

/// Position sizer for the two traded proxies.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
    roles: InstrumentRoles,
}

impl PositionSizer {
    pub fn new(config: SizingConfig, roles: InstrumentRoles) -> SignalResult<Self> {
        config.validate(&roles)?;
        Ok(Self { config, roles })
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    pub fn roles(&self) -> &InstrumentRoles {
        &self.roles
    }

    /// Instrument traded for a leg.
    pub fn instrument(&self, kind: TargetKind) -> &str {
        match kind {
            TargetKind::Equity => &self.roles.equity_proxy,
            TargetKind::FixedIncome => &self.roles.fixed_income_proxy,
        }
    }

    /// Directional score of a leg.
    pub fn score(&self, kind: TargetKind, snapshot: &SignalSnapshot) -> SignalResult<f64> {
        let target = self.instrument(kind);
        let score = match kind {
            TargetKind::Equity => {
                let vix = z_score(snapshot, &self.roles.volatility_index, target)?;
                let rates = z_score(snapshot, &self.roles.rates_instrument, target)?;
                1.0 + self.config.equity_score_weight * (-vix + rates) / 2.0
            }
            TargetKind::FixedIncome => {
                let energy = z_score(snapshot, &self.roles.energy_instrument, target)?;
                1.0 + self.config.fixed_income_score_weight * -energy
            }
        };
        Ok(score)
    }

    /// Realized daily dollar volatility of one contract of an instrument.
    pub fn dollar_volatility(
        &self,
        instrument: &str,
        snapshot: &SignalSnapshot,
    ) -> SignalResult<f64> {
        let multiplier = self.config.multiplier(instrument)?;
        let vol = snapshot
            .get(instrument)
            .map(|s| s.realized_volatility)
            .unwrap_or(Num::UNDEFINED);
        (vol * multiplier)
            .value()
            .ok_or_else(|| SignalError::insufficient(instrument, "realized volatility undefined"))
    }

    /// Size one leg.
    pub fn target(&self, kind: TargetKind, snapshot: &SignalSnapshot) -> SignalResult<Target> {
        let instrument = self.instrument(kind);
        let directional_score = self.score(kind, snapshot)?;
        let volatility_estimate = self.dollar_volatility(instrument, snapshot)?;

        let position = (Num::new(directional_score)
            / (Num::new(volatility_estimate) / self.config.risk_scaler))
            .value()
            .ok_or_else(|| SignalError::insufficient(instrument, "zero realized volatility"))?;

        Ok(Target {
            kind,
            instrument: instrument.to_string(),
            directional_score,
            volatility_estimate,
            position,
        })
    }

    /// Size both legs independently.
    pub fn targets(&self, snapshot: &SignalSnapshot) -> Vec<TargetOutcome> {
        TargetKind::ALL
            .iter()
            .map(|&kind| {
                let result = self.target(kind, snapshot);
                if let Err(e) = &result {
                    warn!(leg = kind.label(), error = %e, "target not computed");
                }
                TargetOutcome {
                    kind,
                    instrument: self.instrument(kind).to_string(),
                    result,
                }
            })
            .collect()
    }
}

fn z_score(snapshot: &SignalSnapshot, instrument: &str, target: &str) -> SignalResult<f64> {
    snapshot
        .get(instrument)
        .and_then(|s| s.z_score.value())
        .ok_or_else(|| {
            SignalError::insufficient(target, format!("z-score undefined for {}", instrument))
        })
}
