//! Pipeline configuration.
//!
//! Every field is required; the core carries no defaults. A typical file:
//!
//! ```toml
//! [signal]
//! mean_halflife_days = 10.0
//! vol_halflife_days = 20.0
//! signal_vol_halflife_days = 180.0
//! clip_zscore = false
//!
//! [sizing]
//! equity_score_weight = 0.5
//! fixed_income_score_weight = 0.5
//! risk_scaler = 10000.0
//! contract_multipliers = { "ES=F" = 50.0, "ZN=F" = 1000.0 }
//!
//! [instruments]
//! volatility_index = "^VIX"
//! rates_instrument = "ZN=F"
//! energy_instrument = "CL=F"
//! equity_proxy = "ES=F"
//! fixed_income_proxy = "ZN=F"
//!
//! [backtest]
//! clip_zscore = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::error::{SignalError, SignalResult};
use crate::risk::SizingConfig;
use crate::signal::SignalParams;
use crate::sweep::ParameterGrid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] SignalError),
}

/// Which symbol plays which part in the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentRoles {
    /// Implied-volatility index; rising z is bearish for equities.
    pub volatility_index: String,
    /// Rates future; rising z (falling yields) is bullish for equities.
    pub rates_instrument: String,
    /// Energy future; rising z is bearish for bonds.
    pub energy_instrument: String,
    /// Traded equity future.
    pub equity_proxy: String,
    /// Traded bond future.
    pub fixed_income_proxy: String,
}

impl InstrumentRoles {
    /// Every symbol the pipeline needs, without repeats.
    pub fn monitored(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for symbol in [
            &self.volatility_index,
            &self.energy_instrument,
            &self.equity_proxy,
            &self.rates_instrument,
            &self.fixed_income_proxy,
        ] {
            if !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }
        symbols
    }

    /// Symbols that are traded and backtested.
    pub fn traded(&self) -> Vec<String> {
        let mut symbols = vec![self.equity_proxy.clone()];
        if self.fixed_income_proxy != self.equity_proxy {
            symbols.push(self.fixed_income_proxy.clone());
        }
        symbols
    }

    fn validate(&self) -> SignalResult<()> {
        for (name, symbol) in [
            ("volatility_index", &self.volatility_index),
            ("rates_instrument", &self.rates_instrument),
            ("energy_instrument", &self.energy_instrument),
            ("equity_proxy", &self.equity_proxy),
            ("fixed_income_proxy", &self.fixed_income_proxy),
        ] {
            if symbol.trim().is_empty() {
                return Err(SignalError::InvalidParameter(format!(
                    "instruments.{} is empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Full configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub signal: SignalParams,
    pub sizing: SizingConfig,
    pub instruments: InstrumentRoles,
    pub backtest: BacktestConfig,
    /// Only read by the parameter sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<ParameterGrid>,
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Reject non-positive half-lives or risk scaler and missing multipliers.
    pub fn validate(&self) -> SignalResult<()> {
        self.signal.validate()?;
        self.instruments.validate()?;
        self.sizing.validate(&self.instruments)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [signal]
        mean_halflife_days = 10.0
        vol_halflife_days = 20.0
        signal_vol_halflife_days = 180.0
        clip_zscore = false

        [sizing]
        equity_score_weight = 0.5
        fixed_income_score_weight = 0.5
        risk_scaler = 10000.0

        [sizing.contract_multipliers]
        "ES=F" = 50.0
        "ZN=F" = 1000.0

        [instruments]
        volatility_index = "^VIX"
        rates_instrument = "ZN=F"
        energy_instrument = "CL=F"
        equity_proxy = "ES=F"
        fixed_income_proxy = "ZN=F"

        [backtest]
        clip_zscore = true
    "#;

    #[test]
    fn test_parse_valid_config() {
        let config = PipelineConfig::from_toml(VALID).unwrap();
        assert_eq!(config.signal.signal_vol_halflife_days, 180.0);
        assert_eq!(config.sizing.multiplier("ES=F").unwrap(), 50.0);
        assert!(config.backtest.clip_zscore);
        assert!(!config.signal.clip_zscore);
        assert!(config.sweep.is_none());
    }

    #[test]
    fn test_monitored_symbols_are_unique() {
        let config = PipelineConfig::from_toml(VALID).unwrap();
        assert_eq!(
            config.instruments.monitored(),
            vec!["^VIX", "CL=F", "ES=F", "ZN=F"]
        );
        assert_eq!(config.instruments.traded(), vec!["ES=F", "ZN=F"]);
    }

    #[test]
    fn test_shipped_default_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = PipelineConfig::from_file(path).unwrap();
        assert_eq!(config.signal.vol_halflife_days, 20.0);
        assert_eq!(config.sizing.risk_scaler, 10_000.0);
        let grid = config.sweep.unwrap();
        assert_eq!(grid.total_combinations(), 54);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            PipelineConfig::from_file("/nonexistent/config.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let text = VALID.replace("risk_scaler = 10000.0", "");
        assert!(matches!(
            PipelineConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_signal_key_is_rejected() {
        let text = VALID.replace(
            "mean_halflife_days = 10.0",
            "mean_halflife_days = 10.0\n    mean_half_life = 5.0",
        );
        assert!(matches!(
            PipelineConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_non_positive_values_are_rejected() {
        for (from, to) in [
            ("mean_halflife_days = 10.0", "mean_halflife_days = 0.0"),
            ("vol_halflife_days = 20.0", "vol_halflife_days = -5.0"),
            ("risk_scaler = 10000.0", "risk_scaler = -1.0"),
            ("\"ZN=F\" = 1000.0", "\"NQ=F\" = 20.0"),
        ] {
            let text = VALID.replace(from, to);
            assert!(
                matches!(
                    PipelineConfig::from_toml(&text),
                    Err(ConfigError::Invalid(SignalError::InvalidParameter(_)))
                ),
                "{} should be rejected",
                to
            );
        }
    }
}
