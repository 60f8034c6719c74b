//! Integrity validation for price files and series.
//!
//! Validates:
//! - Schema (`date` and `close` columns present)
//! - Timestamps strictly increasing in file order
//! - Prices finite
//! - Prices strictly positive (log-price volatility needs them)
//! - Largest calendar gap between observations
//! - At least two observations

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::data::{
    Granularity, LoaderError, PriceFileLoader, PricePoint, PriceSeries, REQUIRED_COLUMNS,
};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result of a single validation check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Integrity report for one series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesIntegrityReport {
    pub symbol: String,
    /// `daily`, `intraday` or `spliced`.
    pub source: String,
    pub observations: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub checks: Vec<CheckResult>,
}

impl SeriesIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        format!(
            "{} {} ({} observations): {}/{} checks passed",
            self.symbol, self.source, self.observations, passed, total
        )
    }
}

/// Validator for price series integrity.
#[derive(Debug, Clone)]
pub struct SeriesValidator {
    max_gap_days: i64,
}

impl Default for SeriesValidator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_GAP_DAYS)
    }
}

impl SeriesValidator {
    /// More than a week between observations is suspicious.
    pub const DEFAULT_MAX_GAP_DAYS: i64 = 7;

    pub fn new(max_gap_days: i64) -> Self {
        Self { max_gap_days }
    }

    /// Check one raw file: schema first, then its points in file order.
    pub fn validate_file(
        &self,
        loader: &PriceFileLoader,
        symbol: &str,
        granularity: Granularity,
    ) -> ValidationResult<SeriesIntegrityReport> {
        let source = match granularity {
            Granularity::Daily => "daily",
            Granularity::Intraday => "intraday",
        };

        let columns = loader.column_names(symbol, granularity)?;
        let schema = self.check_schema(&columns);
        if !schema.passed {
            return Ok(SeriesIntegrityReport {
                symbol: symbol.to_string(),
                source: source.to_string(),
                observations: 0,
                first: None,
                last: None,
                checks: vec![schema],
            });
        }

        let points = loader.load_points(symbol, granularity)?;
        let mut report = self.validate_points(symbol, source, &points);
        report.checks.insert(0, schema);
        Ok(report)
    }

    /// Check a spliced series.
    pub fn validate_series(&self, series: &PriceSeries) -> SeriesIntegrityReport {
        self.validate_points(series.symbol(), "spliced", series.points())
    }

    /// Run the point checks on observations in the order given.
    pub fn validate_points(
        &self,
        symbol: &str,
        source: &str,
        points: &[PricePoint],
    ) -> SeriesIntegrityReport {
        let checks = vec![
            self.check_ordering(points),
            self.check_finite(points),
            self.check_positive(points),
            self.check_max_gap(points),
            self.check_min_observations(points),
        ];

        SeriesIntegrityReport {
            symbol: symbol.to_string(),
            source: source.to_string(),
            observations: points.len(),
            first: points.first().map(|p| p.timestamp),
            last: points.last().map(|p| p.timestamp),
            checks,
        }
    }

    /// Check that the required columns are present.
    fn check_schema(&self, columns: &[String]) -> CheckResult {
        let present: HashSet<&str> = columns.iter().map(|s| s.as_str()).collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !present.contains(c))
            .collect();

        if missing.is_empty() {
            CheckResult::pass(
                "schema",
                &format!("All {} required columns present", REQUIRED_COLUMNS.len()),
            )
        } else {
            CheckResult::fail(
                "schema",
                "Schema mismatch",
                Some(format!("Missing: {:?}", missing)),
            )
        }
    }

    /// Timestamps must be strictly increasing.
    fn check_ordering(&self, points: &[PricePoint]) -> CheckResult {
        let violations: Vec<String> = points
            .windows(2)
            .filter(|w| w[1].timestamp <= w[0].timestamp)
            .map(|w| format!("{} after {}", w[1].timestamp, w[0].timestamp))
            .collect();

        if violations.is_empty() {
            CheckResult::pass("ordering", "Timestamps strictly increasing")
        } else {
            CheckResult::fail(
                "ordering",
                &format!("{} out-of-order or duplicate timestamps", violations.len()),
                Some(first_few(&violations)),
            )
        }
    }

    fn check_finite(&self, points: &[PricePoint]) -> CheckResult {
        let bad = points.iter().filter(|p| !p.price.is_finite()).count();
        if bad == 0 {
            CheckResult::pass("finite_prices", "All prices finite")
        } else {
            CheckResult::fail(
                "finite_prices",
                &format!("{} non-finite prices", bad),
                None,
            )
        }
    }

    fn check_positive(&self, points: &[PricePoint]) -> CheckResult {
        let bad: Vec<String> = points
            .iter()
            .filter(|p| p.price <= 0.0)
            .map(|p| format!("{} at {}", p.price, p.timestamp))
            .collect();

        if bad.is_empty() {
            CheckResult::pass("positive_prices", "All prices strictly positive")
        } else {
            CheckResult::fail(
                "positive_prices",
                &format!("{} non-positive prices", bad.len()),
                Some(first_few(&bad)),
            )
        }
    }

    /// Largest gap between consecutive observations, in calendar days.
    fn check_max_gap(&self, points: &[PricePoint]) -> CheckResult {
        let gaps: Vec<String> = points
            .windows(2)
            .filter_map(|w| {
                let days = (w[1].timestamp - w[0].timestamp).num_days();
                (days > self.max_gap_days)
                    .then(|| format!("{} to {} ({} days)", w[0].timestamp, w[1].timestamp, days))
            })
            .collect();

        if gaps.is_empty() {
            CheckResult::pass(
                "max_gap",
                &format!("No gaps over {} days", self.max_gap_days),
            )
        } else {
            CheckResult::fail(
                "max_gap",
                &format!("{} gaps over {} days", gaps.len(), self.max_gap_days),
                Some(first_few(&gaps)),
            )
        }
    }

    fn check_min_observations(&self, points: &[PricePoint]) -> CheckResult {
        if points.len() >= 2 {
            CheckResult::pass("min_observations", &format!("{} observations", points.len()))
        } else {
            CheckResult::fail(
                "min_observations",
                &format!("Only {} observations, need at least 2", points.len()),
                None,
            )
        }
    }
}

fn first_few(items: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut out = items.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > SHOWN {
        out.push_str(&format!(", ... ({} more)", items.len() - SHOWN));
    }
    out
}
