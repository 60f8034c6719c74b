//! Validation of price data.
//!
//! Named pass/fail integrity checks for raw price files and spliced series.

pub mod series_integrity;

pub use series_integrity::{
    CheckResult, SeriesIntegrityReport, SeriesValidator, ValidationError, ValidationResult,
};
