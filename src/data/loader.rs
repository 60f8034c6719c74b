//! Price file loader.
//!
//! Reads the CSV files written by the data acquisition job into price
//! series. Each symbol has two files in the data directory:
//! - `<SYMBOL>_daily.csv`: end-of-day closes (required)
//! - `<SYMBOL>_intraday.csv`: intraday bars (optional)
//!
//! Only the `date` and `close` columns are used; any other columns
//! (open, high, low, volume, publish_time, symbol) are ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{PricePoint, PriceSeries, RawPriceData, RawPriceSource};

/// Columns the loader needs.
pub const REQUIRED_COLUMNS: &[&str] = &["date", "close"];

const DAILY_SUFFIX: &str = "_daily.csv";
const INTRADAY_SUFFIX: &str = "_intraday.csv";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which of the two raw sources a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Intraday,
}

impl Granularity {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Daily => DAILY_SUFFIX,
            Self::Intraday => INTRADAY_SUFFIX,
        }
    }
}

/// CSV loader for per-symbol daily and intraday closes.
pub struct PriceFileLoader {
    data_dir: PathBuf,
}

impl PriceFileLoader {
    /// Create a loader pointing at a data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of a symbol's file for the given granularity.
    pub fn csv_path(&self, symbol: &str, granularity: Granularity) -> PathBuf {
        self.data_dir
            .join(format!("{}{}", symbol, granularity.suffix()))
    }

    /// Symbols with a daily file in the data directory.
    pub fn available_symbols(&self) -> Result<Vec<String>, LoaderError> {
        if !self.data_dir.exists() {
            return Ok(vec![]);
        }

        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(symbol) = name.to_string_lossy().strip_suffix(DAILY_SUFFIX) {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// Load one file as a DataFrame with `date` (string) and `close` (f64).
    pub fn load_dataframe(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<DataFrame, LoaderError> {
        let path = self.csv_path(symbol, granularity);
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let df = LazyCsvReader::new(&path)
            .with_has_header(true)
            .finish()?
            .select([
                col("date").cast(DataType::String),
                col("close").cast(DataType::Float64),
            ])
            .collect()?;
        Ok(df)
    }

    /// Header columns of one file.
    pub fn column_names(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Vec<String>, LoaderError> {
        let path = self.csv_path(symbol, granularity);
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let df = LazyCsvReader::new(&path)
            .with_has_header(true)
            .finish()?
            .limit(1)
            .collect()?;
        Ok(df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect())
    }

    /// Price points of one file in file order, without sorting.
    pub fn load_points(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Vec<PricePoint>, LoaderError> {
        let df = self.load_dataframe(symbol, granularity)?;
        dataframe_to_points(&df)
    }

    /// Load one file as a price series, sorted and de-duplicated.
    pub fn load_series(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<PriceSeries, LoaderError> {
        let points = self.load_points(symbol, granularity)?;
        let (series, dropped) = PriceSeries::from_unsorted(symbol, points);
        if dropped > 0 {
            warn!(symbol, ?granularity, dropped, "dropped duplicate timestamps");
        }
        debug!(symbol, ?granularity, rows = series.len(), "loaded price file");
        Ok(series)
    }

    /// Load the raw daily and intraday sources for one symbol.
    ///
    /// The daily file is required; a missing intraday file yields an empty
    /// intraday series.
    pub fn load_source(&self, symbol: &str) -> Result<RawPriceSource, LoaderError> {
        let daily = self.load_series(symbol, Granularity::Daily)?;
        let intraday = match self.load_series(symbol, Granularity::Intraday) {
            Ok(series) => series,
            Err(LoaderError::FileNotFound(path)) => {
                warn!(symbol, %path, "no intraday file, using daily closes only");
                PriceSeries::empty(symbol)
            }
            Err(e) => return Err(e),
        };
        Ok(RawPriceSource { daily, intraday })
    }

    /// Load raw sources for every requested symbol.
    pub fn load_raw(&self, symbols: &[String]) -> Result<RawPriceData, LoaderError> {
        let mut raw = RawPriceData::new();
        for symbol in symbols {
            let source = self.load_source(symbol)?;
            info!(
                symbol = symbol.as_str(),
                daily = source.daily.len(),
                intraday = source.intraday.len(),
                "loaded raw prices"
            );
            raw.insert(symbol.clone(), source);
        }
        Ok(raw)
    }
}

/// Convert a `date`/`close` frame into price points. Rows with a null close
/// are skipped; an unparseable date is an error.
fn dataframe_to_points(df: &DataFrame) -> Result<Vec<PricePoint>, LoaderError> {
    let dates = df.column("date")?.str()?;
    let closes = df.column("close")?.f64()?;

    let mut points = Vec::with_capacity(df.height());
    for (date, close) in dates.into_iter().zip(closes.into_iter()) {
        let (Some(date), Some(close)) = (date, close) else {
            continue;
        };
        let timestamp = parse_timestamp(date).ok_or_else(|| {
            LoaderError::InvalidData(format!("Unrecognised timestamp: {}", date))
        })?;
        points.push(PricePoint::new(timestamp, close));
    }
    Ok(points)
}

/// Parse the timestamp formats written by the acquisition job. Naive
/// timestamps and bare dates are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
