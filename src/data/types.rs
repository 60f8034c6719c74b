//! Core price data types.
//!
//! A `PriceSeries` is an immutable, strictly time-ordered sequence of closes
//! for one symbol. Spacing is irregular: spliced series mix daily closes with
//! intraday bars.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::loader::LoaderError;

/// A single observed close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Strictly increasing-by-timestamp price history for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting out-of-order or duplicate timestamps.
    pub fn new(symbol: &str, points: Vec<PricePoint>) -> Result<Self, LoaderError> {
        if let Some(w) = points.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(LoaderError::InvalidData(format!(
                "{}: timestamps not strictly increasing at {} -> {}",
                symbol, w[0].timestamp, w[1].timestamp
            )));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            points,
        })
    }

    /// Build a series from unordered records: sorts by timestamp and keeps
    /// the last record for any duplicated timestamp.
    ///
    /// Returns the series and the number of dropped duplicates.
    pub fn from_unsorted(symbol: &str, mut points: Vec<PricePoint>) -> (Self, usize) {
        points.sort_by_key(|p| p.timestamp);
        let before = points.len();
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        let dropped = before - deduped.len();
        (
            Self {
                symbol: symbol.to_string(),
                points: deduped,
            },
            dropped,
        )
    }

    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            points: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Earliest timestamp, if any.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.first().map(|p| p.timestamp)
    }

    /// Latest timestamp, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.last().map(|p| p.timestamp)
    }
}

/// The two raw sources available for one symbol.
#[derive(Debug, Clone)]
pub struct RawPriceSource {
    /// Coarse end-of-day closes.
    pub daily: PriceSeries,
    /// Fine intraday bars; may be empty.
    pub intraday: PriceSeries,
}

/// Raw sources keyed by symbol, as delivered by the acquisition side.
pub type RawPriceData = BTreeMap<String, RawPriceSource>;
