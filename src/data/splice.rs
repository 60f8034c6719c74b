//! Daily + intraday splicing.
//!
//! Daily closes are stamped at the start of their trading date, so a close
//! printed at the end of day T only becomes usable on T+1. Splicing shifts
//! the daily series forward one calendar day, keeps the part that precedes
//! the first intraday bar and appends the intraday bars unmodified.

use chrono::Duration;
use tracing::debug;

use super::types::{PricePoint, PriceSeries, RawPriceData};
use crate::error::{SignalError, SignalResult};

/// Splice a coarse daily series and a fine intraday series into one
/// continuous series.
///
/// An empty intraday series keeps the whole shifted daily series.
pub fn splice(
    symbol: &str,
    daily: &PriceSeries,
    intraday: &PriceSeries,
) -> SignalResult<PriceSeries> {
    let shift = Duration::days(1);
    let cutoff = intraday.start();

    let mut points: Vec<PricePoint> = daily
        .points()
        .iter()
        .map(|p| PricePoint::new(p.timestamp + shift, p.price))
        .filter(|p| cutoff.map_or(true, |c| p.timestamp < c))
        .collect();
    let prefix_len = points.len();
    points.extend_from_slice(intraday.points());

    debug!(
        symbol,
        daily_prefix = prefix_len,
        intraday = intraday.len(),
        "spliced series"
    );

    // Both parts are strictly increasing and the prefix ends before the
    // first intraday bar, so this only fails on malformed inputs.
    Ok(PriceSeries::new(symbol, points)?)
}

/// Look a symbol up in the raw source map and splice it.
pub fn splice_symbol(symbol: &str, raw: &RawPriceData) -> SignalResult<PriceSeries> {
    let source = raw
        .get(symbol)
        .ok_or_else(|| SignalError::MissingData(format!("no raw prices for {}", symbol)))?;
    splice(symbol, &source.daily, &source.intraday)
}
