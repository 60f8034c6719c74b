//! Synthetic price fixtures shared by the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::config::PipelineConfig;
use crate::data::{splice, PricePoint, PriceSeries};
use crate::signal::resample::business_day_of;

pub const CONFIG: &str = r#"
    [signal]
    mean_halflife_days = 10.0
    vol_halflife_days = 20.0
    signal_vol_halflife_days = 180.0
    clip_zscore = false

    [sizing]
    equity_score_weight = 0.5
    fixed_income_score_weight = 0.5
    risk_scaler = 10000.0
    contract_multipliers = { "ES=F" = 50.0, "ZN=F" = 1000.0 }

    [instruments]
    volatility_index = "^VIX"
    rates_instrument = "ZN=F"
    energy_instrument = "CL=F"
    equity_proxy = "ES=F"
    fixed_income_proxy = "ZN=F"

    [backtest]
    clip_zscore = true
"#;

pub fn config() -> PipelineConfig {
    PipelineConfig::from_toml(CONFIG).unwrap()
}

pub fn first_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
}

/// Closes at midnight UTC on consecutive weekdays starting at `start`.
pub fn weekday_series(symbol: &str, start: DateTime<Utc>, prices: &[f64]) -> PriceSeries {
    let mut t = start;
    let mut points = Vec::with_capacity(prices.len());
    for &p in prices {
        while business_day_of(t.date_naive()) != t.date_naive() {
            t += Duration::days(1);
        }
        points.push(PricePoint::new(t, p));
        t += Duration::days(1);
    }
    PriceSeries::new(symbol, points).unwrap()
}

/// Geometric random walk with constant log-return volatility.
pub fn random_walk(n: usize, start_price: f64, daily_sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, daily_sd).unwrap();
    let mut px = start_price;
    (0..n)
        .map(|_| {
            px *= f64::exp(normal.sample(&mut rng));
            px
        })
        .collect()
}

/// The four monitored symbols over `days` business days.
pub fn market(days: usize) -> Vec<PriceSeries> {
    vec![
        weekday_series("^VIX", first_day(), &random_walk(days, 16.0, 0.05, 1)),
        weekday_series("CL=F", first_day(), &random_walk(days, 75.0, 0.02, 2)),
        weekday_series("ES=F", first_day(), &random_walk(days, 4000.0, 0.01, 3)),
        weekday_series("ZN=F", first_day(), &random_walk(days, 110.0, 0.004, 4)),
    ]
}

/// The four monitored symbols spliced: `days` business days of daily closes
/// followed by `sessions` business days of hourly bars (14:00 to 20:00 UTC).
pub fn spliced_market(days: usize, sessions: usize) -> Vec<PriceSeries> {
    market(days)
        .into_iter()
        .zip(10u64..)
        .map(|(daily, seed)| {
            let symbol = daily.symbol().to_string();
            let last = *daily.last().unwrap();
            let mut walk = random_walk(sessions * 7, last.price, 0.002, seed).into_iter();

            let mut bars = Vec::with_capacity(sessions * 7);
            let mut day = last.timestamp + Duration::days(1);
            for _ in 0..sessions {
                while business_day_of(day.date_naive()) != day.date_naive() {
                    day += Duration::days(1);
                }
                for (hour, price) in (14..21).zip(&mut walk) {
                    bars.push(PricePoint::new(day + Duration::hours(hour), price));
                }
                day += Duration::days(1);
            }

            let intraday = PriceSeries::new(&symbol, bars).unwrap();
            splice(&symbol, &daily, &intraday).unwrap()
        })
        .collect()
}
