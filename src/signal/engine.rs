//! Signal engine.
//!
//! Computes, per symbol and per native timestamp:
//! 1. deviation of price from a time-decayed mean
//! 2. decayed volatility of that deviation, estimated on calendar days
//! 3. z-score = deviation / deviation volatility (optionally clipped)
//! 4. realized daily volatility and annualized % volatility, estimated on
//!    business days
//!
//! Daily estimates are broadcast back onto the native grid with an as-of
//! join keyed on each bucket's last observation, so an instant only ever
//! sees daily estimates built from prices at or before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::asof::AsOfTable;
use super::ewm::{diff, ewm_std, time_decayed_mean};
use super::resample::{business_daily_last, calendar_daily_last, DailyGrid};
use crate::data::PriceSeries;
use crate::error::{SignalError, SignalResult};
use crate::num::Num;

/// Z-scores are clipped to `[-ZSCORE_CLIP, ZSCORE_CLIP]` when clipping is on.
pub const ZSCORE_CLIP: f64 = 2.0;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Decay parameters for the signal engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalParams {
    /// Half-life of the price mean, in calendar days.
    pub mean_halflife_days: f64,
    /// Half-life of realized volatility, in business days.
    pub vol_halflife_days: f64,
    /// Half-life of the deviation volatility, in daily periods.
    pub signal_vol_halflife_days: f64,
    /// Clip z-scores to [-2, 2].
    pub clip_zscore: bool,
}

impl SignalParams {
    pub fn validate(&self) -> SignalResult<()> {
        for (name, value) in [
            ("mean_halflife_days", self.mean_halflife_days),
            ("vol_halflife_days", self.vol_halflife_days),
            ("signal_vol_halflife_days", self.signal_vol_halflife_days),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SignalError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Signal state of one symbol at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub raw_deviation: Num,
    pub deviation_volatility: Num,
    pub z_score: Num,
    /// Decayed std-dev of business-day price changes, in price points.
    pub realized_volatility: Num,
    pub annualized_pct_volatility: Num,
}

/// Signal states of one symbol on its native grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    symbol: String,
    states: Vec<SignalState>,
}

impl SignalSeries {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn states(&self) -> &[SignalState] {
        &self.states
    }

    pub fn latest(&self) -> Option<&SignalState> {
        self.states.last()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// As-of table over one field of the states.
    pub fn table(&self, field: impl Fn(&SignalState) -> Num) -> AsOfTable {
        AsOfTable::new(self.states.iter().map(|s| (s.timestamp, field(s))))
    }
}

/// Computes signal states from a spliced price series.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    params: SignalParams,
}

impl SignalEngine {
    /// Create an engine; non-positive half-lives are rejected.
    pub fn new(params: SignalParams) -> SignalResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    /// Same engine with a different clipping policy.
    pub fn with_clipping(&self, clip_zscore: bool) -> Self {
        Self {
            params: SignalParams {
                clip_zscore,
                ..self.params
            },
        }
    }

    /// Run the full computation for one series.
    pub fn compute(&self, series: &PriceSeries) -> SignalSeries {
        let times = series.timestamps();
        let prices = series.prices();

        // 1. Deviation from the time-decayed mean, at native cadence.
        let means = time_decayed_mean(&times, &prices, self.params.mean_halflife_days);
        let raw_deviation: Vec<Num> = prices
            .iter()
            .zip(means.iter())
            .map(|(&p, &m)| Num::new(p) - m)
            .collect();

        // 2. Deviation volatility at daily cadence, broadcast as-of.
        let daily_dev_vol = self.daily_deviation_volatility(&times, &raw_deviation);
        let deviation_volatility = AsOfTable::from_grid(&daily_dev_vol).broadcast(&times);

        // 3. Z-score.
        let z_score: Vec<Num> = raw_deviation
            .iter()
            .zip(deviation_volatility.iter())
            .map(|(&d, &v)| {
                let z = d / v;
                if self.params.clip_zscore {
                    z.clamp(-ZSCORE_CLIP, ZSCORE_CLIP)
                } else {
                    z
                }
            })
            .collect();

        // 4. Realized volatility on business days.
        let (daily_vol, ann_vol) = self.business_day_volatility(&times, &prices);
        let realized_volatility = AsOfTable::from_grid(&daily_vol).broadcast(&times);
        let annualized_pct_volatility = AsOfTable::from_grid(&ann_vol).broadcast(&times);

        let states: Vec<SignalState> = (0..times.len())
            .map(|i| SignalState {
                timestamp: times[i],
                price: prices[i],
                raw_deviation: raw_deviation[i],
                deviation_volatility: deviation_volatility[i],
                z_score: z_score[i],
                realized_volatility: realized_volatility[i],
                annualized_pct_volatility: annualized_pct_volatility[i],
            })
            .collect();

        debug!(
            symbol = series.symbol(),
            observations = states.len(),
            calendar_days = daily_dev_vol.len(),
            "computed signal states"
        );

        SignalSeries {
            symbol: series.symbol().to_string(),
            states,
        }
    }

    /// Decayed std-dev of the last deviation of each calendar day.
    pub fn daily_deviation_volatility(
        &self,
        times: &[DateTime<Utc>],
        raw_deviation: &[Num],
    ) -> DailyGrid {
        let daily = calendar_daily_last(times, raw_deviation);
        let std = ewm_std(&daily.values, self.params.signal_vol_halflife_days);
        daily.with_values(std)
    }

    /// Realized daily volatility (price points) and annualized % volatility
    /// on the business-day grid.
    pub fn business_day_volatility(
        &self,
        times: &[DateTime<Utc>],
        prices: &[f64],
    ) -> (DailyGrid, DailyGrid) {
        let values: Vec<Num> = prices.iter().map(|&p| Num::new(p)).collect();
        let daily_px = business_daily_last(times, &values);

        let changes = diff(&daily_px.values);
        let daily_vol = ewm_std(&changes, self.params.vol_halflife_days);

        let log_px: Vec<Num> = daily_px.values.iter().map(|p| p.ln()).collect();
        let log_changes = diff(&log_px);
        let annualization = 100.0 * TRADING_DAYS_PER_YEAR.sqrt();
        let ann_vol: Vec<Num> = ewm_std(&log_changes, self.params.vol_halflife_days)
            .into_iter()
            .map(|v| v * annualization)
            .collect();

        (daily_px.with_values(daily_vol), daily_px.with_values(ann_vol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{splice, PricePoint};
    use crate::signal::resample::business_day_of;
    use chrono::{Datelike, Duration, TimeZone, Weekday};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn params(clip: bool) -> SignalParams {
        SignalParams {
            mean_halflife_days: 10.0,
            vol_halflife_days: 20.0,
            signal_vol_halflife_days: 30.0,
            clip_zscore: clip,
        }
    }

    /// Daily closes at midnight UTC on weekdays only.
    fn weekday_series(symbol: &str, prices: &[f64]) -> PriceSeries {
        let mut t = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let mut points = Vec::new();
        for &p in prices {
            points.push(PricePoint::new(t, p));
            t += Duration::days(1);
            while business_day_of(t.date_naive()) != t.date_naive() {
                t += Duration::days(1);
            }
        }
        PriceSeries::new(symbol, points).unwrap()
    }

    fn random_walk(n: usize, step_sd: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, step_sd).unwrap();
        let mut px = 100.0;
        (0..n)
            .map(|_| {
                px += normal.sample(&mut rng);
                px
            })
            .collect()
    }

    #[test]
    fn test_rejects_non_positive_half_life() {
        for bad in [0.0, -1.0, f64::NAN] {
            let mut p = params(false);
            p.signal_vol_halflife_days = bad;
            assert!(matches!(
                SignalEngine::new(p),
                Err(SignalError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_constant_price_has_zero_deviation() {
        for hl in [0.5, 10.0, 250.0] {
            let engine = SignalEngine::new(SignalParams {
                mean_halflife_days: hl,
                ..params(false)
            })
            .unwrap();
            let signals = engine.compute(&weekday_series("ES=F", &[4500.0; 60]));
            for state in &signals.states()[1..] {
                assert!(state.raw_deviation.unwrap_or(f64::NAN).abs() < 1e-9);
            }
            // Zero deviation volatility makes the z-score undefined, not zero.
            assert!(signals.latest().unwrap().z_score.is_undefined());
        }
    }

    #[test]
    fn test_single_observation_is_all_undefined() {
        let engine = SignalEngine::new(params(true)).unwrap();
        let signals = engine.compute(&weekday_series("^VIX", &[14.0]));
        let state = signals.latest().unwrap();
        assert!(state.raw_deviation.is_undefined());
        assert!(state.deviation_volatility.is_undefined());
        assert!(state.z_score.is_undefined());
        assert!(state.realized_volatility.is_undefined());
        assert!(state.annualized_pct_volatility.is_undefined());
    }

    #[test]
    fn test_clipping_bounds_z_scores() {
        // A calm walk followed by a jump drives the raw z-score far out.
        let mut prices = random_walk(200, 0.5, 7);
        let last = *prices.last().unwrap();
        prices.extend((1..=5).map(|i| last + 50.0 * i as f64));

        let clipped = SignalEngine::new(params(true))
            .unwrap()
            .compute(&weekday_series("CL=F", &prices));
        let unclipped = SignalEngine::new(params(false))
            .unwrap()
            .compute(&weekday_series("CL=F", &prices));

        assert!(clipped
            .states()
            .iter()
            .filter_map(|s| s.z_score.value())
            .all(|z| (-ZSCORE_CLIP..=ZSCORE_CLIP).contains(&z)));
        assert!(unclipped.latest().unwrap().z_score.unwrap_or(0.0) > ZSCORE_CLIP);
        assert_eq!(clipped.latest().unwrap().z_score.value(), Some(ZSCORE_CLIP));
    }

    #[test]
    fn test_realized_volatility_scales_with_increments() {
        let base = random_walk(300, 1.0, 11);
        let doubled: Vec<f64> = base.iter().map(|p| 100.0 + 2.0 * (p - 100.0)).collect();
        let engine = SignalEngine::new(params(false)).unwrap();

        let v1 = engine
            .compute(&weekday_series("ES=F", &base))
            .latest()
            .unwrap()
            .realized_volatility;
        let v2 = engine
            .compute(&weekday_series("ES=F", &doubled))
            .latest()
            .unwrap()
            .realized_volatility;

        let ratio = v2.unwrap_or(f64::NAN) / v1.unwrap_or(f64::NAN);
        assert!((ratio - 2.0).abs() < 1e-6, "ratio {}", ratio);
    }

    #[test]
    fn test_annualized_volatility_matches_log_returns() {
        // Constant 1% daily log return has zero dispersion.
        let prices: Vec<f64> = (0..80).map(|i| 100.0 * (0.01 * i as f64).exp()).collect();
        let engine = SignalEngine::new(params(false)).unwrap();
        let latest = *engine
            .compute(&weekday_series("ZN=F", &prices))
            .latest()
            .unwrap();
        assert!(latest.annualized_pct_volatility.unwrap_or(f64::NAN).abs() < 1e-6);
    }

    #[test]
    fn test_deviation_volatility_is_broadcast_as_of() {
        // Intraday bars every 4 hours over three weeks.
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 1, 0, 0).unwrap();
        let walk = random_walk(6 * 21, 0.3, 3);
        let points: Vec<PricePoint> = walk
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(start + Duration::hours(4 * i as i64), p))
            .collect();
        let series = PriceSeries::new("ES=F", points).unwrap();

        let engine = SignalEngine::new(params(false)).unwrap();
        let signals = engine.compute(&series);
        let raw: Vec<Num> = signals.states().iter().map(|s| s.raw_deviation).collect();
        let grid = engine.daily_deviation_volatility(&series.timestamps(), &raw);
        let bounds = grid.published();

        let mut checked = 0;
        for state in signals.states() {
            // Latest day published at or before the bar; bars before the
            // first day's close see nothing.
            let Some(idx) = bounds.partition_point(|b| *b <= state.timestamp).checked_sub(1)
            else {
                assert!(state.deviation_volatility.is_undefined());
                continue;
            };
            let expected = grid.values[idx];
            if expected.is_defined() {
                assert_eq!(state.deviation_volatility, expected);
                assert!(state.timestamp >= bounds[idx]);
                if idx + 1 < bounds.len() {
                    assert!(state.timestamp < bounds[idx + 1]);
                }
                checked += 1;
            }
        }
        assert!(checked > 100);
    }

    #[test]
    fn test_weekend_stamped_close_is_not_seen_on_friday() {
        // 200 weekdays from a Monday end on a Friday; after splicing that
        // close is stamped Saturday 00:00.
        let prices = random_walk(200, 0.8, 21);
        let mut shocked = prices.clone();
        *shocked.last_mut().unwrap() += 15.0;

        let engine = SignalEngine::new(params(false)).unwrap();
        let run = |px: &[f64]| {
            let daily = weekday_series("CL=F", px);
            let spliced = splice("CL=F", &daily, &PriceSeries::empty("CL=F")).unwrap();
            engine.compute(&spliced)
        };
        let a = run(&prices);
        let b = run(&shocked);

        let saturday = a.latest().unwrap().timestamp;
        assert_eq!(saturday.weekday(), Weekday::Sat);
        let n = a.len();
        assert_eq!(&a.states()[..n - 1], &b.states()[..n - 1]);
        assert_ne!(
            a.latest().unwrap().realized_volatility,
            b.latest().unwrap().realized_volatility
        );
    }

    #[test]
    fn test_intraday_bar_sees_previous_day_until_close() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 14, 0, 0).unwrap();
        let walk = random_walk(7 * 10, 0.3, 5);
        let points: Vec<PricePoint> = walk
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let day = start + Duration::days(i as i64 / 7);
                PricePoint::new(day + Duration::hours(i as i64 % 7), p)
            })
            .collect();
        let series = PriceSeries::new("ES=F", points).unwrap();
        let signals = SignalEngine::new(params(false)).unwrap().compute(&series);

        // Monday's seven bars; the bar before them is Sunday's last.
        let day = &signals.states()[49..56];
        let prev_close = signals.states()[48];
        assert_eq!(day[0].timestamp.weekday(), Weekday::Mon);
        for state in &day[..6] {
            assert_eq!(state.deviation_volatility, prev_close.deviation_volatility);
            assert_eq!(state.realized_volatility, prev_close.realized_volatility);
        }
        assert_ne!(day[6].deviation_volatility, prev_close.deviation_volatility);
    }
}
