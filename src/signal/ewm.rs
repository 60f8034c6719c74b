//! Exponentially weighted estimators.
//!
//! Two flavours are needed:
//! - a time-decayed mean, where the weight of an observation depends on the
//!   wall-clock time elapsed since it was seen
//! - an index-decayed, bias-corrected variance, where each slot of a regular
//!   grid (including empty slots) counts as one period
//!
//! Both use the "adjusted" form: the estimate is the exact weighted average
//! over all history, not a recursive blend seeded with the first value.

use chrono::{DateTime, Utc};

use crate::num::Num;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Per-period decay factor for a half-life expressed in periods.
pub fn decay_factor(half_life: f64) -> f64 {
    0.5_f64.powf(1.0 / half_life)
}

/// Time-decayed mean with a half-life in calendar days.
///
/// An observation seen `dt` days before `t` carries weight
/// `0.5^(dt / half_life_days)` at `t`. The mean at the first observation is
/// undefined. Non-finite prices are skipped but time still decays the
/// existing weights.
pub fn time_decayed_mean(
    times: &[DateTime<Utc>],
    values: &[f64],
    half_life_days: f64,
) -> Vec<Num> {
    let mut out = Vec::with_capacity(values.len());
    let mut mean: Option<f64> = None;
    let mut old_wt = 1.0;
    let mut last_time: Option<DateTime<Utc>> = None;

    for (i, (&t, &x)) in times.iter().zip(values.iter()).enumerate() {
        let observed = x.is_finite();
        match mean {
            Some(m) => {
                if let Some(prev) = last_time {
                    let elapsed_days =
                        (t - prev).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
                    old_wt *= 0.5_f64.powf(elapsed_days / half_life_days);
                }
                if observed {
                    if m != x {
                        mean = Some((old_wt * m + x) / (old_wt + 1.0));
                    }
                    old_wt += 1.0;
                }
            }
            None if observed => mean = Some(x),
            None => {}
        }
        if mean.is_some() {
            last_time = Some(t);
        }

        if i == 0 {
            out.push(Num::UNDEFINED);
        } else {
            out.push(mean.map(Num::new).unwrap_or(Num::UNDEFINED));
        }
    }
    out
}

/// Index-decayed, bias-corrected variance over a regular grid.
///
/// Undefined slots do not contribute an observation but still decay the
/// weights of earlier ones; their output carries the current estimate.
/// Fewer than two effective observations give an undefined result.
pub fn ewm_variance(values: &[Num], half_life: f64) -> Vec<Num> {
    let factor = decay_factor(half_life);
    let mut out = Vec::with_capacity(values.len());

    let mut mean: Option<f64> = None;
    let mut cov = 0.0;
    let mut sum_wt = 1.0;
    let mut sum_wt2 = 1.0;
    let mut old_wt = 1.0;

    for value in values {
        let x = value.value();
        match (mean, x) {
            (Some(m), _) => {
                sum_wt *= factor;
                sum_wt2 *= factor * factor;
                old_wt *= factor;
                if let Some(x) = x {
                    let new_mean = if m != x {
                        (old_wt * m + x) / (old_wt + 1.0)
                    } else {
                        m
                    };
                    cov = (old_wt * (cov + (m - new_mean).powi(2)) + (x - new_mean).powi(2))
                        / (old_wt + 1.0);
                    mean = Some(new_mean);
                    sum_wt += 1.0;
                    sum_wt2 += 1.0;
                    old_wt += 1.0;
                }
            }
            (None, Some(x)) => mean = Some(x),
            (None, None) => {}
        }

        let numerator = sum_wt * sum_wt;
        let denominator = numerator - sum_wt2;
        if mean.is_some() && denominator > 0.0 {
            out.push(Num::new(numerator / denominator * cov));
        } else {
            out.push(Num::UNDEFINED);
        }
    }
    out
}

/// Index-decayed, bias-corrected standard deviation.
pub fn ewm_std(values: &[Num], half_life: f64) -> Vec<Num> {
    ewm_variance(values, half_life)
        .into_iter()
        .map(|v| v.map(|v| v.max(0.0)).sqrt())
        .collect()
}

/// First difference; the first slot and any slot touching an undefined
/// value are undefined.
pub fn diff(values: &[Num]) -> Vec<Num> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(Num::UNDEFINED);
        } else {
            out.push(values[i] - values[i - 1]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn times(n: usize, step: Duration) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + step * i as i32).collect()
    }

    fn nums(values: &[f64]) -> Vec<Num> {
        values.iter().map(|&v| Num::new(v)).collect()
    }

    #[test]
    fn test_decay_factor() {
        assert!((decay_factor(1.0) - 0.5).abs() < 1e-12);
        assert!((decay_factor(2.0).powi(2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_decayed_mean_constant() {
        let t = times(50, Duration::hours(7));
        let means = time_decayed_mean(&t, &[42.0; 50], 3.0);
        assert!(means[0].is_undefined());
        assert!(means[1..].iter().all(|m| m.value() == Some(42.0)));
    }

    #[test]
    fn test_time_decayed_mean_weights_by_elapsed_time() {
        // Two observations one half-life apart: weights 0.5 and 1.
        let t = times(2, Duration::days(10));
        let means = time_decayed_mean(&t, &[0.0, 3.0], 10.0);
        let expected = (0.5 * 0.0 + 1.0 * 3.0) / 1.5;
        assert!((means[1].unwrap_or(f64::NAN) - expected).abs() < 1e-12);

        // Same values, ten times the gap: the old point barely counts.
        let t = times(2, Duration::days(100));
        let means = time_decayed_mean(&t, &[0.0, 3.0], 10.0);
        assert!(means[1].unwrap_or(f64::NAN) > 2.99);
    }

    #[test]
    fn test_ewm_variance_two_points() {
        // Half-life 1: weights 0.5 and 1 on [0, 2].
        let var = ewm_variance(&nums(&[0.0, 2.0]), 1.0);
        assert!(var[0].is_undefined());
        let w: [f64; 2] = [0.5, 1.0];
        let mean = (w[0] * 0.0 + w[1] * 2.0) / 1.5;
        let biased = (w[0] * (0.0 - mean).powi(2) + w[1] * (2.0 - mean).powi(2)) / 1.5;
        let sum_wt: f64 = 1.5;
        let sum_wt2: f64 = 1.25;
        let expected = biased * sum_wt.powi(2) / (sum_wt.powi(2) - sum_wt2);
        assert!((var[1].unwrap_or(f64::NAN) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ewm_variance_undefined_slot_carries_estimate() {
        let values = vec![Num::new(1.0), Num::new(3.0), Num::UNDEFINED, Num::new(2.0)];
        let var = ewm_variance(&values, 5.0);
        assert!(var[1].is_defined());
        assert!(var[2].is_defined());
        assert!(var[3].is_defined());
    }

    #[test]
    fn test_ewm_std_constant_is_zero() {
        let std = ewm_std(&nums(&[5.0; 20]), 3.0);
        assert!(std[0].is_undefined());
        assert!(std[1..].iter().all(|s| s.value() == Some(0.0)));
    }

    #[test]
    fn test_ewm_std_scales_linearly() {
        let base = nums(&[1.0, -0.5, 2.0, 0.3, -1.2, 0.8, 0.1]);
        let doubled: Vec<Num> = base.iter().map(|v| *v * 2.0).collect();
        let a = ewm_std(&base, 4.0);
        let b = ewm_std(&doubled, 4.0);
        let ratio = b.last().unwrap().unwrap_or(f64::NAN) / a.last().unwrap().unwrap_or(f64::NAN);
        assert!((ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_diff() {
        let d = diff(&[Num::new(1.0), Num::new(4.0), Num::UNDEFINED, Num::new(2.0)]);
        assert!(d[0].is_undefined());
        assert_eq!(d[1].value(), Some(3.0));
        assert!(d[2].is_undefined());
        assert!(d[3].is_undefined());
    }
}
