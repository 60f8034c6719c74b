//! Daily projections of irregular series.
//!
//! Volatility is estimated at daily cadence even when the native series is
//! intraday. Two grids are used:
//! - calendar days: every UTC date from the first to the last observation
//! - business days: every weekday; weekend observations fall into the
//!   preceding Friday's bucket
//!
//! Each bucket holds the last defined observation in it. Buckets with no
//! defined observation are undefined slots, which still count as periods
//! for the index-decayed estimators.
//!
//! A bucket's value is published at its last observation, not at the start
//! of its day: a Friday bucket that absorbs a Saturday-stamped close is
//! unknown until Saturday.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

use crate::num::Num;

/// A value per day on a regular day grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyGrid {
    pub days: Vec<NaiveDate>,
    pub values: Vec<Num>,
    /// Instant of the last defined observation in each bucket.
    pub observed: Vec<Option<DateTime<Utc>>>,
}

impl DailyGrid {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    fn empty() -> Self {
        Self {
            days: Vec::new(),
            values: Vec::new(),
            observed: Vec::new(),
        }
    }

    /// Instant from which each bucket's value is known: the later of the
    /// day's start and the bucket's last observation. Empty buckets publish
    /// at the start of their day.
    pub fn published(&self) -> Vec<DateTime<Utc>> {
        self.days
            .iter()
            .zip(self.observed.iter().copied())
            .map(|(day, seen)| {
                let start = start_of_day(*day);
                seen.map_or(start, |t| t.max(start))
            })
            .collect()
    }

    /// Same grid, new values.
    pub fn with_values(&self, values: Vec<Num>) -> Self {
        debug_assert_eq!(values.len(), self.days.len());
        Self {
            days: self.days.clone(),
            values,
            observed: self.observed.clone(),
        }
    }
}

/// Midnight UTC of a date.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Business-day bucket of a date: weekends roll back to Friday.
pub fn business_day_of(day: NaiveDate) -> NaiveDate {
    match day.weekday() {
        Weekday::Sat => day - Duration::days(1),
        Weekday::Sun => day - Duration::days(2),
        _ => day,
    }
}

fn is_business_day(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Last defined value per calendar day.
pub fn calendar_daily_last(times: &[DateTime<Utc>], values: &[Num]) -> DailyGrid {
    bucket_last(times, values, |t| t.date_naive(), |_| true)
}

/// Last defined value per business day.
pub fn business_daily_last(times: &[DateTime<Utc>], values: &[Num]) -> DailyGrid {
    bucket_last(
        times,
        values,
        |t| business_day_of(t.date_naive()),
        is_business_day,
    )
}

/// Sum of defined values per business day; a day with no defined value is
/// undefined rather than zero.
pub fn business_daily_sum(times: &[DateTime<Utc>], values: &[Num]) -> DailyGrid {
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return DailyGrid::empty();
    };

    let days = business_days_between(
        business_day_of(first.date_naive()),
        business_day_of(last.date_naive()),
    );
    let mut out = vec![Num::UNDEFINED; days.len()];
    let mut observed = vec![None; days.len()];

    let mut slot = 0;
    for (t, v) in times.iter().zip(values.iter()) {
        let day = business_day_of(t.date_naive());
        while slot < days.len() && days[slot] < day {
            slot += 1;
        }
        if slot < days.len() && v.is_defined() {
            out[slot] = if out[slot].is_defined() {
                out[slot] + *v
            } else {
                *v
            };
            observed[slot] = Some(*t);
        }
    }

    DailyGrid {
        days,
        values: out,
        observed,
    }
}

fn business_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

fn bucket_last(
    times: &[DateTime<Utc>],
    values: &[Num],
    bucket_of: impl Fn(&DateTime<Utc>) -> NaiveDate,
    on_grid: impl Fn(NaiveDate) -> bool,
) -> DailyGrid {
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return DailyGrid::empty();
    };

    let start = bucket_of(first);
    let end = bucket_of(last);
    let days: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| on_grid(*d))
        .collect();
    let mut out = vec![Num::UNDEFINED; days.len()];
    let mut observed = vec![None; days.len()];

    // Observations are time-ordered, so buckets are visited in order.
    let mut slot = 0;
    for (t, v) in times.iter().zip(values.iter()) {
        let day = bucket_of(t);
        while slot < days.len() && days[slot] < day {
            slot += 1;
        }
        if slot < days.len() && v.is_defined() {
            out[slot] = *v;
            observed[slot] = Some(*t);
        }
    }

    DailyGrid {
        days,
        values: out,
        observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_business_day_of_rolls_weekend_back() {
        // 2024-06-07 is a Friday.
        assert_eq!(business_day_of(date(2024, 6, 8)), date(2024, 6, 7));
        assert_eq!(business_day_of(date(2024, 6, 9)), date(2024, 6, 7));
        assert_eq!(business_day_of(date(2024, 6, 10)), date(2024, 6, 10));
    }

    #[test]
    fn test_calendar_daily_last_fills_gaps_with_undefined() {
        let times = vec![at(2024, 6, 3, 10), at(2024, 6, 3, 15), at(2024, 6, 5, 9)];
        let values = vec![Num::new(1.0), Num::new(2.0), Num::new(3.0)];
        let grid = calendar_daily_last(&times, &values);

        assert_eq!(grid.days, vec![date(2024, 6, 3), date(2024, 6, 4), date(2024, 6, 5)]);
        assert_eq!(grid.values[0].value(), Some(2.0));
        assert!(grid.values[1].is_undefined());
        assert_eq!(grid.values[2].value(), Some(3.0));
    }

    #[test]
    fn test_calendar_daily_last_skips_undefined_observations() {
        let times = vec![at(2024, 6, 3, 10), at(2024, 6, 3, 15)];
        let values = vec![Num::new(1.0), Num::UNDEFINED];
        let grid = calendar_daily_last(&times, &values);
        assert_eq!(grid.values[0].value(), Some(1.0));
    }

    #[test]
    fn test_business_daily_last_skips_weekends() {
        // Fri 7th, Sat 8th (shifted Friday close), Mon 10th, Wed 12th.
        let times = vec![
            at(2024, 6, 7, 0),
            at(2024, 6, 8, 0),
            at(2024, 6, 10, 0),
            at(2024, 6, 12, 0),
        ];
        let values = vec![Num::new(1.0), Num::new(2.0), Num::new(3.0), Num::new(4.0)];
        let grid = business_daily_last(&times, &values);

        assert_eq!(
            grid.days,
            vec![date(2024, 6, 7), date(2024, 6, 10), date(2024, 6, 11), date(2024, 6, 12)]
        );
        assert_eq!(grid.values[0].value(), Some(2.0));
        assert_eq!(grid.values[1].value(), Some(3.0));
        assert!(grid.values[2].is_undefined());
        assert_eq!(grid.values[3].value(), Some(4.0));
    }

    #[test]
    fn test_business_daily_sum() {
        let times = vec![
            at(2024, 6, 7, 10),
            at(2024, 6, 7, 15),
            at(2024, 6, 9, 12),
            at(2024, 6, 11, 9),
        ];
        let values = vec![Num::new(1.0), Num::UNDEFINED, Num::new(2.5), Num::UNDEFINED];
        let grid = business_daily_sum(&times, &values);

        assert_eq!(
            grid.days,
            vec![date(2024, 6, 7), date(2024, 6, 10), date(2024, 6, 11)]
        );
        // Sunday rolls into Friday.
        assert_eq!(grid.values[0].value(), Some(3.5));
        assert!(grid.values[1].is_undefined());
        assert!(grid.values[2].is_undefined());
    }

    #[test]
    fn test_empty_input() {
        let grid = calendar_daily_last(&[], &[]);
        assert!(grid.is_empty());
        assert!(grid.published().is_empty());
    }

    #[test]
    fn test_buckets_publish_at_last_observation() {
        // Fri 7th midnight, Sat 8th midnight (shifted Friday close), Mon 10th
        // intraday bars, Tue 11th empty, Wed 12th midnight.
        let times = vec![
            at(2024, 6, 7, 0),
            at(2024, 6, 8, 0),
            at(2024, 6, 10, 9),
            at(2024, 6, 10, 15),
            at(2024, 6, 12, 0),
        ];
        let values = vec![Num::new(1.0); 5];

        let grid = business_daily_last(&times, &values);
        assert_eq!(
            grid.published(),
            vec![at(2024, 6, 8, 0), at(2024, 6, 10, 15), at(2024, 6, 11, 0), at(2024, 6, 12, 0)]
        );

        let grid = calendar_daily_last(&times, &values);
        assert_eq!(grid.published()[0], at(2024, 6, 7, 0));
        assert_eq!(grid.published()[3], at(2024, 6, 10, 15));
    }
}
