//! As-of join.
//!
//! Carries the most recent known value of a sparse series onto a denser
//! timestamp grid. The table is a sorted array of (boundary, value) pairs;
//! a query returns the value of the latest boundary at or before the query
//! instant. Undefined values are never entered, so a lookup always returns
//! the most recent *defined* value.

use chrono::{DateTime, Utc};

use super::resample::DailyGrid;
use crate::num::Num;

#[derive(Debug, Clone, Default)]
pub struct AsOfTable {
    boundaries: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl AsOfTable {
    /// Build from time-ordered pairs; undefined values are dropped. If a
    /// boundary repeats, the later pair wins.
    pub fn new(pairs: impl IntoIterator<Item = (DateTime<Utc>, Num)>) -> Self {
        let mut table = Self::default();
        for (boundary, value) in pairs {
            let Some(v) = value.value() else {
                continue;
            };
            debug_assert!(table.boundaries.last().map_or(true, |b| *b <= boundary));
            if table.boundaries.last() == Some(&boundary) {
                if let Some(last) = table.values.last_mut() {
                    *last = v;
                }
                continue;
            }
            table.boundaries.push(boundary);
            table.values.push(v);
        }
        table
    }

    /// Table keyed on the instant each bucket of a daily grid is published.
    pub fn from_grid(grid: &DailyGrid) -> Self {
        Self::new(grid.published().into_iter().zip(grid.values.iter().copied()))
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Value of the latest boundary `<= at`; undefined before the first.
    pub fn lookup(&self, at: DateTime<Utc>) -> Num {
        let idx = self.boundaries.partition_point(|b| *b <= at);
        if idx == 0 {
            Num::UNDEFINED
        } else {
            Num::new(self.values[idx - 1])
        }
    }

    /// Look up every instant of a grid.
    pub fn broadcast(&self, times: &[DateTime<Utc>]) -> Vec<Num> {
        times.iter().map(|t| self.lookup(*t)).collect()
    }
}
