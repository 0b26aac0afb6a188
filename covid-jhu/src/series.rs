use crate::date_range::DateRange;
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// A contiguous daily time series: one value per calendar day starting at `start`.
///
/// Used for cumulative counts, daily new cases, rolling averages and rates.
/// Values are `f64` so that every derived series shares one representation;
/// case counts are whole numbers and stay exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub start: NaiveDate,
    pub values: Vec<f64>,
}

impl DailySeries {
    pub fn new(start: NaiveDate, values: Vec<f64>) -> DailySeries {
        DailySeries { start, values }
    }

    /// A series with no observations anchored at `start`.
    pub fn empty(start: NaiveDate) -> DailySeries {
        DailySeries {
            start,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Date of the last observation, if any.
    pub fn end(&self) -> Option<NaiveDate> {
        match self.values.len() {
            0 => None,
            n => Some(self.start + TimeDelta::days(n as i64 - 1)),
        }
    }

    pub fn dates(&self) -> DateRange {
        DateRange::from_len(self.start, self.values.len())
    }

    /// (date, value) pairs in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates().zip(self.values.iter().copied())
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        Some((self.end()?, *self.values.last()?))
    }

    /// Value on a given date, `None` outside the series.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        let offset = (date - self.start).num_days();
        if offset < 0 {
            return None;
        }
        self.values.get(offset as usize).copied()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Restrict the series to dates on or after `cutoff`.
    pub fn since(&self, cutoff: NaiveDate) -> DailySeries {
        if cutoff <= self.start {
            return self.clone();
        }
        let skip = (cutoff - self.start).num_days() as usize;
        if skip >= self.values.len() {
            return DailySeries::empty(cutoff);
        }
        DailySeries::new(cutoff, self.values[skip..].to_vec())
    }

    /// Apply `f` to every value, keeping the dates.
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> DailySeries {
        DailySeries::new(self.start, self.values.iter().map(|v| f(*v)).collect())
    }
}
