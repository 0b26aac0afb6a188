use chrono::{NaiveDate, TimeDelta};
use std::mem::replace;

/// A date range iterator that yields each date from the start date
/// through the end date (inclusive).
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct DateRange(pub NaiveDate, pub NaiveDate);

impl DateRange {
    /// Range covering `days` consecutive dates beginning at `start`.
    /// A zero-length range yields nothing.
    pub fn from_len(start: NaiveDate, days: usize) -> DateRange {
        match days {
            0 => DateRange(start, start.pred_opt().unwrap_or(NaiveDate::MIN)),
            n => DateRange(start, start + TimeDelta::days(n as i64 - 1)),
        }
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0.succ_opt()?;
            Some(replace(&mut self.0, next))
        } else {
            None
        }
    }
}

/// True when every date follows the previous one by exactly one day.
pub fn is_contiguous(dates: &[NaiveDate]) -> bool {
    dates
        .windows(2)
        .all(|pair| pair[0].succ_opt() == Some(pair[1]))
}
