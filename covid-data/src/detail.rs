//! Per-location detail: the chart frame behind a county or state graph and
//! the week-over-week trend figures shown beside it.

use crate::aggregation::{rate_per_100k, rolling_average, ROLLING_WINDOW};
use chrono::NaiveDate;
use covid_jhu::series::DailySeries;
use covid_utils::dates::format_short;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One day of a location's chart data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub date: NaiveDate,
    pub cases: f64,
    pub cases_ave: f64,
    pub cases_rate: Option<f64>,
    pub cases_rate_ave: Option<f64>,
}

/// Chart data for a location, or the explicit "nothing recorded" outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationDetail {
    NoRecordedCases,
    Reported(Vec<DetailRow>),
}

/// Build the detail frame of a new-case series.
///
/// Rows start on the first day with a full 7-day average. Rate columns are
/// `None` when population is 0.
pub fn location_detail(series: &DailySeries, population: u64) -> LocationDetail {
    if series.total() <= 0.0 {
        return LocationDetail::NoRecordedCases;
    }
    let average = rolling_average(series, ROLLING_WINDOW);
    let rate = rate_per_100k(series, population);
    let rate_average = rate_per_100k(&average, population);

    let rows = average
        .iter()
        .filter_map(|(date, cases_ave)| {
            Some(DetailRow {
                date,
                cases: series.value_on(date)?,
                cases_ave,
                cases_rate: rate.as_ref().and_then(|r| r.value_on(date)),
                cases_rate_ave: rate_average.as_ref().and_then(|r| r.value_on(date)),
            })
        })
        .collect();
    LocationDetail::Reported(rows)
}

/// Percent change from `old` to `new`, rounded to a whole percent.
///
/// Growth from zero counts as +100%; zero to zero is 0%.
pub fn percent_change(old: f64, new: f64) -> i64 {
    if old == 0.0 && new > 0.0 {
        100
    } else if old == 0.0 {
        0
    } else {
        ((new - old) / old * 100.0).round_ties_even() as i64
    }
}

/// "+12%" for growth, "-3%" or "0%" otherwise.
pub fn format_percent_change(change: i64) -> String {
    if change > 0 {
        format!("+{}%", change)
    } else {
        format!("{}%", change)
    }
}

/// Latest day plus 7- and 14-day changes of the rolling average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub latest_date: NaiveDate,
    pub latest_cases: f64,
    pub week_change: i64,
    pub two_week_change: i64,
}

impl TrendSummary {
    /// Column headers and cells of the trend table.
    pub fn table(&self) -> [(String, String); 3] {
        [
            (
                format!("New Cases {}", format_short(&self.latest_date)),
                format!("{}", self.latest_cases as i64),
            ),
            (
                "7-Day Trend".to_string(),
                format_percent_change(self.week_change),
            ),
            (
                "14-Day Trend".to_string(),
                format_percent_change(self.two_week_change),
            ),
        ]
    }
}

/// Trend figures for a new-case series; `None` without 15 days of averages.
pub fn trend_summary(series: &DailySeries) -> Option<TrendSummary> {
    let (latest_date, latest_cases) = series.last()?;
    let average = rolling_average(series, ROLLING_WINDOW);
    let n = average.len();
    if n < 15 {
        return None;
    }
    let now = average.values[n - 1];
    let week_ago = average.values[n - 8];
    let two_weeks_ago = average.values[n - 15];
    Some(TrendSummary {
        latest_date,
        latest_cases,
        week_change: percent_change(week_ago, now),
        two_week_change: percent_change(two_weeks_ago, now),
    })
}

/// Week-over-week direction of new cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    /// Fewer than 10 cases in the last week
    NotApplicable,
    FallingQuickly,
    FallingSlowly,
    NoChange,
    RisingSlowly,
    RisingQuickly,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TrendDirection::NotApplicable => "N/A",
            TrendDirection::FallingQuickly => "Falling Quickly",
            TrendDirection::FallingSlowly => "Falling Slowly",
            TrendDirection::NoChange => "No Change",
            TrendDirection::RisingSlowly => "Rising Slowly",
            TrendDirection::RisingQuickly => "Rising Quickly",
        };
        write!(f, "{}", text)
    }
}

/// Compare the last 7 days of new cases with the 7 days before them.
///
/// `None` when the series has fewer than 14 days.
pub fn trend_direction(series: &DailySeries) -> Option<TrendDirection> {
    let n = series.len();
    if n < 14 {
        return None;
    }
    let week: f64 = series.values[n - 7..].iter().sum();
    let week_before: f64 = series.values[n - 14..n - 7].iter().sum();
    let change = if week_before > 0.0 {
        (week / week_before - 1.0) * 100.0
    } else if week == 0.0 {
        0.0
    } else {
        100.0
    };

    let direction = if week < 10.0 {
        TrendDirection::NotApplicable
    } else if change < -20.0 {
        TrendDirection::FallingQuickly
    } else if change < -2.0 {
        TrendDirection::FallingSlowly
    } else if change > 20.0 {
        TrendDirection::RisingQuickly
    } else if change > 2.0 {
        TrendDirection::RisingSlowly
    } else {
        TrendDirection::NoChange
    };
    Some(direction)
}
