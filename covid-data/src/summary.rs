//! Map-ready summary rows.

use crate::aggregation::{rate_per_100k, rolling_average, ROLLING_WINDOW};
use crate::SeriesSet;
use covid_jhu::location::LocationRecord;
use covid_jhu::series::DailySeries;
use covid_jhu::state_meta::StateMetaTable;
use serde::{Deserialize, Serialize};

/// Values at or above this render as whole numbers.
pub const MAX_VAL_FOR_DECIMALS: f64 = 10.0;

/// One map row per location: latest 7-day average, latest rate and the
/// hover label shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummaryRow {
    pub location_id: String,
    pub name: String,
    pub state: String,
    pub population: u64,
    /// `None` when no cases were ever recorded or fewer than 7 days exist
    pub week_average: Option<f64>,
    /// `None` additionally when population is 0
    pub average_rate: Option<f64>,
    pub label: String,
    /// State abbreviation, filled for state rows when metadata is available
    pub abbreviation: Option<String>,
}

impl MapSummaryRow {
    pub fn has_cases(&self) -> bool {
        self.week_average.is_some()
    }
}

/// Latest rolled-up values of one new-case series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatestValues {
    /// The series sums to zero (or is empty): nothing to average
    NoCases,
    Reported {
        week_average: Option<f64>,
        average_rate: Option<f64>,
    },
}

/// Render a number without spurious precision: whole numbers from
/// [`MAX_VAL_FOR_DECIMALS`] up, one decimal place below it.
///
/// Whole-number rounding breaks ties to even.
pub fn custom_number_str(num: f64) -> String {
    if num >= MAX_VAL_FOR_DECIMALS {
        format!("{}", num.round_ties_even() as i64)
    } else {
        format!("{:.1}", num)
    }
}

/// Final 7-day average and final per-100k rate of a new-case series.
pub fn latest_values(series: &DailySeries, population: u64) -> LatestValues {
    if series.total() <= 0.0 {
        return LatestValues::NoCases;
    }
    let average = rolling_average(series, ROLLING_WINDOW);
    let week_average = average.last().map(|(_, value)| value);
    let average_rate = rate_per_100k(&average, population)
        .and_then(|rate| rate.last())
        .map(|(_, value)| value);
    LatestValues::Reported {
        week_average,
        average_rate,
    }
}

fn label_for(title: &str, latest: LatestValues) -> String {
    match latest {
        LatestValues::NoCases => format!("<b>{}</b><br>No recorded positive cases", title),
        LatestValues::Reported {
            week_average,
            average_rate,
        } => format!(
            "<b>{}</b><br>Avg. Daily Cases: {}<br>Per 100k: {}",
            title,
            week_average.map_or_else(|| "N/A".to_string(), custom_number_str),
            average_rate.map_or_else(|| "N/A".to_string(), custom_number_str),
        ),
    }
}

/// One summary row per location record.
///
/// `locations` supplies names and populations; a location without an entry
/// in `series_set` is summarized as having no cases.
pub fn build_map_summary(series_set: &SeriesSet, locations: &[LocationRecord]) -> Vec<MapSummaryRow> {
    locations
        .iter()
        .map(|location| {
            let latest = match series_set.get(&location.id) {
                Some(series) => latest_values(series, location.population),
                None => LatestValues::NoCases,
            };
            let (week_average, average_rate) = match latest {
                LatestValues::NoCases => (None, None),
                LatestValues::Reported {
                    week_average,
                    average_rate,
                } => (week_average, average_rate),
            };
            MapSummaryRow {
                location_id: location.id.clone(),
                name: location.name.clone(),
                state: location.state.clone(),
                population: location.population,
                week_average,
                average_rate,
                label: label_for(&location.display_name(), latest),
                abbreviation: None,
            }
        })
        .collect()
}

/// Copy of `rows` with state abbreviations filled from `meta`.
pub fn with_abbreviations(rows: &[MapSummaryRow], meta: &StateMetaTable) -> Vec<MapSummaryRow> {
    rows.iter()
        .map(|row| MapSummaryRow {
            abbreviation: meta.abbreviation(&row.state).map(String::from),
            ..row.clone()
        })
        .collect()
}
