//! County to state to national rollups, rolling averages and per-capita rates.

use chrono::TimeDelta;
use covid_jhu::location::{Granularity, LocationRecord, USA_ID};
use covid_jhu::series::DailySeries;
use log::info;
use std::collections::BTreeMap;

/// Width of the trailing mean window, in days.
pub const ROLLING_WINDOW: usize = 7;

/// Rates are expressed per this many people.
pub const PER_CAPITA_SCALE: f64 = 100_000.0;

/// Entities the source reports under `Province_State` that are not states
/// and have no matching population rows: two cruise ships and four
/// territories. Including them would distort per-capita state rates.
pub const EXCLUDED_ENTITIES: [&str; 6] = [
    "Diamond Princess",
    "Grand Princess",
    "Guam",
    "American Samoa",
    "Northern Mariana Islands",
    "Virgin Islands",
];

/// Day-by-day sum of several series.
///
/// The result spans the earliest start through the latest end. A series only
/// contributes on the days it covers; nothing is back-filled for it. Empty
/// inputs are ignored and `None` is returned when nothing remains.
pub fn sum_series<'a, I>(series: I) -> Option<DailySeries>
where
    I: IntoIterator<Item = &'a DailySeries>,
{
    let inputs: Vec<&DailySeries> = series.into_iter().filter(|s| !s.is_empty()).collect();
    let start = inputs.iter().map(|s| s.start).min()?;
    let end = inputs.iter().filter_map(|s| s.end()).max()?;
    let days = (end - start).num_days() as usize + 1;

    let mut totals = vec![0.0; days];
    for input in inputs {
        let offset = (input.start - start).num_days() as usize;
        for (i, value) in input.values.iter().enumerate() {
            totals[offset + i] += value;
        }
    }
    Some(DailySeries::new(start, totals))
}

/// Group location records by state, summing counts and population.
///
/// Entities named in `excluded` are dropped. A synthetic [`USA_ID`] record
/// summing every retained state is appended last.
pub fn aggregate_to_state(records: &[LocationRecord], excluded: &[String]) -> Vec<LocationRecord> {
    let mut by_state: BTreeMap<&str, Vec<&LocationRecord>> = BTreeMap::new();
    for record in records {
        if excluded.iter().any(|e| e == &record.state) {
            continue;
        }
        by_state.entry(record.state.as_str()).or_default().push(record);
    }

    let mut states: Vec<LocationRecord> = by_state
        .into_iter()
        .filter_map(|(state, members)| {
            let cumulative = sum_series(members.iter().map(|r| &r.cumulative))?;
            Some(LocationRecord {
                id: state.to_string(),
                name: state.to_string(),
                state: state.to_string(),
                population: members.iter().map(|r| r.population).sum(),
                granularity: Granularity::State,
                cumulative,
            })
        })
        .collect();

    if let Some(cumulative) = sum_series(states.iter().map(|s| &s.cumulative)) {
        let usa = LocationRecord {
            id: USA_ID.to_string(),
            name: USA_ID.to_string(),
            state: USA_ID.to_string(),
            population: states.iter().map(|s| s.population).sum(),
            granularity: Granularity::Nation,
            cumulative,
        };
        states.push(usa);
    }
    info!(
        "[COVID Debug] aggregation: Rolled {} records into {} states plus national total",
        records.len(),
        states.len().saturating_sub(1)
    );
    states
}

/// Trailing mean over `window` days.
///
/// The value on day i is the mean of days [i - window + 1, i], so the first
/// `window - 1` days are undefined and absent; the result starts that many
/// days after the input.
pub fn rolling_average(series: &DailySeries, window: usize) -> DailySeries {
    let window = window.max(1);
    let start = series.start + TimeDelta::days(window as i64 - 1);
    if series.len() < window {
        return DailySeries::empty(start);
    }
    let values = series
        .values
        .windows(window)
        .map(|days| days.iter().sum::<f64>() / window as f64)
        .collect();
    DailySeries::new(start, values)
}

/// Elementwise `value / population * 100000`.
///
/// `None` when population is 0: such locations have no rate, rather than an
/// infinite one.
pub fn rate_per_100k(series: &DailySeries, population: u64) -> Option<DailySeries> {
    if population == 0 {
        return None;
    }
    let population = population as f64;
    Some(series.map(|value| value / population * PER_CAPITA_SCALE))
}
