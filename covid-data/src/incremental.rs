//! Cumulative-to-daily conversion.

use crate::SeriesSet;
use chrono::NaiveDate;
use covid_jhu::location::LocationRecord;
use covid_jhu::series::DailySeries;
use log::debug;

/// Daily new counts from a cumulative series.
///
/// First difference with the first (baseline-less) day dropped, clipped to a
/// floor of 0. A downward revision in the source shows up as a zero day
/// rather than a negative count. Fewer than 2 observations gives an empty
/// series.
pub fn new_cases(cumulative: &DailySeries) -> DailySeries {
    let start = cumulative.start.succ_opt().unwrap_or(cumulative.start);
    if cumulative.len() < 2 {
        return DailySeries::empty(start);
    }
    let values = cumulative
        .values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0.0))
        .collect();
    DailySeries::new(start, values)
}

/// New-case series for every record, restricted to dates on or after `cutoff`.
pub fn build_new_case_set(records: &[LocationRecord], cutoff: Option<NaiveDate>) -> SeriesSet {
    let set: SeriesSet = records
        .iter()
        .map(|record| {
            let daily = new_cases(&record.cumulative);
            let daily = match cutoff {
                Some(cutoff) => daily.since(cutoff),
                None => daily,
            };
            (record.id.clone(), daily)
        })
        .collect();
    debug!("Built {} new-case series", set.len());
    set
}
