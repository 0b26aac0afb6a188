//! The full load → transform → aggregate run.

use crate::aggregation::{aggregate_to_state, EXCLUDED_ENTITIES};
use crate::incremental::build_new_case_set;
use crate::snapshot::FreshDataSnapshot;
use crate::summary::{build_map_summary, with_abbreviations};
use chrono::{DateTime, NaiveDate, Utc};
use covid_jhu::error::{CovidError, Result};
use covid_jhu::raw_table::RawTable;
use covid_jhu::source::{DataSource, TableKind};
use covid_jhu::state_meta::StateMetaTable;
use log::info;

/// First day reported in derived series. Earlier days are a long near-zero
/// preamble that flattens every chart.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 1).unwrap_or(NaiveDate::MIN)
}

/// Knobs of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// New-case series are cut to dates on or after this day
    pub start_date: NaiveDate,
    /// `Province_State` values left out of state and national rollups
    pub excluded_entities: Vec<String>,
    /// Used to annotate state map rows with abbreviations
    pub state_meta: Option<StateMetaTable>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            start_date: default_start_date(),
            excluded_entities: EXCLUDED_ENTITIES.iter().map(|s| s.to_string()).collect(),
            state_meta: None,
        }
    }
}

/// Build every derived table from the two raw tables.
///
/// Pure: identical tables and options give an identical snapshot apart from
/// `created_at`.
pub fn build_snapshot(
    cases: RawTable,
    deaths: RawTable,
    options: &PipelineOptions,
    created_at: DateTime<Utc>,
) -> Result<FreshDataSnapshot> {
    let joined = cases.join_population(&deaths);

    // States count every row of the state, including buckets that are not counties
    let state_records = aggregate_to_state(&joined.uid_records(), &options.excluded_entities);
    let county_records = joined.sanitize().county_records();
    if county_records.is_empty() {
        return Err(CovidError::SourceUnavailable(
            "No county rows survived cleanup".to_string(),
        ));
    }

    let cutoff = Some(options.start_date);
    let county_new_cases = build_new_case_set(&county_records, cutoff);
    let state_new_cases = build_new_case_set(&state_records, cutoff);

    let county_map = build_map_summary(&county_new_cases, &county_records);
    let state_map = build_map_summary(&state_new_cases, &state_records);
    let state_map = match &options.state_meta {
        Some(meta) => with_abbreviations(&state_map, meta),
        None => state_map,
    };

    info!(
        "[COVID Debug] pipeline: Built {} county and {} state series",
        county_new_cases.len(),
        state_new_cases.len()
    );
    Ok(FreshDataSnapshot {
        created_at,
        county_new_cases,
        county_map,
        state_new_cases,
        state_map,
    })
}

/// Fetch both raw tables from `source` and build a snapshot.
pub fn run_pipeline(
    source: &dyn DataSource,
    options: &PipelineOptions,
    created_at: DateTime<Utc>,
) -> Result<FreshDataSnapshot> {
    let deaths = RawTable::load(source, TableKind::Deaths)?;
    let cases = RawTable::load(source, TableKind::Cases)?;
    build_snapshot(cases, deaths, options, created_at)
}
