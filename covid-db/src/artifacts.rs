//! The four named artifacts of a snapshot.
//!
//! Bodies are JSON. Floats are written in shortest round-trip form and read
//! back exactly, dates as ISO `YYYY-MM-DD`.

use crate::ArtifactStore;
use chrono::{DateTime, Utc};
use covid_data::snapshot::FreshDataSnapshot;
use covid_data::summary::MapSummaryRow;
use covid_data::SeriesSet;
use covid_jhu::error::{CovidError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const COUNTY_NEW_CASES: &str = "county_new_cases";
pub const COUNTY_MAP: &str = "county_map";
pub const STATE_NEW_CASES: &str = "state_new_cases";
pub const STATE_MAP: &str = "state_map";

pub const ALL_ARTIFACTS: [&str; 4] = [COUNTY_NEW_CASES, COUNTY_MAP, STATE_NEW_CASES, STATE_MAP];

fn encode<T: Serialize>(name: &str, table: &T) -> Result<String> {
    serde_json::to_string(table).map_err(|e| CovidError::persistence(name, e))
}

pub fn save_table<T: Serialize>(store: &dyn ArtifactStore, name: &str, table: &T) -> Result<()> {
    store.save(name, &encode(name, table)?)
}

pub fn load_table<T: DeserializeOwned>(store: &dyn ArtifactStore, name: &str) -> Result<T> {
    let body = store.load(name)?;
    serde_json::from_str(&body).map_err(|e| CovidError::persistence(name, e))
}

/// Persist every table of `snapshot` under its artifact name.
///
/// All bodies are encoded before anything is written.
pub fn save_snapshot(store: &dyn ArtifactStore, snapshot: &FreshDataSnapshot) -> Result<()> {
    let bodies = [
        (COUNTY_NEW_CASES, encode(COUNTY_NEW_CASES, &snapshot.county_new_cases)?),
        (COUNTY_MAP, encode(COUNTY_MAP, &snapshot.county_map)?),
        (STATE_NEW_CASES, encode(STATE_NEW_CASES, &snapshot.state_new_cases)?),
        (STATE_MAP, encode(STATE_MAP, &snapshot.state_map)?),
    ];
    store.save_all(&bodies)
}

/// Read the four artifacts back into a snapshot stamped `created_at`.
pub fn load_snapshot(store: &dyn ArtifactStore, created_at: DateTime<Utc>) -> Result<FreshDataSnapshot> {
    let county_new_cases: SeriesSet = load_table(store, COUNTY_NEW_CASES)?;
    let county_map: Vec<MapSummaryRow> = load_table(store, COUNTY_MAP)?;
    let state_new_cases: SeriesSet = load_table(store, STATE_NEW_CASES)?;
    let state_map: Vec<MapSummaryRow> = load_table(store, STATE_MAP)?;
    Ok(FreshDataSnapshot {
        created_at,
        county_new_cases,
        county_map,
        state_new_cases,
        state_map,
    })
}

/// True when every artifact of a snapshot is present.
pub fn has_snapshot(store: &dyn ArtifactStore) -> Result<bool> {
    for name in ALL_ARTIFACTS {
        if !store.contains(name)? {
            return Ok(false);
        }
    }
    Ok(true)
}
