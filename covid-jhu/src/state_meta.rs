use crate::error::{CovidError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static metadata for one state: abbreviation, map framing and state code.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StateMeta {
    pub state: String,
    pub abbr: String,
    /// Two-digit state code, kept as text to preserve the leading zero
    pub fips: String,
    pub zoom: f64,
    pub lat: f64,
    pub lon: f64,
}

/// Read-only lookup of state metadata keyed by state name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMetaTable {
    states: BTreeMap<String, StateMeta>,
}

impl StateMetaTable {
    /// Parse a CSV string of state metadata.
    ///
    /// Expected CSV columns (with headers): state, abbr, fips, zoom, lat, lon
    pub fn parse_csv(csv_object: &str) -> Result<StateMetaTable> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_object.as_bytes());
        let mut states = BTreeMap::new();
        for row in rdr.deserialize() {
            let meta: StateMeta = row.map_err(|e| {
                CovidError::SourceUnavailable(format!("Failed to parse state metadata: {}", e))
            })?;
            states.insert(meta.state.clone(), meta);
        }
        Ok(StateMetaTable { states })
    }

    pub fn get(&self, state: &str) -> Option<&StateMeta> {
        self.states.get(state)
    }

    pub fn abbreviation(&self, state: &str) -> Option<&str> {
        self.get(state).map(|meta| meta.abbr.as_str())
    }

    /// State names in alphabetical order, for selection lists.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
