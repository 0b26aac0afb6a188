use crate::detail::{location_detail, trend_summary, LocationDetail, TrendSummary};
use crate::summary::MapSummaryRow;
use crate::SeriesSet;
use chrono::{DateTime, Utc};
use covid_jhu::location::{county_display_name, USA_ID};
use covid_jhu::series::DailySeries;
use serde::{Deserialize, Serialize};

/// Every derived table produced by one pipeline run.
///
/// A snapshot is never modified after construction; a refresh builds a new
/// one and swaps it in whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshDataSnapshot {
    pub created_at: DateTime<Utc>,
    pub county_new_cases: SeriesSet,
    pub county_map: Vec<MapSummaryRow>,
    pub state_new_cases: SeriesSet,
    pub state_map: Vec<MapSummaryRow>,
}

impl FreshDataSnapshot {
    fn county_row(&self, location_id: &str) -> Option<&MapSummaryRow> {
        self.county_map.iter().find(|row| row.location_id == location_id)
    }

    fn state_row(&self, state: &str) -> Option<&MapSummaryRow> {
        self.state_map.iter().find(|row| row.location_id == state)
    }

    pub fn county_population(&self, location_id: &str) -> Option<u64> {
        self.county_row(location_id).map(|row| row.population)
    }

    /// "Larimer County, Colorado" for a county code.
    pub fn county_name(&self, location_id: &str) -> Option<String> {
        self.county_row(location_id)
            .map(|row| county_display_name(&row.name, &row.state))
    }

    pub fn state_population(&self, state: &str) -> Option<u64> {
        self.state_row(state).map(|row| row.population)
    }

    /// (code, display name) pairs for a county selection list.
    pub fn county_options(&self) -> Vec<(String, String)> {
        self.county_map
            .iter()
            .map(|row| {
                (
                    row.location_id.clone(),
                    county_display_name(&row.name, &row.state),
                )
            })
            .collect()
    }

    /// National new cases.
    pub fn usa_new_cases(&self) -> Option<&DailySeries> {
        self.state_new_cases.get(USA_ID)
    }

    /// Chart data for a county; `None` for an unknown code.
    pub fn county_detail(&self, location_id: &str) -> Option<LocationDetail> {
        let series = self.county_new_cases.get(location_id)?;
        let population = self.county_population(location_id).unwrap_or(0);
        Some(location_detail(series, population))
    }

    /// Chart data for a state or [`USA_ID`]; `None` for an unknown name.
    pub fn state_detail(&self, state: &str) -> Option<LocationDetail> {
        let series = self.state_new_cases.get(state)?;
        let population = self.state_population(state).unwrap_or(0);
        Some(location_detail(series, population))
    }

    /// Trend figures for a county code or state name.
    pub fn trend(&self, location_id: &str) -> Option<TrendSummary> {
        let series = self
            .county_new_cases
            .get(location_id)
            .or_else(|| self.state_new_cases.get(location_id))?;
        trend_summary(series)
    }

    /// Snapshot with the same tables and a new creation time.
    pub fn restamped(&self, created_at: DateTime<Utc>) -> FreshDataSnapshot {
        FreshDataSnapshot {
            created_at,
            ..self.clone()
        }
    }
}
