//! Loading and cleanup of the raw wide-format John Hopkins tables.
//!
//! # CSV Format
//!
//! One row per location. Identifying columns come first, followed by one
//! column per calendar day holding the cumulative count as of that day:
//!
//! ```text
//! UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,1/22/20,1/23/20
//! 84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.53,-86.64,"Autauga, Alabama, US",55869,0,0
//! ```
//!
//! Only the deaths table has a `Population` column. Columns are located by
//! header name, so extra identifying columns are ignored.

use crate::date_range::is_contiguous;
use crate::error::{CovidError, Result};
use crate::location::{normalize_location_code, Granularity, LocationRecord};
use crate::series::DailySeries;
use crate::source::{DataSource, TableKind};
use chrono::NaiveDate;
use covid_utils::dates::parse_header_date;
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

pub const UID_COLUMN: &str = "UID";
pub const FIPS_COLUMN: &str = "FIPS";
pub const COUNTY_COLUMN: &str = "Admin2";
pub const STATE_COLUMN: &str = "Province_State";
pub const POPULATION_COLUMN: &str = "Population";

/// County name used by the source for cases not attributed to any county.
pub const UNASSIGNED: &str = "Unassigned";

/// Prefix of the "Out of <state>" buckets.
pub const OUT_OF_MARKER: &str = "Out of";

/// One row of a raw table, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Internal source identifier, present on every row
    pub uid: String,
    /// Location code as found in the file ("1001.0"), or normalized after sanitize
    pub fips: Option<String>,
    pub county: Option<String>,
    pub state: String,
    pub population: Option<i64>,
    /// Cumulative counts aligned with [`RawTable::dates`]
    pub cumulative: Vec<i64>,
}

/// A parsed raw table: contiguous ascending dates plus one row per location.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawRow>,
}

struct ColumnLayout {
    uid: usize,
    fips: usize,
    county: usize,
    state: usize,
    population: Option<usize>,
    /// (column index, date) sorted by date
    dates: Vec<(usize, NaiveDate)>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<ColumnLayout> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                CovidError::SourceUnavailable(format!("Missing required column '{}'", name))
            })
        };

        let mut dates: Vec<(usize, NaiveDate)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| parse_header_date(h).map(|date| (idx, date)))
            .collect();
        if dates.is_empty() {
            return Err(CovidError::SourceUnavailable(
                "No M/D/YY date columns found".to_string(),
            ));
        }
        dates.sort_by_key(|(_, date)| *date);
        let ordered: Vec<NaiveDate> = dates.iter().map(|(_, date)| *date).collect();
        if !is_contiguous(&ordered) {
            return Err(CovidError::SourceUnavailable(
                "Date columns are not one per calendar day".to_string(),
            ));
        }

        Ok(ColumnLayout {
            uid: require(UID_COLUMN)?,
            fips: require(FIPS_COLUMN)?,
            county: require(COUNTY_COLUMN)?,
            state: require(STATE_COLUMN)?,
            population: find(POPULATION_COLUMN),
            dates,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_count(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i64)
    })
}

impl RawTable {
    /// Fetch one table from `source` and parse it.
    pub fn load(source: &dyn DataSource, kind: TableKind) -> Result<RawTable> {
        let bytes = source.fetch(kind)?;
        let table = RawTable::parse(&bytes)?;
        info!(
            "[COVID Debug] raw_table: Loaded {} table with {} rows over {} days",
            kind,
            table.rows.len(),
            table.dates.len()
        );
        Ok(table)
    }

    /// Parse CSV bytes into a raw table.
    ///
    /// Schema problems (missing columns, no date columns, ragged rows) are
    /// `SourceUnavailable`. A row whose counts cannot be read is dropped.
    pub fn parse(bytes: &[u8]) -> Result<RawTable> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let layout = ColumnLayout::from_headers(rdr.headers()?)?;

        let mut rows = Vec::new();
        let mut skipped = 0u32;
        for result in rdr.records() {
            let record = result?;
            let uid = match non_empty(record.get(layout.uid)) {
                Some(uid) => uid,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let state = match non_empty(record.get(layout.state)) {
                Some(state) => state,
                None => {
                    warn!("{}", CovidError::invalid_location(&uid, "missing state name"));
                    skipped += 1;
                    continue;
                }
            };
            let cumulative: Option<Vec<i64>> = layout
                .dates
                .iter()
                .map(|(idx, _)| record.get(*idx).and_then(parse_count))
                .collect();
            let cumulative = match cumulative {
                Some(values) => values,
                None => {
                    warn!("{}", CovidError::invalid_location(&uid, "unreadable cumulative count"));
                    skipped += 1;
                    continue;
                }
            };
            let population = layout
                .population
                .and_then(|idx| record.get(idx))
                .and_then(parse_count);

            rows.push(RawRow {
                uid,
                fips: non_empty(record.get(layout.fips)),
                county: non_empty(record.get(layout.county)),
                state,
                population,
                cumulative,
            });
        }
        if skipped > 0 {
            debug!("[COVID Debug] raw_table: Skipped {} unreadable rows", skipped);
        }

        Ok(RawTable {
            dates: layout.dates.into_iter().map(|(_, date)| date).collect(),
            rows,
        })
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Drop rows that cannot be treated as counties and normalize location codes.
    ///
    /// Removed: rows without population or location code, the "Unassigned" and
    /// "Out of <state>" buckets, and rows whose code is not an integer that fits
    /// in five digits.
    pub fn sanitize(self) -> RawTable {
        let before = self.rows.len();
        let rows: Vec<RawRow> = self
            .rows
            .into_iter()
            .filter_map(|row| {
                if row.population.is_none() {
                    debug!("Skipping {}: missing population", row.uid);
                    return None;
                }
                let raw_code = match &row.fips {
                    Some(code) => code,
                    None => {
                        debug!("Skipping {}: missing location code", row.uid);
                        return None;
                    }
                };
                let county = match &row.county {
                    Some(county) => county,
                    None => {
                        debug!("Skipping {}: missing county name", row.uid);
                        return None;
                    }
                };
                if county == UNASSIGNED || county.contains(OUT_OF_MARKER) {
                    return None;
                }
                match normalize_location_code(raw_code) {
                    Some(code) => Some(RawRow {
                        fips: Some(code),
                        ..row
                    }),
                    None => {
                        warn!(
                            "{}",
                            CovidError::invalid_location(
                                &row.uid,
                                format!("unparseable location code '{}'", raw_code)
                            )
                        );
                        None
                    }
                }
            })
            .collect();
        info!(
            "[COVID Debug] raw_table: Sanitized {} rows down to {} counties",
            before,
            rows.len()
        );
        RawTable {
            dates: self.dates,
            rows,
        }
    }

    /// Attach the deaths table's population to each cases row, matching on the
    /// source `UID`. Rows whose UID is missing from `deaths` are dropped.
    pub fn join_population(self, deaths: &RawTable) -> RawTable {
        let uid_population: HashMap<&str, Option<i64>> = deaths
            .rows
            .iter()
            .map(|row| (row.uid.as_str(), row.population))
            .collect();

        let before = self.rows.len();
        let rows: Vec<RawRow> = self
            .rows
            .into_iter()
            .filter_map(|row| {
                let population = *uid_population.get(row.uid.as_str())?;
                Some(RawRow { population, ..row })
            })
            .collect();
        if rows.len() < before {
            info!(
                "Excluded {} cases rows with no matching deaths row",
                before - rows.len()
            );
        }
        RawTable {
            dates: self.dates,
            rows,
        }
    }

    fn series_for(&self, row: &RawRow) -> Option<DailySeries> {
        let start = self.start_date()?;
        Some(DailySeries::new(
            start,
            row.cumulative.iter().map(|v| *v as f64).collect(),
        ))
    }

    /// County records from a sanitized table, keyed by normalized location code.
    ///
    /// Duplicate codes keep the first row; negative populations are dropped.
    pub fn county_records(&self) -> Vec<LocationRecord> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut records = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let (Some(code), Some(county), Some(population)) =
                (row.fips.as_deref(), row.county.as_deref(), row.population)
            else {
                continue;
            };
            if population < 0 {
                warn!("{}", CovidError::invalid_location(code, "negative population"));
                continue;
            }
            if !seen.insert(code) {
                warn!("{}", CovidError::invalid_location(code, "duplicate location code"));
                continue;
            }
            let Some(cumulative) = self.series_for(row) else {
                continue;
            };
            records.push(LocationRecord {
                id: code.to_string(),
                name: county.to_string(),
                state: row.state.clone(),
                population: population as u64,
                granularity: Granularity::County,
                cumulative,
            });
        }
        records
    }

    /// Every row as a record keyed by source UID, population defaulting to 0.
    ///
    /// Used for state rollups, which count unassigned and out-of-state cases
    /// toward their state even though those rows are not counties.
    pub fn uid_records(&self) -> Vec<LocationRecord> {
        self.rows
            .iter()
            .filter_map(|row| {
                Some(LocationRecord {
                    id: row.uid.clone(),
                    name: row.county.clone().unwrap_or_else(|| row.state.clone()),
                    state: row.state.clone(),
                    population: row.population.unwrap_or(0).max(0) as u64,
                    granularity: Granularity::County,
                    cumulative: self.series_for(row)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;

    const CASES_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,1/22/20,1/23/20,1/24/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",5,5,8
84001003,US,USA,840,1003.0,Baldwin,Alabama,US,30.7,-87.7,\"Baldwin, Alabama, US\",1,2,3
84090001,US,USA,840,90001.0,Unassigned,Alabama,US,0,0,\"Unassigned, Alabama, US\",0,1,1
84080001,US,USA,840,80001.0,Out of AL,Alabama,US,0,0,\"Out of AL, Alabama, US\",0,0,2
84099999,US,USA,840,,,Alabama,US,0,0,\"Alabama, US\",0,0,0
84077777,US,USA,840,abc,Nowhere,Alabama,US,0,0,\"Nowhere, Alabama, US\",0,0,0
84088888,US,USA,840,1005.0,Barbour,Alabama,US,0,0,\"Barbour, Alabama, US\",3,4,5
";

    const DEATHS_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,1/22/20,1/23/20,1/24/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",55869,0,0,1
84001003,US,USA,840,1003.0,Baldwin,Alabama,US,30.7,-87.7,\"Baldwin, Alabama, US\",223234,0,0,0
84090001,US,USA,840,90001.0,Unassigned,Alabama,US,0,0,\"Unassigned, Alabama, US\",0,0,0,0
84080001,US,USA,840,80001.0,Out of AL,Alabama,US,0,0,\"Out of AL, Alabama, US\",0,0,0,0
84099999,US,USA,840,,,Alabama,US,0,0,\"Alabama, US\",,0,0,0
84077777,US,USA,840,abc,Nowhere,Alabama,US,0,0,\"Nowhere, Alabama, US\",10,0,0,0
";

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    #[test]
    fn parse_reads_dates_and_rows() {
        let table = RawTable::parse(CASES_CSV.as_bytes()).unwrap();
        assert_eq!(table.dates, vec![jan(22), jan(23), jan(24)]);
        assert_eq!(table.rows.len(), 7);
        let autauga = &table.rows[0];
        assert_eq!(autauga.uid, "84001001");
        assert_eq!(autauga.fips.as_deref(), Some("1001.0"));
        assert_eq!(autauga.county.as_deref(), Some("Autauga"));
        assert_eq!(autauga.population, None);
        assert_eq!(autauga.cumulative, vec![5, 5, 8]);
    }

    #[test]
    fn parse_sorts_out_of_order_date_columns() {
        let csv = "UID,FIPS,Admin2,Province_State,1/23/20,1/22/20\n1,1001,A,Alabama,7,3\n";
        let table = RawTable::parse(csv.as_bytes()).unwrap();
        assert_eq!(table.dates, vec![jan(22), jan(23)]);
        assert_eq!(table.rows[0].cumulative, vec![3, 7]);
    }

    #[test]
    fn parse_rejects_missing_columns() {
        let csv = "UID,Admin2,Province_State,1/22/20\n1,A,Alabama,3\n";
        let err = RawTable::parse(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CovidError::SourceUnavailable(_)));
    }

    #[test]
    fn parse_rejects_tables_without_dates() {
        let csv = "UID,FIPS,Admin2,Province_State\n1,1001,A,Alabama\n";
        let err = RawTable::parse(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CovidError::SourceUnavailable(_)));
    }

    #[test]
    fn parse_rejects_gaps_in_dates() {
        let csv = "UID,FIPS,Admin2,Province_State,1/22/20,1/24/20\n1,1001,A,Alabama,3,4\n";
        let err = RawTable::parse(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CovidError::SourceUnavailable(_)));
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let csv = "UID,FIPS,Admin2,Province_State,1/22/20\n1,1001,A\n";
        assert!(RawTable::parse(csv.as_bytes()).is_err());
    }

    #[test]
    fn parse_drops_rows_with_unreadable_counts() {
        let csv = "UID,FIPS,Admin2,Province_State,1/22/20\n1,1001,A,Alabama,x\n2,1003,B,Alabama,4\n";
        let table = RawTable::parse(csv.as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].uid, "2");
    }

    #[test]
    fn load_reports_source_failure() {
        struct Broken;
        impl DataSource for Broken {
            fn fetch(&self, _kind: TableKind) -> Result<Vec<u8>> {
                Err(CovidError::SourceUnavailable("offline".to_string()))
            }
        }
        let err = RawTable::load(&Broken, TableKind::Cases).unwrap_err();
        assert_eq!(err, CovidError::SourceUnavailable("offline".to_string()));
    }

    #[test]
    fn join_population_takes_deaths_population() {
        let source = StaticSource::new(CASES_CSV, DEATHS_CSV);
        let cases = RawTable::load(&source, TableKind::Cases).unwrap();
        let deaths = RawTable::load(&source, TableKind::Deaths).unwrap();
        let joined = cases.join_population(&deaths);

        // Barbour (84088888) has no deaths row
        assert_eq!(joined.rows.len(), 6);
        assert!(joined.rows.iter().all(|r| r.uid != "84088888"));
        assert_eq!(joined.rows[0].population, Some(55869));
        assert_eq!(joined.rows[1].population, Some(223234));
        // The state-level row carries no population in the deaths file
        let state_row = joined.rows.iter().find(|r| r.uid == "84099999").unwrap();
        assert_eq!(state_row.population, None);
    }

    #[test]
    fn sanitize_keeps_only_real_counties() {
        let source = StaticSource::new(CASES_CSV, DEATHS_CSV);
        let cases = RawTable::load(&source, TableKind::Cases).unwrap();
        let deaths = RawTable::load(&source, TableKind::Deaths).unwrap();
        let counties = cases.join_population(&deaths).sanitize();

        let codes: Vec<&str> = counties
            .rows
            .iter()
            .filter_map(|r| r.fips.as_deref())
            .collect();
        assert_eq!(codes, vec!["01001", "01003"]);
    }

    #[test]
    fn county_records_are_keyed_by_code() {
        let source = StaticSource::new(CASES_CSV, DEATHS_CSV);
        let cases = RawTable::load(&source, TableKind::Cases).unwrap();
        let deaths = RawTable::load(&source, TableKind::Deaths).unwrap();
        let records = cases.join_population(&deaths).sanitize().county_records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "01001");
        assert_eq!(records[0].display_name(), "Autauga County, Alabama");
        assert_eq!(records[0].population, 55869);
        assert_eq!(records[0].cumulative.start, jan(22));
        assert_eq!(records[0].cumulative.values, vec![5.0, 5.0, 8.0]);
    }

    #[test]
    fn uid_records_include_unassigned_buckets() {
        let source = StaticSource::new(CASES_CSV, DEATHS_CSV);
        let cases = RawTable::load(&source, TableKind::Cases).unwrap();
        let deaths = RawTable::load(&source, TableKind::Deaths).unwrap();
        let records = cases.join_population(&deaths).uid_records();

        assert_eq!(records.len(), 6);
        let unassigned = records.iter().find(|r| r.id == "84090001").unwrap();
        assert_eq!(unassigned.cumulative.values, vec![0.0, 1.0, 1.0]);
        let state_row = records.iter().find(|r| r.id == "84099999").unwrap();
        assert_eq!(state_row.population, 0);
        assert_eq!(state_row.name, "Alabama");
    }
}
