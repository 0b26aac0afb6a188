//! Sources of the two raw wide-format tables.
//!
//! A [`DataSource`] only hands back bytes; parsing happens in
//! [`crate::raw_table::RawTable::load`].

use crate::error::{CovidError, Result};
use std::path::PathBuf;

#[cfg(feature = "api")]
use log::{info, warn};
#[cfg(feature = "api")]
use std::{thread::sleep, time::Duration};

/// Cumulative confirmed cases per US county.
pub const CASES_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_US.csv";

/// Cumulative deaths per US county; also carries the population column.
pub const DEATHS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_US.csv";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which of the two raw tables to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Cases,
    Deaths,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Cases => write!(f, "cases"),
            TableKind::Deaths => write!(f, "deaths"),
        }
    }
}

/// Opaque provider of raw table bytes.
pub trait DataSource: Send + Sync {
    fn fetch(&self, kind: TableKind) -> Result<Vec<u8>>;
}

/// Raw tables held in memory, e.g. embedded fixtures or a previous download.
#[derive(Debug, Clone)]
pub struct StaticSource {
    pub cases: String,
    pub deaths: String,
}

impl StaticSource {
    pub fn new(cases: impl Into<String>, deaths: impl Into<String>) -> StaticSource {
        StaticSource {
            cases: cases.into(),
            deaths: deaths.into(),
        }
    }
}

impl DataSource for StaticSource {
    fn fetch(&self, kind: TableKind) -> Result<Vec<u8>> {
        let body = match kind {
            TableKind::Cases => &self.cases,
            TableKind::Deaths => &self.deaths,
        };
        Ok(body.as_bytes().to_vec())
    }
}

/// Local copies of the two raw CSV files.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub cases_path: PathBuf,
    pub deaths_path: PathBuf,
}

impl FileSource {
    pub fn new(cases_path: impl Into<PathBuf>, deaths_path: impl Into<PathBuf>) -> FileSource {
        FileSource {
            cases_path: cases_path.into(),
            deaths_path: deaths_path.into(),
        }
    }
}

impl DataSource for FileSource {
    fn fetch(&self, kind: TableKind) -> Result<Vec<u8>> {
        let path = match kind {
            TableKind::Cases => &self.cases_path,
            TableKind::Deaths => &self.deaths_path,
        };
        std::fs::read(path).map_err(|e| {
            CovidError::SourceUnavailable(format!(
                "Failed to read {} table from {}: {}",
                kind,
                path.display(),
                e
            ))
        })
    }
}

/// Settings for the HTTP source.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSourceConfig {
    pub cases_url: String,
    pub deaths_url: String,
    pub timeout_secs: u64,
    pub max_tries: u32,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        HttpSourceConfig {
            cases_url: CASES_URL.to_string(),
            deaths_url: DEATHS_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tries: 3,
        }
    }
}

/// Fetches the raw tables over HTTP with a request timeout and retry with
/// exponential backoff.
#[cfg(feature = "api")]
pub struct HttpSource {
    config: HttpSourceConfig,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "api")]
impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Result<HttpSource> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CovidError::SourceUnavailable(format!("Failed to build client: {}", e)))?;
        Ok(HttpSource { config, client })
    }

    fn url(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Cases => &self.config.cases_url,
            TableKind::Deaths => &self.config.deaths_url,
        }
    }

    fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| format!("Request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(format!("Bad response status: {}", response.status()));
        }
        let body = response
            .bytes()
            .map_err(|e| format!("Failed to read response body: {}", e))?;
        if body.len() <= 2 {
            return Err("Empty response".to_string());
        }
        Ok(body.to_vec())
    }
}

#[cfg(feature = "api")]
impl DataSource for HttpSource {
    fn fetch(&self, kind: TableKind) -> Result<Vec<u8>> {
        let url = self.url(kind);
        let max_tries = self.config.max_tries.max(1);
        let mut sleep_millis: u64 = 1000;
        let mut last_error = String::new();

        for attempt in 1..=max_tries {
            info!("Loading {} table from \"{}\"", kind, url);
            match self.fetch_once(url) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("Attempt {}/{}: {} for {} table", attempt, max_tries, e, kind);
                    last_error = e;
                }
            }
            if attempt < max_tries {
                info!(
                    "Sleeping for {} milliseconds before retrying {} table",
                    sleep_millis, kind
                );
                sleep(Duration::from_millis(sleep_millis));
                sleep_millis *= 2;
            }
        }

        Err(CovidError::SourceUnavailable(format!(
            "All {} attempts to fetch {} failed: {}",
            max_tries, url, last_error
        )))
    }
}
