//! Command-line and environment configuration shared by the subcommands.

use anyhow::{bail, Context};
use chrono::{NaiveDate, TimeDelta};
use clap::Args;
use covid_cache::CacheConfig;
use covid_data::pipeline::{default_start_date, PipelineOptions};
use covid_db::{ArtifactStore, DirectoryStore, SqliteStore};
use covid_jhu::source::{
    DataSource, FileSource, HttpSource, HttpSourceConfig, CASES_URL, DEATHS_URL,
    DEFAULT_TIMEOUT_SECS,
};
use covid_jhu::state_meta::StateMetaTable;
use covid_utils::dates::parse_date;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the raw tables come from and how they are processed.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// URL of the cumulative confirmed cases table
    #[arg(long, env = "COVID_CASES_URL", default_value = CASES_URL)]
    pub cases_url: String,

    /// URL of the cumulative deaths table (carries population)
    #[arg(long, env = "COVID_DEATHS_URL", default_value = DEATHS_URL)]
    pub deaths_url: String,

    /// Read the cases table from a local file instead of the URL
    #[arg(long, env = "COVID_CASES_FILE", requires = "deaths_file")]
    pub cases_file: Option<PathBuf>,

    /// Read the deaths table from a local file instead of the URL
    #[arg(long, env = "COVID_DEATHS_FILE", requires = "cases_file")]
    pub deaths_file: Option<PathBuf>,

    /// Request timeout for each download, in seconds
    #[arg(long, env = "COVID_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Download attempts before giving up
    #[arg(long, env = "COVID_MAX_TRIES", default_value_t = 3)]
    pub max_tries: u32,

    /// First day of derived series (YYYY-MM-DD)
    #[arg(long, env = "COVID_START_DATE", value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// State metadata CSV (state,abbr,fips,zoom,lat,lon) used to label state rows
    #[arg(long, env = "COVID_STATES_CSV")]
    pub states_csv: Option<PathBuf>,
}

impl SourceArgs {
    pub fn data_source(&self) -> anyhow::Result<Arc<dyn DataSource>> {
        match (&self.cases_file, &self.deaths_file) {
            (Some(cases), Some(deaths)) => {
                info!("Reading raw tables from {} and {}", cases.display(), deaths.display());
                Ok(Arc::new(FileSource::new(cases, deaths)))
            }
            _ => {
                let source = HttpSource::new(HttpSourceConfig {
                    cases_url: self.cases_url.clone(),
                    deaths_url: self.deaths_url.clone(),
                    timeout_secs: self.timeout_secs,
                    max_tries: self.max_tries,
                })?;
                Ok(Arc::new(source))
            }
        }
    }

    pub fn pipeline_options(&self) -> anyhow::Result<PipelineOptions> {
        let state_meta = match &self.states_csv {
            Some(path) => {
                let csv = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Some(StateMetaTable::parse_csv(&csv)?)
            }
            None => None,
        };
        Ok(PipelineOptions {
            start_date: self.start_date.unwrap_or_else(default_start_date),
            state_meta,
            ..PipelineOptions::default()
        })
    }
}

/// Where artifacts are kept.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding one JSON file per artifact
    #[arg(long, env = "COVID_DATA_DIR", default_value = "covid-data")]
    pub data_dir: PathBuf,

    /// Keep artifacts in this SQLite database instead of the data directory
    #[arg(long, env = "COVID_DATABASE")]
    pub database: Option<PathBuf>,
}

impl StoreArgs {
    pub fn artifact_store(&self) -> anyhow::Result<Arc<dyn ArtifactStore>> {
        match &self.database {
            Some(path) => Ok(Arc::new(SqliteStore::open(path)?)),
            None => Ok(Arc::new(DirectoryStore::open(&self.data_dir)?)),
        }
    }
}

/// Cache timing.
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Hours before a cached snapshot is considered stale
    #[arg(long, env = "COVID_STALE_HOURS", default_value_t = 1.0)]
    pub stale_hours: f64,

    /// Minutes to wait after a failed refresh before trying again
    #[arg(long, env = "COVID_RETRY_MINUTES", default_value_t = 0)]
    pub retry_minutes: i64,
}

impl CacheArgs {
    pub fn cache_config(&self) -> anyhow::Result<CacheConfig> {
        if !self.stale_hours.is_finite() || self.stale_hours < 0.0 {
            bail!("--stale-hours must be a non-negative number, got {}", self.stale_hours);
        }
        if self.retry_minutes < 0 {
            bail!("--retry-minutes must not be negative, got {}", self.retry_minutes);
        }
        let seconds = (self.stale_hours * 3600.0).round();
        let max_age = Some(seconds)
            .filter(|s| *s < i64::MAX as f64)
            .and_then(|s| TimeDelta::try_seconds(s as i64))
            .with_context(|| format!("--stale-hours {} is too large", self.stale_hours))?;
        let retry_after = TimeDelta::try_minutes(self.retry_minutes)
            .with_context(|| format!("--retry-minutes {} is too large", self.retry_minutes))?;
        Ok(CacheConfig { max_age, retry_after })
    }
}
