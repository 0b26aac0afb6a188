//! The recompute-and-persist cycle as a command.

use crate::config::{SourceArgs, StoreArgs};
use chrono::Utc;
use clap::Parser;
use covid_cache::{PipelineProducer, RefreshReport};
use log::info;

/// Configuration of a refresh, read from the environment when invoked
/// without arguments.
#[derive(Parser, Debug)]
#[command(name = "covid-refresh")]
struct RefreshConfig {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    store: StoreArgs,
}

/// Recompute every derived table and persist it.
pub fn refresh_with(source: &SourceArgs, store: &StoreArgs) -> anyhow::Result<RefreshReport> {
    let producer = PipelineProducer::new(
        source.data_source()?,
        store.artifact_store()?,
        source.pipeline_options()?,
    );
    let snapshot = producer.recompute_and_persist(Utc::now())?;
    Ok(RefreshReport::for_snapshot(&snapshot))
}

/// Zero-argument entry point for schedulers: configuration comes from the
/// `COVID_*` environment variables, falling back to defaults.
pub fn recompute_and_persist() -> anyhow::Result<RefreshReport> {
    let config = RefreshConfig::try_parse_from(["covid-refresh"])?;
    refresh_with(&config.source, &config.store)
}

pub async fn run_refresh(source: SourceArgs, store: StoreArgs) -> anyhow::Result<()> {
    let report = tokio::task::spawn_blocking(move || refresh_with(&source, &store)).await??;
    info!("Refresh complete: {}", report);
    println!("{}", report);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use covid_db::artifacts::{has_snapshot, ALL_ARTIFACTS};
    use covid_db::DirectoryStore;
    use std::path::Path;

    pub(crate) const CASES_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,2/29/20,3/1/20,3/2/20,3/3/20,3/4/20,3/5/20,3/6/20,3/7/20,3/8/20,3/9/20
84008069,US,USA,840,8069.0,Larimer,Colorado,US,40.6,-105.4,\"Larimer, Colorado, US\",0,10,20,30,40,50,60,70,80,90
84008001,US,USA,840,8001.0,Adams,Colorado,US,39.8,-104.3,\"Adams, Colorado, US\",0,0,0,0,0,0,0,0,0,0
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",0,1,2,3,4,5,6,7,8,9
";

    pub(crate) const DEATHS_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,2/29/20,3/1/20,3/2/20,3/3/20,3/4/20,3/5/20,3/6/20,3/7/20,3/8/20,3/9/20
84008069,US,USA,840,8069.0,Larimer,Colorado,US,40.6,-105.4,\"Larimer, Colorado, US\",100000,0,0,0,0,0,0,0,0,0,0
84008001,US,USA,840,8001.0,Adams,Colorado,US,39.8,-104.3,\"Adams, Colorado, US\",500000,0,0,0,0,0,0,0,0,0,0
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",5000,0,0,0,0,0,0,0,0,0,0
";

    /// Source and store arguments reading fixture files under `dir`.
    pub(crate) fn fixture_args(dir: &Path) -> (SourceArgs, StoreArgs) {
        let cases = dir.join("cases.csv");
        let deaths = dir.join("deaths.csv");
        std::fs::write(&cases, CASES_CSV).unwrap();
        std::fs::write(&deaths, DEATHS_CSV).unwrap();
        let source = SourceArgs {
            cases_url: String::new(),
            deaths_url: String::new(),
            cases_file: Some(cases),
            deaths_file: Some(deaths),
            timeout_secs: 1,
            max_tries: 1,
            start_date: None,
            states_csv: None,
        };
        let store = StoreArgs {
            data_dir: dir.join("artifacts"),
            database: None,
        };
        (source, store)
    }

    #[test]
    fn refresh_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (source, store) = fixture_args(dir.path());
        let report = refresh_with(&source, &store).unwrap();
        assert_eq!(report.counties, 3);
        assert_eq!(report.states, 3);

        let artifacts = DirectoryStore::open(dir.path().join("artifacts")).unwrap();
        assert!(has_snapshot(&artifacts).unwrap());
        for name in ALL_ARTIFACTS {
            assert!(dir.path().join("artifacts").join(format!("{}.json", name)).is_file());
        }
    }

    #[test]
    fn refresh_twice_writes_identical_tables() {
        let dir = tempfile::tempdir().unwrap();
        let (source, store) = fixture_args(dir.path());
        refresh_with(&source, &store).unwrap();
        let first = std::fs::read_to_string(dir.path().join("artifacts/county_map.json")).unwrap();
        refresh_with(&source, &store).unwrap();
        let second = std::fs::read_to_string(dir.path().join("artifacts/county_map.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_source_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut source, store) = fixture_args(dir.path());
        source.cases_file = Some(dir.path().join("nope.csv"));
        let err = refresh_with(&source, &store).unwrap_err();
        assert!(err.to_string().contains("Source unavailable"));
    }
}
