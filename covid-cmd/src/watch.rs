//! Long-running view over a [`StalenessCache`].

use crate::config::{CacheArgs, SourceArgs, StoreArgs};
use covid_cache::{PipelineProducer, StalenessCache, SystemClock};
use covid_data::snapshot::FreshDataSnapshot;
use covid_data::summary::custom_number_str;
use covid_jhu::location::USA_ID;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// One line of national figures from a snapshot.
pub fn national_line(snapshot: &FreshDataSnapshot) -> String {
    let latest = snapshot
        .usa_new_cases()
        .and_then(|series| series.last())
        .map(|(date, cases)| format!("{} new cases on {}", custom_number_str(cases), date))
        .unwrap_or_else(|| "no new case data".to_string());
    let average = snapshot
        .state_map
        .iter()
        .find(|row| row.location_id == USA_ID)
        .and_then(|row| row.week_average)
        .map(custom_number_str)
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{}: {}, 7-day average {} (snapshot {})",
        USA_ID,
        latest,
        average,
        snapshot.created_at.to_rfc3339()
    )
}

pub async fn run_watch(
    source: SourceArgs,
    store: StoreArgs,
    cache: CacheArgs,
    poll_secs: u64,
    iterations: Option<usize>,
) -> anyhow::Result<()> {
    let config = cache.cache_config()?;
    let cache = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let producer = PipelineProducer::new(
            source.data_source()?,
            store.artifact_store()?,
            source.pipeline_options()?,
        );
        Ok(StalenessCache::new(producer, SystemClock, config)?)
    })
    .await??;
    let cache = Arc::new(cache);
    info!(
        "Watching with max age {} minutes, polling every {} seconds",
        config.max_age.num_minutes(),
        poll_secs
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
    let mut reads = 0usize;
    loop {
        ticker.tick().await;
        let reader = Arc::clone(&cache);
        let snapshot = tokio::task::spawn_blocking(move || reader.get()).await?;
        println!("{}", national_line(&snapshot));
        reads += 1;
        if iterations.is_some_and(|limit| reads >= limit) {
            return Ok(());
        }
    }
}
