use chrono::{DateTime, Utc};
use covid_data::pipeline::{run_pipeline, PipelineOptions};
use covid_data::snapshot::FreshDataSnapshot;
use covid_db::artifacts::{load_snapshot, save_snapshot};
use covid_db::ArtifactStore;
use covid_jhu::error::Result;
use covid_jhu::source::DataSource;
use log::info;
use std::fmt;
use std::sync::Arc;

/// Builds a new snapshot on demand.
pub trait SnapshotProducer: Send + Sync {
    fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot>;
}

/// Adapts a plain function or closure into a producer.
pub struct FnProducer<F>(pub F);

impl<F> SnapshotProducer for FnProducer<F>
where
    F: Fn(DateTime<Utc>) -> Result<FreshDataSnapshot> + Send + Sync,
{
    fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
        (self.0)(now)
    }
}

impl<P: SnapshotProducer + ?Sized> SnapshotProducer for Arc<P> {
    fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
        (**self).produce(now)
    }
}

/// Completion signal of a recompute-and-persist cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub created_at: DateTime<Utc>,
    pub counties: usize,
    /// States plus the national entry
    pub states: usize,
}

impl RefreshReport {
    pub fn for_snapshot(snapshot: &FreshDataSnapshot) -> RefreshReport {
        RefreshReport {
            created_at: snapshot.created_at,
            counties: snapshot.county_map.len(),
            states: snapshot.state_map.len(),
        }
    }
}

impl fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Refreshed {} counties and {} states at {}",
            self.counties,
            self.states,
            self.created_at.to_rfc3339()
        )
    }
}

/// Full load → transform → aggregate run whose tables are persisted before
/// the snapshot is handed out.
///
/// Both the cache's read path and an external trigger go through
/// [`PipelineProducer::recompute_and_persist`], so either produces the same
/// artifacts.
#[derive(Clone)]
pub struct PipelineProducer {
    source: Arc<dyn DataSource>,
    store: Arc<dyn ArtifactStore>,
    options: PipelineOptions,
}

impl PipelineProducer {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn ArtifactStore>,
        options: PipelineOptions,
    ) -> PipelineProducer {
        PipelineProducer {
            source,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Run the pipeline and persist all four artifacts.
    pub fn recompute_and_persist(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
        let snapshot = run_pipeline(self.source.as_ref(), &self.options, now)?;
        save_snapshot(self.store.as_ref(), &snapshot)?;
        info!(
            "[COVID Debug] producer: {}",
            RefreshReport::for_snapshot(&snapshot)
        );
        Ok(snapshot)
    }
}

impl SnapshotProducer for PipelineProducer {
    fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
        self.recompute_and_persist(now)
    }
}

/// Reloads the artifacts last written by a recompute-and-persist cycle.
#[derive(Clone)]
pub struct StoredSnapshotProducer {
    store: Arc<dyn ArtifactStore>,
}

impl StoredSnapshotProducer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> StoredSnapshotProducer {
        StoredSnapshotProducer { store }
    }
}

impl SnapshotProducer for StoredSnapshotProducer {
    fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
        let snapshot = load_snapshot(self.store.as_ref(), now)?;
        info!(
            "[COVID Debug] producer: Reloaded {} county rows from storage",
            snapshot.county_map.len()
        );
        Ok(snapshot)
    }
}
