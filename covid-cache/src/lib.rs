//! Serving derived tables without rerunning the pipeline on every read.
//!
//! [`StalenessCache`] holds one [`FreshDataSnapshot`](covid_data::snapshot::FreshDataSnapshot)
//! and replaces it whole when it has aged past the configured limit. Where a
//! new snapshot comes from is a [`SnapshotProducer`]: a full pipeline run
//! ([`PipelineProducer`]) or a reload of persisted artifacts
//! ([`StoredSnapshotProducer`]).

pub mod cache;
pub mod clock;
pub mod producer;

pub use cache::{CacheConfig, Freshness, StalenessCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use producer::{
    FnProducer, PipelineProducer, RefreshReport, SnapshotProducer, StoredSnapshotProducer,
};
