//! Data processing for cumulative case tables.
//!
//! This crate turns cleaned per-location cumulative counts into the derived
//! tables the dashboard reads: daily new cases, 7-day averages, per-100k
//! rates, state and national rollups, and map summary rows.
//!
//! Every stage is a pure function from one record type to the next;
//! [`pipeline::build_snapshot`] chains them into a [`snapshot::FreshDataSnapshot`].

pub mod aggregation;
pub mod detail;
pub mod incremental;
pub mod pipeline;
pub mod snapshot;
pub mod summary;

use covid_jhu::series::DailySeries;
use std::collections::BTreeMap;

/// Derived series keyed by location identifier, in identifier order.
pub type SeriesSet = BTreeMap<String, DailySeries>;
