//! Command implementations for the COVID-19 case pipeline CLI.
//!
//! Provides subcommands to recompute and persist the derived tables, to
//! inspect persisted tables, and to keep serving a cached snapshot that
//! refreshes itself when stale.

use clap::Subcommand;

pub mod config;
pub mod refresh;
pub mod report;
pub mod watch;

pub use refresh::recompute_and_persist;

use config::{CacheArgs, SourceArgs, StoreArgs};

#[derive(Subcommand)]
pub enum Command {
    /// Download the raw tables, recompute every derived table and persist it
    Refresh {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the locations with the highest recent case numbers
    Summary {
        #[command(flatten)]
        store: StoreArgs,

        /// Rank states instead of counties
        #[arg(long)]
        states: bool,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Rank by cases per 100k instead of average daily cases
        #[arg(long)]
        by_rate: bool,
    },

    /// Print the trend and recent daily figures for one county, state or USA
    Location {
        #[command(flatten)]
        store: StoreArgs,

        /// 5-digit county code, state name, or USA
        id: String,

        /// Number of most recent days to print
        #[arg(short = 'd', long, default_value_t = 14)]
        days: usize,
    },

    /// Keep a cached snapshot and print national figures on an interval
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        cache: CacheArgs,

        /// Seconds between reads of the cache
        #[arg(long, default_value_t = 60)]
        poll_secs: u64,

        /// Stop after this many reads
        #[arg(long)]
        iterations: Option<usize>,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Refresh { source, store } => refresh::run_refresh(source, store).await,
        Command::Summary {
            store,
            states,
            limit,
            by_rate,
        } => report::run_summary(store, states, limit, by_rate).await,
        Command::Location { store, id, days } => report::run_location(store, id, days).await,
        Command::Watch {
            source,
            store,
            cache,
            poll_secs,
            iterations,
        } => watch::run_watch(source, store, cache, poll_secs, iterations).await,
    }
}
