//! Storage for the derived case tables.
//!
//! Each table is persisted as a named artifact whose body is JSON. Two
//! backends implement [`ArtifactStore`]:
//!
//! - [`SqliteStore`] keeps artifacts in an `artifacts` table (see
//!   [`schema::create_schema`]), either in memory or in a database file
//! - [`DirectoryStore`] keeps one `<name>.json` file per artifact
//!
//! [`artifacts`] maps a [`covid_data::snapshot::FreshDataSnapshot`] onto the
//! four artifact names and back.
//!
//! # Usage
//!
//! ```rust
//! use covid_db::{ArtifactStore, SqliteStore};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.save("county_map", "[]").unwrap();
//! assert_eq!(store.load("county_map").unwrap(), "[]");
//! ```

pub mod artifacts;
pub mod schema;
mod directory;
mod sqlite;

pub use directory::DirectoryStore;
pub use sqlite::SqliteStore;

use covid_jhu::error::Result;

/// A keyed store of artifact bodies.
///
/// Saving a name that already exists replaces its body.
pub trait ArtifactStore: Send + Sync {
    fn save(&self, name: &str, body: &str) -> Result<()>;

    /// Body of `name`; `PersistenceFailure` when it was never saved.
    fn load(&self, name: &str) -> Result<String>;

    fn contains(&self, name: &str) -> Result<bool>;

    /// Save several artifacts. Backends that can write them as one unit
    /// override this.
    fn save_all(&self, artifacts: &[(&str, String)]) -> Result<()> {
        for (name, body) in artifacts {
            self.save(name, body)?;
        }
        Ok(())
    }
}
