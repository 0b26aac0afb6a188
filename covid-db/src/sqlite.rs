use crate::schema;
use crate::ArtifactStore;
use chrono::Utc;
use covid_jhu::error::{CovidError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite-backed artifact store.
///
/// Cheaply cloneable; clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Empty in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CovidError::persistence(":memory:", e))?;
        Self::with_connection(conn, ":memory:")
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let label = path.as_ref().display().to_string();
        let conn = Connection::open(path.as_ref()).map_err(|e| CovidError::persistence(&label, e))?;
        Self::with_connection(conn, &label)
    }

    fn with_connection(conn: Connection, label: &str) -> Result<Self> {
        conn.execute_batch(schema::create_schema())
            .map_err(|e| CovidError::persistence(label, e))?;
        log::info!("[COVID Debug] sqlite: Opened artifact database {}", label);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self, name: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CovidError::persistence(name, "connection lock poisoned"))
    }

    /// When `name` was last written, as an RFC 3339 string.
    pub fn saved_at(&self, name: &str) -> Result<Option<String>> {
        let conn = self.lock(name)?;
        conn.query_row(
            "SELECT saved_at FROM artifacts WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CovidError::persistence(name, e))
    }

    /// Names of every stored artifact, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let conn = self.lock("artifacts")?;
        let mut stmt = conn
            .prepare("SELECT name FROM artifacts ORDER BY name")
            .map_err(|e| CovidError::persistence("artifacts", e))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| CovidError::persistence("artifacts", e))?;
        rows.collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| CovidError::persistence("artifacts", e))
    }
}

fn upsert(conn: &Connection, name: &str, body: &str, saved_at: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO artifacts (name, body, saved_at) VALUES (?1, ?2, ?3)",
        params![name, body, saved_at],
    )
}

impl ArtifactStore for SqliteStore {
    fn save(&self, name: &str, body: &str) -> Result<()> {
        let conn = self.lock(name)?;
        upsert(&conn, name, body, &Utc::now().to_rfc3339())
            .map_err(|e| CovidError::persistence(name, e))?;
        log::info!("[COVID Debug] sqlite: Saved {} ({} bytes)", name, body.len());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<String> {
        let conn = self.lock(name)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM artifacts WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CovidError::persistence(name, e))?;
        body.ok_or_else(|| CovidError::persistence(name, "artifact not found"))
    }

    fn contains(&self, name: &str) -> Result<bool> {
        let conn = self.lock(name)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM artifacts WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| CovidError::persistence(name, e))?;
        Ok(count > 0)
    }

    /// All artifacts are written in one transaction: either every body is
    /// replaced or none is.
    fn save_all(&self, artifacts: &[(&str, String)]) -> Result<()> {
        let mut conn = self.lock("artifacts")?;
        let tx = conn
            .transaction()
            .map_err(|e| CovidError::persistence("artifacts", e))?;
        let saved_at = Utc::now().to_rfc3339();
        for (name, body) in artifacts {
            upsert(&tx, name, body, &saved_at).map_err(|e| CovidError::persistence(*name, e))?;
        }
        tx.commit()
            .map_err(|e| CovidError::persistence("artifacts", e))?;
        log::info!("[COVID Debug] sqlite: Saved {} artifacts", artifacts.len());
        Ok(())
    }
}
