//! SQL schema for the artifact database.
//!
//! Applied as a single batch whenever a store is opened.

/// Returns the full SQL schema as a single batch string.
///
/// - `artifacts` - one row per named artifact: its JSON body and the UTC
///   time it was last written (RFC 3339)
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        name TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );
    "#
}
