//! Database schema definitions
//!
//! Named sets are rows of `set_members`; a member belongs to a set when a
//! `(set_name, member)` row exists. `added_at` orders members for the
//! oldest/newest selection strategies.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS set_members (
    set_name TEXT NOT NULL,
    member TEXT NOT NULL,
    added_at INTEGER NOT NULL,
    PRIMARY KEY (set_name, member)
);

CREATE INDEX IF NOT EXISTS idx_set_members_added ON set_members(set_name, added_at);

CREATE TABLE IF NOT EXISTS documents (
    url TEXT PRIMARY KEY,
    host TEXT NOT NULL,
    content_type TEXT NOT NULL,
    raw BLOB NOT NULL,
    text TEXT NOT NULL,
    title TEXT,
    description TEXT,
    site_name TEXT,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_host ON documents(host);
"#;

/// Scratch table used while computing a set difference
pub const DIFF_SCRATCH_SQL: &str = r#"
CREATE TEMP TABLE IF NOT EXISTS diff_scratch (
    member TEXT PRIMARY KEY,
    added_at INTEGER NOT NULL
);
DELETE FROM diff_scratch;
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
