//! SQLite storage implementation
//!
//! This module provides a SQLite-backed frontier store and document sink.

use crate::config::SelectionStrategy;
use crate::storage::schema::{initialize_schema, DIFF_SCRATCH_SQL};
use crate::storage::traits::{
    CrawledDocument, DocumentSink, FrontierStore, StoreCommand, StoreError, StoreReply,
    StoreResult,
};
use crate::url::host_key;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database or create the schema
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns every member of a set, in insertion order
    pub fn members(&self, set: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT member FROM set_members WHERE set_name = ?1 ORDER BY added_at, rowid",
        )?;
        let members = stmt
            .query_map(params![set], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(members)
    }

    /// Counts persisted documents
    pub fn count_documents(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Document counts per content type, largest first
    pub fn count_documents_by_type(&self) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT content_type, COUNT(*) AS n FROM documents
             GROUP BY content_type ORDER BY n DESC, content_type",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Counts distinct hosts with at least one persisted document
    pub fn count_document_hosts(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT host) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Looks up the stored text and content type of a document
    pub fn document_text(&self, url: &str) -> StoreResult<Option<(String, String)>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT content_type, text FROM documents WHERE url = ?1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn apply_command(tx: &Transaction<'_>, command: &StoreCommand) -> StoreResult<StoreReply> {
    let now = Utc::now().timestamp_micros();

    match command {
        StoreCommand::Add { set, members } => {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO set_members (set_name, member, added_at) VALUES (?1, ?2, ?3)",
            )?;
            let mut added = 0u64;
            for member in members {
                added += stmt.execute(params![set, member, now])? as u64;
            }
            Ok(StoreReply::Count(added))
        }

        StoreCommand::DiffStore {
            destination,
            source,
            subtract,
        } => {
            tx.execute_batch(DIFF_SCRATCH_SQL)?;
            tx.execute(
                "INSERT INTO diff_scratch (member, added_at)
                 SELECT member, added_at FROM set_members
                 WHERE set_name = ?1
                   AND member NOT IN (SELECT member FROM set_members WHERE set_name = ?2)",
                params![source, subtract],
            )?;
            tx.execute(
                "DELETE FROM set_members WHERE set_name = ?1",
                params![destination],
            )?;
            let size = tx.execute(
                "INSERT INTO set_members (set_name, member, added_at)
                 SELECT ?1, member, added_at FROM diff_scratch",
                params![destination],
            )?;
            Ok(StoreReply::Count(size as u64))
        }

        StoreCommand::Move { from, to, member } => {
            let removed = tx.execute(
                "DELETE FROM set_members WHERE set_name = ?1 AND member = ?2",
                params![from, member],
            )?;
            if removed == 0 {
                return Ok(StoreReply::Moved(false));
            }
            tx.execute(
                "INSERT OR IGNORE INTO set_members (set_name, member, added_at) VALUES (?1, ?2, ?3)",
                params![to, member, now],
            )?;
            Ok(StoreReply::Moved(true))
        }
    }
}

impl FrontierStore for SqliteStore {
    fn execute(&self, commands: &[StoreCommand]) -> StoreResult<Vec<StoreReply>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            // Any failure drops `tx`, rolling back the whole batch
            replies.push(apply_command(&tx, command)?);
        }

        tx.commit()?;
        Ok(replies)
    }

    fn sample(
        &self,
        set: &str,
        count: usize,
        strategy: SelectionStrategy,
    ) -> StoreResult<Vec<String>> {
        let order = match strategy {
            SelectionStrategy::Random => "RANDOM()",
            SelectionStrategy::Oldest => "added_at ASC, rowid ASC",
            SelectionStrategy::Newest => "added_at DESC, rowid DESC",
        };
        let sql = format!(
            "SELECT member FROM set_members WHERE set_name = ?1 ORDER BY {} LIMIT ?2",
            order
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let members = stmt
            .query_map(params![set, count as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(members)
    }

    fn cardinality(&self, set: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM set_members WHERE set_name = ?1",
            params![set],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM set_members WHERE set_name = ?1 AND member = ?2",
                params![set, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl DocumentSink for SqliteStore {
    fn persist(&self, document: &CrawledDocument<'_>) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents
             (url, host, content_type, raw, text, title, description, site_name, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                document.url.as_str(),
                host_key(document.url),
                document.content_type,
                document.raw,
                document.text,
                document.metadata.title,
                document.metadata.description,
                document.metadata.site_name,
                document.crawled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PageMetadata;
    use url::Url;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_is_set_semantic() {
        let store = SqliteStore::new_in_memory().unwrap();

        assert_eq!(store.add("queue", &strings(&["a", "b"])).unwrap(), 2);
        assert_eq!(store.add("queue", &strings(&["b", "c"])).unwrap(), 1);
        assert_eq!(store.cardinality("queue").unwrap(), 3);
        assert_eq!(store.cardinality("crawled").unwrap(), 0);
    }

    #[test]
    fn test_diff_store_in_place() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.add("queue", &strings(&["a", "b", "c"])).unwrap();
        store.add("crawled", &strings(&["b", "z"])).unwrap();

        assert_eq!(store.diff_store("queue", "queue", "crawled").unwrap(), 2);
        assert_eq!(store.members("queue").unwrap(), strings(&["a", "c"]));
        assert_eq!(store.cardinality("crawled").unwrap(), 2);
    }

    #[test]
    fn test_diff_store_into_other_destination() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.add("left", &strings(&["a", "b"])).unwrap();
        store.add("right", &strings(&["a"])).unwrap();
        store.add("out", &strings(&["stale"])).unwrap();

        store
            .execute(&[StoreCommand::DiffStore {
                destination: "out".to_string(),
                source: "left".to_string(),
                subtract: "right".to_string(),
            }])
            .unwrap();

        assert_eq!(store.members("out").unwrap(), strings(&["b"]));
        assert_eq!(store.cardinality("left").unwrap(), 2);
    }

    #[test]
    fn test_move_member() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.add("queue", &strings(&["a"])).unwrap();

        assert!(store.move_member("queue", "crawled", "a").unwrap());
        assert!(!store.contains("queue", "a").unwrap());
        assert!(store.contains("crawled", "a").unwrap());

        // Absent from the source: nothing happens
        assert!(!store.move_member("queue", "crawled", "missing").unwrap());
        assert!(!store.contains("crawled", "missing").unwrap());
    }

    #[test]
    fn test_sample_limits_and_orders() {
        let store = SqliteStore::new_in_memory().unwrap();
        for member in ["first", "second", "third"] {
            store.add("queue", &strings(&[member])).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let oldest = store.sample("queue", 2, SelectionStrategy::Oldest).unwrap();
        assert_eq!(oldest, strings(&["first", "second"]));

        let newest = store.sample("queue", 1, SelectionStrategy::Newest).unwrap();
        assert_eq!(newest, strings(&["third"]));

        let mut random = store.sample("queue", 10, SelectionStrategy::Random).unwrap();
        random.sort();
        assert_eq!(random, strings(&["first", "second", "third"]));

        assert!(store
            .sample("empty", 5, SelectionStrategy::Random)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_batch_is_atomic() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.add("queue", &strings(&["a"])).unwrap();

        let replies = store
            .execute(&[
                StoreCommand::Move {
                    from: "queue".to_string(),
                    to: "crawled".to_string(),
                    member: "a".to_string(),
                },
                StoreCommand::Add {
                    set: "queue".to_string(),
                    members: strings(&["a", "b"]),
                },
                StoreCommand::DiffStore {
                    destination: "queue".to_string(),
                    source: "queue".to_string(),
                    subtract: "crawled".to_string(),
                },
            ])
            .unwrap();

        assert_eq!(
            replies,
            vec![
                StoreReply::Moved(true),
                StoreReply::Count(2),
                StoreReply::Count(1)
            ]
        );
        assert_eq!(store.members("queue").unwrap(), strings(&["b"]));
        assert_eq!(store.members("crawled").unwrap(), strings(&["a"]));
    }

    #[test]
    fn test_persist_overwrites() {
        let store = SqliteStore::new_in_memory().unwrap();
        let url = Url::parse("https://example.com/page").unwrap();
        let metadata = PageMetadata {
            title: Some("Title".to_string()),
            ..PageMetadata::default()
        };

        for text in ["first", "second"] {
            store
                .persist(&CrawledDocument {
                    url: &url,
                    content_type: "text/html",
                    raw: b"<p>x</p>",
                    text,
                    metadata: &metadata,
                    crawled_at: Utc::now(),
                })
                .unwrap();
        }

        assert_eq!(store.count_documents().unwrap(), 1);
        assert_eq!(
            store.document_text(url.as_str()).unwrap(),
            Some(("text/html".to_string(), "second".to_string()))
        );
    }
}
