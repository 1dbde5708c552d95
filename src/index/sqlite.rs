//! SQLite topic index implementation
//!
//! This module provides a SQLite-based implementation of the IndexSource trait.

use crate::index::schema::initialize_schema;
use crate::index::{IndexError, IndexResult, IndexSource, SubForum, SubForumId, Topic};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed topic index
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Opens an existing index
    ///
    /// A missing file is an error rather than an empty index: the index is
    /// built ahead of time and running against nothing would silently
    /// archive nothing.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if !path.is_file() {
            return Err(IndexError::Missing(path.to_path_buf()));
        }

        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Creates (or opens) an index file and initializes its schema
    pub fn create(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Creates an in-memory index (for testing)
    pub fn new_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> IndexResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Inserts or replaces a sub-forum row
    pub fn insert_sub_forum(
        &mut self,
        id: SubForumId,
        name: &str,
        listing_url: Option<&str>,
    ) -> IndexResult<()> {
        self.conn.execute(
            "INSERT INTO sub_forums (id, name, listing_url) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, listing_url = excluded.listing_url",
            params![id as i64, name, listing_url],
        )?;
        Ok(())
    }

    /// Counts the topics recorded for a sub-forum
    pub fn count_topics(&self, sub_forum_id: SubForumId) -> IndexResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM topics WHERE sub_forum_id = ?1",
            params![sub_forum_id as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn sub_forum_exists(&self, id: SubForumId) -> IndexResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM sub_forums WHERE id = ?1",
                params![id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl IndexSource for SqliteIndex {
    fn load_sub_forums(&self) -> IndexResult<Vec<SubForum>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, listing_url FROM sub_forums ORDER BY id")?;

        let sub_forums = stmt
            .query_map([], |row| {
                Ok(SubForum {
                    id: row.get::<_, i64>(0)? as u64,
                    name: row.get(1)?,
                    listing_url: row.get(2)?,
                    topics: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sub_forums)
    }

    fn load_topics(&self, sub_forum_id: SubForumId) -> IndexResult<Vec<Topic>> {
        if !self.sub_forum_exists(sub_forum_id)? {
            return Err(IndexError::UnknownSubForum(sub_forum_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, sub_forum_id, title, seed_url FROM topics
             WHERE sub_forum_id = ?1 ORDER BY id",
        )?;

        let topics = stmt
            .query_map(params![sub_forum_id as i64], |row| {
                Ok(Topic {
                    id: row.get::<_, i64>(0)? as u64,
                    sub_forum_id: row.get::<_, i64>(1)? as u64,
                    title: row.get(2)?,
                    seed_url: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(topics)
    }

    fn add_topics(&mut self, topics: &[Topic]) -> IndexResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO topics (id, sub_forum_id, title, seed_url, discovered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for topic in topics {
                inserted += stmt.execute(params![
                    topic.id as i64,
                    topic.sub_forum_id as i64,
                    topic.title,
                    topic.seed_url,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}
