//! Topic index schema
//!
//! This module contains the SQL schema for the SQLite topic index.

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
-- Forum sections
CREATE TABLE IF NOT EXISTS sub_forums (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    listing_url TEXT
);

-- Topics known to each section
CREATE TABLE IF NOT EXISTS topics (
    id INTEGER NOT NULL,
    sub_forum_id INTEGER NOT NULL REFERENCES sub_forums(id),
    title TEXT NOT NULL,
    seed_url TEXT NOT NULL,
    discovered_at TEXT,
    PRIMARY KEY (sub_forum_id, id)
);

CREATE INDEX IF NOT EXISTS idx_topics_sub_forum ON topics(sub_forum_id);
"#;

/// Initializes the index schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
