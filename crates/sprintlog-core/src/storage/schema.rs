//! SQLite schema for the topic store
//!
//! Categories, topics, topic links, updates, comments and settings.
//! `topics.category` is a plain string, not a foreign key: deleting a
//! category leaves existing topics with the stale name.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Categories seeded on first initialization
pub const DEFAULT_CATEGORIES: [&str; 4] = [
    "Wohnungswirtschaft",
    "Privatpersonen",
    "Leuchtturmprojekte",
    "Cashflowprojekte",
];

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description TEXT,
            category TEXT,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            archived_at INTEGER
        );

        -- Links are a child table so appending is a single insert
        CREATE TABLE IF NOT EXISTS topic_links (
            topic_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            label TEXT NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (topic_id, position),
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS updates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            user TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            user TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Indexes for common query patterns
        CREATE INDEX IF NOT EXISTS idx_topics_created_at ON topics(created_at);
        CREATE INDEX IF NOT EXISTS idx_topics_archived_at ON topics(archived_at);
        CREATE INDEX IF NOT EXISTS idx_topics_category ON topics(category);
        CREATE INDEX IF NOT EXISTS idx_updates_topic_id ON updates(topic_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_comments_topic_id ON comments(topic_id, created_at);
        "#,
    )?;

    for name in DEFAULT_CATEGORIES {
        conn.execute("INSERT OR IGNORE INTO categories (name) VALUES (?)", [name])?;
    }

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables = table_names(&conn);
        for expected in [
            "categories",
            "topics",
            "topic_links",
            "updates",
            "comments",
            "settings",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn));

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_default_categories_seeded_once() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, DEFAULT_CATEGORIES.len() as i64);
    }

    #[test]
    fn test_blank_title_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO topics (title, created_by, created_at) VALUES ('   ', 'Kurt', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_topics_created_at".to_string()));
        assert!(indexes.contains(&"idx_updates_topic_id".to_string()));
    }
}
