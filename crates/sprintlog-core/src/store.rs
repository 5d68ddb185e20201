//! Unified storage interface
//!
//! The `Store` owns the SQLite connection and implements the query and
//! mutation layers. Every mutation is a single statement or a single
//! transaction, so a failed validation never leaves partial rows behind.
//!
//! Operations on a topic id that does not exist are silent: reads return
//! `None` or an empty list, mutations change nothing and return `false`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let id = store.create_topic(&NewTopic::new("Solar Rollout", User::Kurt))?;
//! store.add_update(id, User::Annika, "kickoff done")?;
//!
//! let active = store.list_topics(&TopicFilter::active())?;
//! ```

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::export::{document, spreadsheet};
use crate::filter::TopicFilter;
use crate::models::{non_blank, Entry, EntryKind, NewTopic, Topic, TopicBundle, TopicLink, User, ValidTopic};
use crate::selection::Selection;
use crate::storage::schema::{init_schema, needs_init};
use crate::storage::{StoreError, StoreResult};

const TOPIC_COLUMNS: &str = "id, title, description, category, created_by, created_at, archived_at";

/// How far ahead of the clock an existing `created_at` may pull a new topic
///
/// Covers small clock steps backwards. Anything further ahead (a skewed
/// import, say) is ignored.
const CLOCK_SKEW_MILLIS: i64 = 5_000;

/// Record counts for status output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active_topics: i64,
    pub archived_topics: i64,
    pub links: i64,
    pub updates: i64,
    pub comments: i64,
    pub categories: i64,
}

/// What a spreadsheet import added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub topics: usize,
    pub links: usize,
    pub updates: usize,
    pub comments: usize,
    /// Topics already present, left untouched with their entries
    pub skipped_topics: usize,
}

/// Storage interface for sprintlog
pub struct Store {
    conn: Connection,
    config: Config,
    tz: Tz,
}

impl Store {
    /// Open the store at the configured location
    pub fn open() -> anyhow::Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    ///
    /// Creates the database and seeds the default categories on first run.
    pub fn open_with_config(config: Config) -> anyhow::Result<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        Self::from_connection(conn, config)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory(config: Config) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    fn from_connection(conn: Connection, config: Config) -> anyhow::Result<Self> {
        let tz = config.tz()?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if needs_init(&conn) {
            init_schema(&conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self { conn, config, tz })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Time zone used for display and date filters
    pub fn tz(&self) -> Tz {
        self.tz
    }

    // ==================== Topic Queries ====================

    /// Topics matching a filter, newest first
    pub fn list_topics(&self, filter: &TopicFilter) -> StoreResult<Vec<Topic>> {
        let (predicate, values) = filter.to_sql(self.tz)?;
        let sql = format!(
            "SELECT {} FROM topics WHERE {} ORDER BY created_at DESC, id DESC",
            TOPIC_COLUMNS, predicate
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), read_topic_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut topics = rows
            .into_iter()
            .map(|row| self.hydrate_topic(row))
            .collect::<StoreResult<Vec<_>>>()?;
        filter.retain(&mut topics);

        debug!(count = topics.len(), "Listed topics");
        Ok(topics)
    }

    /// Get a topic by id
    pub fn topic(&self, id: i64) -> StoreResult<Option<Topic>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS),
                params![id],
                read_topic_row,
            )
            .optional()?;

        row.map(|r| self.hydrate_topic(r)).transpose()
    }

    /// Get a topic by id, treating absence as an error
    pub fn require_topic(&self, id: i64) -> StoreResult<Topic> {
        self.topic(id)?.ok_or(StoreError::TopicNotFound(id))
    }

    /// Every topic, active and archived, newest first
    pub fn all_topics(&self) -> StoreResult<Vec<Topic>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM topics ORDER BY created_at DESC, id DESC",
            TOPIC_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], read_topic_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| self.hydrate_topic(row)).collect()
    }

    /// Updates on a topic, newest first
    pub fn updates(&self, topic_id: i64) -> StoreResult<Vec<Entry>> {
        self.entries(EntryKind::Update, topic_id)
    }

    /// Comments on a topic, newest first
    pub fn comments(&self, topic_id: i64) -> StoreResult<Vec<Entry>> {
        self.entries(EntryKind::Comment, topic_id)
    }

    /// Entries of one log on a topic, newest first
    pub fn entries(&self, kind: EntryKind, topic_id: i64) -> StoreResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, topic_id, user, content, created_at FROM {} \
             WHERE topic_id = ? ORDER BY created_at DESC, id DESC",
            kind.table()
        ))?;

        let rows = stmt
            .query_map(params![topic_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, topic_id, user, content, created_at)| {
                Ok(Entry {
                    id,
                    topic_id,
                    user: user.parse()?,
                    content,
                    created_at: from_millis(created_at)?,
                })
            })
            .collect()
    }

    /// A topic with its updates and comments
    pub fn bundle(&self, id: i64) -> StoreResult<Option<TopicBundle>> {
        match self.topic(id)? {
            Some(topic) => Ok(Some(self.bundle_topic(topic)?)),
            None => Ok(None),
        }
    }

    /// Bundles for an export selection
    ///
    /// The empty selection yields every topic newest first; otherwise the
    /// selected ids in ascending order, skipping ids that no longer exist.
    pub fn bundles(&self, selection: &Selection) -> StoreResult<Vec<TopicBundle>> {
        if selection.is_all() {
            return self
                .all_topics()?
                .into_iter()
                .map(|t| self.bundle_topic(t))
                .collect();
        }

        let mut bundles = Vec::with_capacity(selection.len());
        for id in selection.ids() {
            match self.bundle(id)? {
                Some(bundle) => bundles.push(bundle),
                None => warn!(id, "Selected topic no longer exists, skipping"),
            }
        }
        Ok(bundles)
    }

    fn bundle_topic(&self, topic: Topic) -> StoreResult<TopicBundle> {
        let updates = self.updates(topic.id)?;
        let comments = self.comments(topic.id)?;
        Ok(TopicBundle {
            topic,
            updates,
            comments,
        })
    }

    // ==================== Topic Mutations ====================

    /// Create a topic and return its id
    ///
    /// Fails with a validation error on a blank title or a link URL that is
    /// not `http(s)://`; in that case nothing is written.
    pub fn create_topic(&mut self, new: &NewTopic) -> StoreResult<i64> {
        let valid = new.validate()?;

        let tx = self.conn.transaction()?;
        // Never earlier than a recent topic, so ids and times agree
        let now = Utc::now().timestamp_millis();
        let latest: Option<i64> = tx.query_row(
            "SELECT MAX(created_at) FROM topics WHERE created_at <= ?",
            params![now + CLOCK_SKEW_MILLIS],
            |row| row.get(0),
        )?;
        let created_at = now.max(latest.unwrap_or(i64::MIN));

        let id = insert_topic(&tx, &valid, created_at, None)?;
        tx.commit()?;

        info!(id, title = %valid.title, author = %valid.author, "Created topic");
        Ok(id)
    }

    /// Reassign a topic's category
    ///
    /// The category does not have to exist. Returns whether a topic was found.
    pub fn update_category(&mut self, id: i64, category: Option<&str>) -> StoreResult<bool> {
        let category = non_blank(category);
        let changed = self.conn.execute(
            "UPDATE topics SET category = ? WHERE id = ?",
            params![category, id],
        )?;
        log_mutation("update_category", id, changed);
        Ok(changed > 0)
    }

    /// Append a link to a topic
    ///
    /// A single `INSERT … SELECT`, so concurrent appends cannot drop each
    /// other. Returns whether the topic exists.
    pub fn append_link(&mut self, id: i64, url: &str, label: &str) -> StoreResult<bool> {
        let link = TopicLink::new(url, label)?;
        let changed = self.conn.execute(
            r#"
            INSERT INTO topic_links (topic_id, position, label, url)
            SELECT t.id,
                   (SELECT COALESCE(MAX(position) + 1, 0) FROM topic_links WHERE topic_id = t.id),
                   ?2, ?3
            FROM topics t WHERE t.id = ?1
            "#,
            params![id, link.label, link.url],
        )?;
        log_mutation("append_link", id, changed);
        Ok(changed > 0)
    }

    /// Archive a topic
    ///
    /// Archiving an archived topic keeps the original timestamp.
    pub fn archive_topic(&mut self, id: i64) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE topics SET archived_at = ? WHERE id = ? AND archived_at IS NULL",
            params![Utc::now().timestamp_millis(), id],
        )?;
        log_mutation("archive_topic", id, changed);
        Ok(changed > 0)
    }

    /// Restore an archived topic to the active set
    pub fn restore_topic(&mut self, id: i64) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE topics SET archived_at = NULL WHERE id = ? AND archived_at IS NOT NULL",
            params![id],
        )?;
        log_mutation("restore_topic", id, changed);
        Ok(changed > 0)
    }

    /// Delete a topic with its links, updates and comments
    pub fn delete_topic(&mut self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM topics WHERE id = ?", params![id])?;
        log_mutation("delete_topic", id, changed);
        Ok(changed > 0)
    }

    // ==================== Update / Comment Mutations ====================

    /// Append an update; returns its id, or `None` if the topic is missing
    pub fn add_update(&mut self, topic_id: i64, user: User, content: &str) -> StoreResult<Option<i64>> {
        self.add_entry(EntryKind::Update, topic_id, user, content)
    }

    /// Append a comment; returns its id, or `None` if the topic is missing
    pub fn add_comment(&mut self, topic_id: i64, user: User, content: &str) -> StoreResult<Option<i64>> {
        self.add_entry(EntryKind::Comment, topic_id, user, content)
    }

    /// Append an entry to one of a topic's logs
    pub fn add_entry(
        &mut self,
        kind: EntryKind,
        topic_id: i64,
        user: User,
        content: &str,
    ) -> StoreResult<Option<i64>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::validation(format!("{} content is required", kind)));
        }

        let changed = self.conn.execute(
            &format!(
                "INSERT INTO {} (topic_id, user, content, created_at) \
                 SELECT id, ?2, ?3, ?4 FROM topics WHERE id = ?1",
                kind.table()
            ),
            params![topic_id, user.as_str(), content, Utc::now().timestamp_millis()],
        )?;

        if changed == 0 {
            debug!(topic_id, %kind, "Topic not found, entry not added");
            return Ok(None);
        }

        let id = self.conn.last_insert_rowid();
        info!(topic_id, id, %kind, %user, "Added entry");
        Ok(Some(id))
    }

    // ==================== Categories ====================

    /// Selectable categories, sorted by name
    pub fn categories(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM categories ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Add a category; returns `false` if it already existed
    pub fn add_category(&mut self, name: &str) -> StoreResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("category name is required"));
        }
        let changed = self
            .conn
            .execute("INSERT OR IGNORE INTO categories (name) VALUES (?)", params![name])?;
        if changed > 0 {
            info!(name, "Added category");
        }
        Ok(changed > 0)
    }

    /// Remove a category from the selectable list
    ///
    /// Topics that use it keep the name until they are reassigned.
    pub fn delete_category(&mut self, name: &str) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE name = ?", params![name.trim()])?;
        if changed > 0 {
            info!(name, "Deleted category");
        }
        Ok(changed > 0)
    }

    // ==================== Settings ====================

    pub fn setting(&self, key: &str) -> StoreResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM settings WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// All settings sorted by key
    pub fn settings(&self) -> StoreResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Ok(pairs)
    }

    pub fn set_setting(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(StoreError::validation("setting key is required"));
        }
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value.trim()],
        )?;
        info!(key, "Saved setting");
        Ok(())
    }

    pub fn delete_setting(&mut self, key: &str) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?", params![key.trim()])?;
        Ok(changed > 0)
    }

    // ==================== Export / Import ====================

    /// Lay out the document export for a selection
    pub fn document_layout(
        &self,
        selection: &Selection,
        exported_at: DateTime<Utc>,
    ) -> StoreResult<document::DocumentLayout> {
        let bundles = self.bundles(selection)?;
        let options = document::LayoutOptions {
            app_title: self.config.app_title.clone(),
            tz: self.tz,
            exported_at,
        };
        Ok(document::build_layout(&bundles, &options))
    }

    /// Render the selection as a PDF document
    pub fn export_pdf(&self, selection: &Selection) -> StoreResult<Vec<u8>> {
        let layout = self.document_layout(selection, Utc::now())?;
        let bytes = document::render_pdf(&layout)?;
        info!(topics = layout.topic_count, pages = layout.pages.len(), "Exported PDF");
        Ok(bytes)
    }

    /// Assemble the spreadsheet sheets for a selection
    pub fn spreadsheet(
        &self,
        selection: &Selection,
        exported_at: DateTime<Utc>,
    ) -> StoreResult<spreadsheet::Spreadsheet> {
        let bundles = self.bundles(selection)?;
        Ok(spreadsheet::build_sheets(&bundles, self.tz, exported_at))
    }

    /// Render the selection as an `.xlsx` workbook
    pub fn export_xlsx(&self, selection: &Selection) -> StoreResult<Vec<u8>> {
        let sheets = self.spreadsheet(selection, Utc::now())?;
        let bytes = spreadsheet::write_xlsx(&sheets)?;
        info!(bytes = bytes.len(), "Exported spreadsheet");
        Ok(bytes)
    }

    /// Import topics, links, updates and comments from an `.xlsx` export
    ///
    /// Topics receive new ids. A topic that already exists (same title,
    /// author and creation second) is skipped along with its updates and
    /// comments, so importing the same file twice changes nothing. The whole
    /// import is one transaction: any invalid row rejects the file and
    /// nothing is written.
    pub fn import_spreadsheet(&mut self, bytes: &[u8]) -> StoreResult<ImportSummary> {
        let sheets = spreadsheet::read_xlsx(bytes)?;
        self.import_sheets(&sheets)
    }

    /// Import from an already decoded spreadsheet
    pub fn import_sheets(&mut self, sheets: &spreadsheet::Spreadsheet) -> StoreResult<ImportSummary> {
        let batch = spreadsheet::parse_import(sheets)?;
        let mut summary = ImportSummary::default();

        let tx = self.conn.transaction()?;
        let mut id_map = std::collections::HashMap::new();
        let mut skipped = std::collections::HashSet::new();

        for imported in &batch.topics {
            if let Some(existing) = find_existing_topic(&tx, imported)? {
                debug!(source_id = imported.source_id, existing, "Topic already present, skipping");
                skipped.insert(imported.source_id);
                summary.skipped_topics += 1;
                continue;
            }
            let id = insert_topic(
                &tx,
                &imported.topic,
                imported.created_at.timestamp_millis(),
                imported.archived_at.map(|t| t.timestamp_millis()),
            )?;
            id_map.insert(imported.source_id, id);
            summary.topics += 1;
            summary.links += imported.topic.links.len();
        }

        for entry in &batch.entries {
            if skipped.contains(&entry.source_topic_id) {
                continue;
            }
            let topic_id = *id_map.get(&entry.source_topic_id).ok_or_else(|| {
                StoreError::validation(format!("unknown topic_id {}", entry.source_topic_id))
            })?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (topic_id, user, content, created_at) VALUES (?, ?, ?, ?)",
                    entry.kind.table()
                ),
                params![
                    topic_id,
                    entry.user.as_str(),
                    entry.content,
                    entry.created_at.timestamp_millis()
                ],
            )?;
            match entry.kind {
                EntryKind::Update => summary.updates += 1,
                EntryKind::Comment => summary.comments += 1,
            }
        }

        tx.commit()?;
        info!(?summary, "Imported spreadsheet");
        Ok(summary)
    }

    /// Write a full spreadsheet snapshot to `path`
    pub fn write_snapshot(&self, path: &Path) -> StoreResult<usize> {
        let bytes = self.export_xlsx(&Selection::all())?;
        crate::storage::atomic_write(path, &bytes)?;
        info!(path = %path.display(), "Wrote snapshot");
        Ok(bytes.len())
    }

    // ==================== Stats ====================

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let count = |sql: &str| -> StoreResult<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };
        Ok(StoreStats {
            active_topics: count("SELECT COUNT(*) FROM topics WHERE archived_at IS NULL")?,
            archived_topics: count("SELECT COUNT(*) FROM topics WHERE archived_at IS NOT NULL")?,
            links: count("SELECT COUNT(*) FROM topic_links")?,
            updates: count("SELECT COUNT(*) FROM updates")?,
            comments: count("SELECT COUNT(*) FROM comments")?,
            categories: count("SELECT COUNT(*) FROM categories")?,
        })
    }

    // ==================== Private helpers ====================

    /// Attach links and convert columns into a `Topic`
    fn hydrate_topic(&self, row: TopicRow) -> StoreResult<Topic> {
        let links = self.links_for(row.id)?;

        Ok(Topic {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            created_by: row.created_by.parse()?,
            created_at: from_millis(row.created_at)?,
            links,
            archived_at: row.archived_at.map(from_millis).transpose()?,
        })
    }

    fn links_for(&self, topic_id: i64) -> StoreResult<Vec<TopicLink>> {
        let mut stmt = self
            .conn
            .prepare("SELECT label, url FROM topic_links WHERE topic_id = ? ORDER BY position")?;
        let links = stmt
            .query_map(params![topic_id], |row| {
                Ok(TopicLink {
                    label: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

// ==================== Internal structs ====================

struct TopicRow {
    id: i64,
    title: String,
    description: Option<String>,
    category: Option<String>,
    created_by: String,
    created_at: i64,
    archived_at: Option<i64>,
}

fn read_topic_row(row: &Row) -> rusqlite::Result<TopicRow> {
    Ok(TopicRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        archived_at: row.get(6)?,
    })
}

// ==================== Transaction helpers ====================

/// Insert a validated topic and its links, returning the new id
fn insert_topic(
    tx: &Transaction,
    topic: &ValidTopic,
    created_at: i64,
    archived_at: Option<i64>,
) -> StoreResult<i64> {
    tx.execute(
        r#"
        INSERT INTO topics (title, description, category, created_by, created_at, archived_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            topic.title,
            topic.description,
            topic.category,
            topic.author.as_str(),
            created_at,
            archived_at,
        ],
    )?;
    let id = tx.last_insert_rowid();

    for (position, link) in topic.links.iter().enumerate() {
        tx.execute(
            "INSERT INTO topic_links (topic_id, position, label, url) VALUES (?, ?, ?, ?)",
            params![id, position as i64, link.label, link.url],
        )?;
    }

    Ok(id)
}

/// Id of a stored topic with the same title, author and creation second
///
/// Spreadsheet timestamps carry whole seconds, so the stored millis are
/// matched against that second.
fn find_existing_topic(
    tx: &Transaction,
    imported: &spreadsheet::ImportedTopic,
) -> StoreResult<Option<i64>> {
    let second = imported.created_at.timestamp() * 1000;
    let id = tx
        .query_row(
            r#"
            SELECT id FROM topics
            WHERE title = ? AND created_by = ? AND created_at >= ? AND created_at < ?
            ORDER BY id LIMIT 1
            "#,
            params![
                imported.topic.title,
                imported.topic.author.as_str(),
                second,
                second + 1000
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::validation(format!("timestamp out of range: {}", millis)))
}

fn log_mutation(operation: &str, id: i64, changed: usize) {
    if changed > 0 {
        info!(id, operation, "Topic updated");
    } else {
        debug!(id, operation, "No change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Europe::Berlin;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn memory_store() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    fn solar() -> NewTopic {
        NewTopic::new("Solar Rollout", User::Kurt).category("Privatpersonen")
    }

    /// Force a topic's creation time (local Berlin wall clock)
    fn set_created_at(store: &Store, id: i64, y: i32, m: u32, d: u32, h: u32, min: u32) {
        let ts = Berlin
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp_millis();
        store
            .conn
            .execute("UPDATE topics SET created_at = ? WHERE id = ?", params![ts, id])
            .unwrap();
    }

    fn topic_count(store: &Store) -> i64 {
        store
            .conn
            .query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::open_with_config(config.clone()).unwrap();

        assert!(config.sqlite_path().exists());
        assert_eq!(store.categories().unwrap().len(), 4);
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let id = {
            let mut store = Store::open_with_config(config.clone()).unwrap();
            let id = store.create_topic(&solar().link("Plan", "https://example.com/plan")).unwrap();
            store.add_comment(id, User::Gerd, "looks good").unwrap();
            store.delete_category("Cashflowprojekte").unwrap();
            id
        };

        let store = Store::open_with_config(config).unwrap();
        let topic = store.topic(id).unwrap().unwrap();
        assert_eq!(topic.title, "Solar Rollout");
        assert_eq!(topic.links.len(), 1);
        assert_eq!(store.comments(id).unwrap().len(), 1);
        // Deleted default categories stay deleted
        assert!(!store.categories().unwrap().contains(&"Cashflowprojekte".to_string()));
    }

    #[test]
    fn test_create_topic_ids_and_timestamps_increase() {
        let mut store = memory_store();

        let mut last_id = 0;
        let mut last_created = None;
        for i in 0..5 {
            let id = store
                .create_topic(&NewTopic::new(format!("Topic {}", i), User::Marek))
                .unwrap();
            assert!(id > last_id);
            let created = store.topic(id).unwrap().unwrap().created_at;
            if let Some(prev) = last_created {
                assert!(created >= prev);
            }
            last_id = id;
            last_created = Some(created);
        }
    }

    #[test]
    fn test_create_topic_rejects_blank_title() {
        let mut store = memory_store();

        for title in ["", "   ", "\t\n"] {
            let err = store.create_topic(&NewTopic::new(title, User::Kurt)).unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(topic_count(&store), 0);
    }

    #[test]
    fn test_create_topic_rejects_bad_link() {
        let mut store = memory_store();

        let err = store
            .create_topic(
                &solar()
                    .link("ok", "https://example.com")
                    .link("bad", "ftp://example.com"),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(topic_count(&store), 0);
        assert_eq!(store.stats().unwrap().links, 0);
    }

    #[test]
    fn test_create_topic_stores_links_in_order() {
        let mut store = memory_store();

        let id = store
            .create_topic(
                &solar()
                    .description("  Roof panels for private homes  ")
                    .link("Dossier", "https://example.com/dossier")
                    .link("", "")
                    .link("", "http://example.com/ticket?id=7&x=y"),
            )
            .unwrap();

        let topic = store.topic(id).unwrap().unwrap();
        assert_eq!(topic.description.as_deref(), Some("Roof panels for private homes"));
        assert_eq!(topic.created_by, User::Kurt);
        assert_eq!(
            topic.links,
            vec![
                TopicLink {
                    label: "Dossier".to_string(),
                    url: "https://example.com/dossier".to_string()
                },
                TopicLink {
                    label: "http://example.com/ticket?id=7&x=y".to_string(),
                    url: "http://example.com/ticket?id=7&x=y".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_append_link() {
        let mut store = memory_store();
        let id = store.create_topic(&solar().link("First", "https://one.example")).unwrap();

        assert!(store.append_link(id, "https://two.example", "Second").unwrap());
        assert!(store.append_link(id, " https://three.example ", "").unwrap());

        let links = store.topic(id).unwrap().unwrap().links;
        let labels: Vec<_> = links.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["First", "Second", "https://three.example"]);

        let err = store.append_link(id, "javascript:alert(1)", "x").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.topic(id).unwrap().unwrap().links.len(), 3);
    }

    #[test]
    fn test_append_link_to_missing_topic_is_noop() {
        let mut store = memory_store();
        assert!(!store.append_link(99, "https://example.com", "x").unwrap());
        assert_eq!(store.stats().unwrap().links, 0);
    }

    #[test]
    fn test_update_category_allows_free_text() {
        let mut store = memory_store();
        let id = store.create_topic(&solar()).unwrap();

        assert!(store.update_category(id, Some("Neue Rubrik")).unwrap());
        assert!(store.update_category(id, Some("Neue Rubrik")).unwrap());
        assert_eq!(
            store.topic(id).unwrap().unwrap().category.as_deref(),
            Some("Neue Rubrik")
        );
        assert!(!store.categories().unwrap().contains(&"Neue Rubrik".to_string()));

        assert!(store.update_category(id, None).unwrap());
        assert_eq!(store.topic(id).unwrap().unwrap().category, None);

        assert!(!store.update_category(404, Some("x")).unwrap());
    }

    #[test]
    fn test_updates_and_comments() {
        let mut store = memory_store();
        let id = store.create_topic(&solar()).unwrap();

        let first = store.add_update(id, User::Annika, "  kickoff done  ").unwrap().unwrap();
        let second = store.add_update(id, User::Marek, "contract signed").unwrap().unwrap();
        store.add_comment(id, User::Gerd, "looks good").unwrap();

        let updates = store.updates(id).unwrap();
        assert_eq!(updates.len(), 2);
        // Newest first
        assert_eq!(updates[0].id, second);
        assert_eq!(updates[1].id, first);
        assert_eq!(updates[1].content, "kickoff done");
        assert_eq!(updates[1].user, User::Annika);

        let comments = store.comments(id).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].user, User::Gerd);
    }

    #[test]
    fn test_entry_validation_and_missing_topic() {
        let mut store = memory_store();
        let id = store.create_topic(&solar()).unwrap();

        assert!(store.add_update(id, User::Kurt, "   ").unwrap_err().is_validation());
        assert!(store.add_comment(id, User::Kurt, "").unwrap_err().is_validation());
        assert_eq!(store.add_comment(999, User::Kurt, "hello").unwrap(), None);
        assert!(store.updates(999).unwrap().is_empty());
        assert_eq!(store.stats().unwrap().comments, 0);
    }

    #[test]
    fn test_archive_and_restore_flip_partition() {
        let mut store = memory_store();
        let id = store.create_topic(&solar().link("a", "https://a.example")).unwrap();
        let before = store.topic(id).unwrap().unwrap();

        assert!(store.archive_topic(id).unwrap());
        let archived = store.topic(id).unwrap().unwrap();
        assert!(archived.is_archived());
        assert!(store.list_topics(&TopicFilter::active()).unwrap().is_empty());
        assert_eq!(store.list_topics(&TopicFilter::archived()).unwrap().len(), 1);

        // Idempotent, keeps the first timestamp
        assert!(!store.archive_topic(id).unwrap());
        assert_eq!(store.topic(id).unwrap().unwrap().archived_at, archived.archived_at);

        assert!(store.restore_topic(id).unwrap());
        assert!(!store.restore_topic(id).unwrap());
        assert_eq!(store.topic(id).unwrap().unwrap(), before);
        assert_eq!(store.list_topics(&TopicFilter::active()).unwrap().len(), 1);
        assert!(store.list_topics(&TopicFilter::archived()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_topic_cascades() {
        let mut store = memory_store();
        let id = store.create_topic(&solar().link("a", "https://a.example")).unwrap();
        store.add_update(id, User::Kurt, "u").unwrap();
        store.add_comment(id, User::Kurt, "c").unwrap();

        assert!(store.delete_topic(id).unwrap());
        assert!(!store.delete_topic(id).unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.active_topics, 0);
        assert_eq!(stats.links, 0);
        assert_eq!(stats.updates, 0);
        assert_eq!(stats.comments, 0);
        assert!(store.topic(id).unwrap().is_none());
        assert!(matches!(store.require_topic(id), Err(StoreError::TopicNotFound(_))));
    }

    #[test]
    fn test_filter_by_category_author_and_text() {
        let mut store = memory_store();
        let a = store.create_topic(&solar().description("Dächer in Köln")).unwrap();
        let b = store
            .create_topic(&NewTopic::new("Wärmepumpe", User::Annika).category("Wohnungswirtschaft"))
            .unwrap();
        let c = store
            .create_topic(&NewTopic::new("Leuchtturm Nord", User::Kurt).category("Leuchtturmprojekte"))
            .unwrap();

        let ids = |filter: TopicFilter| -> Vec<i64> {
            store.list_topics(&filter).unwrap().iter().map(|t| t.id).collect()
        };

        assert_eq!(ids(TopicFilter::active()), vec![c, b, a]);
        assert_eq!(ids(TopicFilter::active().author(User::Kurt)), vec![c, a]);
        assert_eq!(
            ids(TopicFilter::active().category("Privatpersonen").category("Wohnungswirtschaft")),
            vec![b, a]
        );
        assert_eq!(ids(TopicFilter::active().text("KÖLN")), vec![a]);
        assert_eq!(ids(TopicFilter::active().text("wärme")), vec![b]);
        assert_eq!(
            ids(TopicFilter::active().author(User::Kurt).text("nord")),
            vec![c]
        );
        assert!(ids(TopicFilter::active().category("Unbekannt")).is_empty());
    }

    #[test]
    fn test_filter_by_inclusive_date_range() {
        let mut store = memory_store();
        let early = store.create_topic(&NewTopic::new("early", User::Kurt)).unwrap();
        let first = store.create_topic(&NewTopic::new("first", User::Kurt)).unwrap();
        let last = store.create_topic(&NewTopic::new("last", User::Kurt)).unwrap();
        let late = store.create_topic(&NewTopic::new("late", User::Kurt)).unwrap();

        set_created_at(&store, early, 2025, 3, 9, 23, 59);
        set_created_at(&store, first, 2025, 3, 10, 0, 0);
        set_created_at(&store, last, 2025, 3, 12, 23, 59);
        set_created_at(&store, late, 2025, 3, 13, 0, 1);

        let from = NaiveDate::from_ymd_opt(2025, 3, 10);
        let to = NaiveDate::from_ymd_opt(2025, 3, 12);

        let ids: Vec<i64> = store
            .list_topics(&TopicFilter::active().between(from, to))
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![last, first]);

        let only_from: Vec<i64> = store
            .list_topics(&TopicFilter::active().between(from, None))
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(only_from, vec![late, last, first]);
    }

    #[test]
    fn test_deleting_referenced_category_keeps_stale_name() {
        let mut store = memory_store();
        let id = store.create_topic(&solar()).unwrap();

        assert!(store.delete_category("Privatpersonen").unwrap());
        assert!(!store.delete_category("Privatpersonen").unwrap());

        assert_eq!(
            store.topic(id).unwrap().unwrap().category.as_deref(),
            Some("Privatpersonen")
        );
        assert!(!store.categories().unwrap().contains(&"Privatpersonen".to_string()));
        // Still filterable by the stale name
        assert_eq!(
            store
                .list_topics(&TopicFilter::active().category("Privatpersonen"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_add_category() {
        let mut store = memory_store();

        assert!(store.add_category("  Speicherprojekte ").unwrap());
        assert!(!store.add_category("Speicherprojekte").unwrap());
        assert!(store.add_category("  ").unwrap_err().is_validation());

        let categories = store.categories().unwrap();
        assert_eq!(categories.len(), 5);
        let mut sorted = categories.clone();
        sorted.sort();
        assert_eq!(categories, sorted);
    }

    #[test]
    fn test_settings() {
        let mut store = memory_store();
        assert!(store.setting("archive_url").unwrap().is_none());

        store.set_setting("archive_url", "https://example.com/a.xlsx").unwrap();
        store.set_setting("archive_url", "https://example.com/b.xlsx").unwrap();
        store.set_setting("theme", "eco").unwrap();

        assert_eq!(
            store.setting("archive_url").unwrap().as_deref(),
            Some("https://example.com/b.xlsx")
        );
        assert_eq!(store.settings().unwrap().len(), 2);
        assert!(store.delete_setting("theme").unwrap());
        assert!(!store.delete_setting("theme").unwrap());
        assert!(store.set_setting(" ", "x").unwrap_err().is_validation());
    }

    #[test]
    fn test_bundles_for_selection() {
        let mut store = memory_store();
        let a = store.create_topic(&NewTopic::new("A", User::Kurt)).unwrap();
        let b = store.create_topic(&NewTopic::new("B", User::Kurt)).unwrap();
        store.archive_topic(b).unwrap();
        store.add_update(a, User::Gerd, "u1").unwrap();

        // All topics, both partitions, newest first
        let all: Vec<i64> = store
            .bundles(&Selection::all())
            .unwrap()
            .iter()
            .map(|b| b.topic.id)
            .collect();
        assert_eq!(all, vec![b, a]);

        // Explicit selection: ascending ids, missing ids skipped
        let picked = store.bundles(&Selection::of([b, 999, a])).unwrap();
        let ids: Vec<i64> = picked.iter().map(|b| b.topic.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(picked[0].updates.len(), 1);
    }

    #[test]
    fn test_write_snapshot_and_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = memory_store();
        let id = source
            .create_topic(
                &solar()
                    .description("Roof panels")
                    .link("Dossier", "https://example.com/dossier?a=1&b=2"),
            )
            .unwrap();
        source.add_update(id, User::Annika, "kickoff done").unwrap();
        source.add_comment(id, User::Gerd, "looks good").unwrap();
        let archived = source.create_topic(&NewTopic::new("Old idea", User::Marek)).unwrap();
        source.archive_topic(archived).unwrap();

        let path = temp_dir.path().join("snapshots").join("snapshot.xlsx");
        let written = source.write_snapshot(&path).unwrap();
        assert!(written > 0);

        let mut target = memory_store();
        let summary = target.import_spreadsheet(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                topics: 2,
                links: 1,
                updates: 1,
                comments: 1,
                skipped_topics: 0,
            }
        );

        let active = target.list_topics(&TopicFilter::active()).unwrap();
        assert_eq!(active.len(), 1);
        let imported = &active[0];
        let original = source.topic(id).unwrap().unwrap();
        assert_eq!(imported.title, original.title);
        assert_eq!(imported.description, original.description);
        assert_eq!(imported.category, original.category);
        assert_eq!(imported.links, original.links);
        // Spreadsheet timestamps carry whole seconds
        assert_eq!(imported.created_at.timestamp(), original.created_at.timestamp());

        let updates = target.updates(imported.id).unwrap();
        assert_eq!(updates[0].content, "kickoff done");
        assert_eq!(updates[0].user, User::Annika);
        assert_eq!(target.list_topics(&TopicFilter::archived()).unwrap().len(), 1);
    }

    #[test]
    fn test_future_import_does_not_shift_new_topics() {
        let mut store = memory_store();
        let mut sheets = {
            let mut source = memory_store();
            source.create_topic(&NewTopic::new("From the future", User::Marek)).unwrap();
            source.spreadsheet(&Selection::all(), Utc::now()).unwrap()
        };
        let topics = sheets.sheet_mut("Topics").unwrap();
        topics.rows[0][5] = spreadsheet::Cell::Text("2031-01-01T00:00:00+00:00".to_string());
        store.import_sheets(&sheets).unwrap();

        let before = Utc::now();
        let id = store.create_topic(&solar()).unwrap();
        let after = Utc::now();

        let created = store.topic(id).unwrap().unwrap().created_at;
        assert!(created >= before - chrono::Duration::milliseconds(1));
        assert!(created <= after);

        let today = created.with_timezone(&Berlin).date_naive();
        let listed: Vec<i64> = store
            .list_topics(&TopicFilter::active().between(Some(today), Some(today)))
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, vec![id]);
    }

    #[test]
    fn test_created_at_absorbs_small_clock_steps() {
        let mut store = memory_store();
        let first = store.create_topic(&NewTopic::new("First", User::Gerd)).unwrap();
        let ahead = Utc::now().timestamp_millis() + 2_000;
        store
            .conn
            .execute("UPDATE topics SET created_at = ? WHERE id = ?", params![ahead, first])
            .unwrap();

        let second = store.create_topic(&NewTopic::new("Second", User::Gerd)).unwrap();
        let created = store.topic(second).unwrap().unwrap().created_at;
        assert!(created.timestamp_millis() >= ahead);
    }

    #[test]
    fn test_importing_same_file_twice_is_idempotent() {
        let mut source = memory_store();
        let id = source
            .create_topic(&solar().link("Plan", "https://example.com/plan"))
            .unwrap();
        source.add_update(id, User::Annika, "kickoff done").unwrap();
        let bytes = source.export_xlsx(&Selection::all()).unwrap();

        let mut target = memory_store();
        let first = target.import_spreadsheet(&bytes).unwrap();
        assert_eq!(first.topics, 1);
        assert_eq!(first.updates, 1);

        let second = target.import_spreadsheet(&bytes).unwrap();
        assert_eq!(
            second,
            ImportSummary {
                skipped_topics: 1,
                ..ImportSummary::default()
            }
        );
        let stats = target.stats().unwrap();
        assert_eq!(stats.active_topics, 1);
        assert_eq!(stats.links, 1);
        assert_eq!(stats.updates, 1);

        // Re-importing its own archive leaves the source unchanged too
        let own = source.import_spreadsheet(&bytes).unwrap();
        assert_eq!(own.skipped_topics, 1);
        assert_eq!(source.stats().unwrap().active_topics, 1);
    }

    #[test]
    fn test_solar_rollout_document_and_links_sheet() {
        let mut store = memory_store();
        let id = store
            .create_topic(&solar().link("Dossier", "https://example.com/dossier?a=1&b=2"))
            .unwrap();
        set_created_at(&store, id, 2025, 3, 9, 13, 30);
        store.add_update(id, User::Annika, "kickoff done").unwrap();
        store.add_comment(id, User::Gerd, "looks good").unwrap();

        let exported_at = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let layout = store.document_layout(&Selection::of([id]), exported_at).unwrap();
        let lines: Vec<&str> = layout.lines().collect();

        assert_eq!(layout.topic_count, 1);
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "Qrauts AG Themensammler – Export");
        assert_eq!(lines[1], "Erstellt am: 2025-03-10 09:00:00 CET | Anzahl Themen: 1");
        assert_eq!(lines[2], format!("#{}  Solar Rollout", id));
        assert_eq!(
            lines[3],
            "Rubrik: Privatpersonen   |   Autor: Kurt   |   Eröffnung: 2025-03-09 13:30:00"
        );
        assert_eq!(lines[4], "Links:");
        assert_eq!(lines[5], "• Dossier: https://example.com/dossier?a=1&b=2");
        assert_eq!(lines[6], "Updates:");
        assert!(lines[7].starts_with("• ") && lines[7].ends_with(" – Annika: kickoff done"));
        assert_eq!(lines[8], "Kommentare:");
        assert!(lines[9].starts_with("• ") && lines[9].ends_with(" – Gerd: looks good"));

        let sheets = store.spreadsheet(&Selection::of([id]), exported_at).unwrap();
        let links = sheets.sheet("Links").unwrap();
        assert_eq!(
            links.rows,
            vec![vec![
                spreadsheet::Cell::Int(id),
                spreadsheet::Cell::Int(0),
                spreadsheet::Cell::Text("Dossier".to_string()),
                spreadsheet::Cell::Text("https://example.com/dossier?a=1&b=2".to_string()),
            ]]
        );
    }

    #[test]
    fn test_invalid_import_writes_nothing() {
        let mut store = memory_store();
        let mut sheets = {
            let mut source = memory_store();
            let id = source.create_topic(&solar()).unwrap();
            source.add_update(id, User::Annika, "ok").unwrap();
            source.spreadsheet(&Selection::all(), Utc::now()).unwrap()
        };

        // Point the update at a topic that is not in the file
        let updates = sheets.sheet_mut("Updates").unwrap();
        updates.rows[0][1] = spreadsheet::Cell::Int(12345);

        let err = store.import_sheets(&sheets).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(topic_count(&store), 0);
    }
}
