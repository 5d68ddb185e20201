//! Storage layer
//!
//! SQLite persistence for topics and their logs, plus atomic file writes
//! for exported artifacts.
//!
//! ## Files
//!
//! - `sprintlog.db` - The SQLite database (source of truth)
//! - `archive_cache.xlsx` - Last fetched remote archive
//! - `snapshots/` - Spreadsheet snapshots written for distribution

pub mod error;
pub mod files;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use files::atomic_write;
pub use schema::{init_schema, needs_init, DEFAULT_CATEGORIES, SCHEMA_VERSION};
