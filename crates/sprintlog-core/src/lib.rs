//! Sprintlog Core Library
//!
//! This crate provides the core functionality for sprintlog, a shared
//! collection of sprint topics with append-only updates and comments,
//! archiving, and PDF/spreadsheet exports.
//!
//! # Architecture
//!
//! - **SQLite**: Source of truth, one row per topic, link, update and comment
//! - **Exports**: Pure layout/sheet builders, rendered by printpdf and rust_xlsxwriter
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! // Add a topic
//! let id = store.create_topic(&NewTopic::new("Solar Rollout", User::Kurt))?;
//! store.add_update(id, User::Annika, "kickoff done")?;
//!
//! // Query topics
//! let topics = store.list_topics(&TopicFilter::active())?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Topics, links, entries and users
//! - `filter`: Topic listing filters
//! - `selection`: Export selection
//! - `export`: PDF and spreadsheet exports
//! - `sync`: Remote archive fetch and snapshots
//! - `storage`: Schema, errors and file helpers
//! - `config`: Application configuration

pub mod config;
pub mod export;
pub mod filter;
pub mod models;
pub mod selection;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use filter::TopicFilter;
pub use models::{Entry, EntryKind, NewTopic, Topic, TopicBundle, TopicLink, User};
pub use selection::Selection;
pub use storage::{StoreError, StoreResult};
pub use store::{ImportSummary, Store, StoreStats};
