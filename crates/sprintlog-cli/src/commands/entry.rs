//! Update and comment command handlers
//!
//! Both logs are append-only; entries are never edited or removed on
//! their own.

use anyhow::{bail, Context, Result};

use sprintlog_core::{EntryKind, Store, StoreError, User};

use crate::editor::{edit_text, template};
use crate::output::Output;

/// Append an update or comment to a topic
pub fn add(
    store: &mut Store,
    kind: EntryKind,
    topic_id: i64,
    user: User,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    let topic = store.require_topic(topic_id)?;

    let content = match content {
        Some(text) => text,
        None => {
            let heading = format!("{} by {} on #{} {}", kind.heading(), user, topic.id, topic.title);
            edit_text(&template(&heading)).with_context(|| format!("Failed to edit {}", kind))?
        }
    };

    if content.trim().is_empty() {
        bail!("{} text cannot be empty", kind.heading());
    }

    let id = store
        .add_entry(kind, topic_id, user, &content)?
        .ok_or(StoreError::TopicNotFound(topic_id))?;

    output.success(&format!("Added {} {} to topic #{}", kind, id, topic_id));
    Ok(())
}

/// List the updates or comments of a topic, newest first
pub fn list(store: &Store, kind: EntryKind, topic_id: i64, output: &Output) -> Result<()> {
    let topic = store.require_topic(topic_id)?;
    let entries = store.entries(kind, topic_id)?;
    output.print_entries(kind, &topic, &entries);
    Ok(())
}
