//! Topic command handlers

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;

use sprintlog_core::{NewTopic, Store, StoreError, TopicFilter, User};

use crate::editor::confirm;
use crate::output::Output;

/// Filter flags shared by `topic list` and `export`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these categories (repeatable)
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Only topics by these authors (repeatable)
    #[arg(short, long = "author")]
    pub authors: Vec<User>,

    /// Case-insensitive text in title or description
    #[arg(short, long)]
    pub search: Option<String>,

    /// Created on or after this local date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Created on or before this local date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Archived topics instead of active ones
    #[arg(long)]
    pub archived: bool,
}

impl FilterArgs {
    /// Whether any flag narrows the listing
    pub fn is_set(&self) -> bool {
        !self.categories.is_empty()
            || !self.authors.is_empty()
            || self.search.is_some()
            || self.from.is_some()
            || self.to.is_some()
            || self.archived
    }

    pub fn to_filter(&self) -> TopicFilter {
        let mut filter = if self.archived {
            TopicFilter::archived()
        } else {
            TopicFilter::active()
        };
        for category in &self.categories {
            filter = filter.category(category.as_str());
        }
        for author in &self.authors {
            filter = filter.author(*author);
        }
        if let Some(ref text) = self.search {
            filter = filter.text(text.as_str());
        }
        filter.between(self.from, self.to)
    }
}

/// Split a `--link` argument into `(label, url)`
///
/// `label=url` sets a label; a bare URL (which may itself contain `=`)
/// gets an empty label.
pub fn parse_link_arg(arg: &str) -> (String, String) {
    match arg.split_once('=') {
        Some((label, url)) if !label.contains("://") => {
            (label.trim().to_string(), url.trim().to_string())
        }
        _ => (String::new(), arg.trim().to_string()),
    }
}

/// Create a new topic
pub fn create(
    store: &mut Store,
    new: NewTopic,
    output: &Output,
) -> Result<()> {
    let id = store.create_topic(&new).context("Failed to create topic")?;

    output.success(&format!("Created topic #{}", id));
    if let Some(bundle) = store.bundle(id)? {
        output.print_topic(&bundle);
    }

    Ok(())
}

/// List topics matching the filter flags
pub fn list(store: &Store, filter: &FilterArgs, output: &Output) -> Result<()> {
    let topics = store.list_topics(&filter.to_filter())?;
    output.print_topics(&topics);
    Ok(())
}

/// Show a single topic with its updates and comments
pub fn show(store: &Store, id: i64, output: &Output) -> Result<()> {
    let bundle = store.bundle(id)?.ok_or(StoreError::TopicNotFound(id))?;
    output.print_topic(&bundle);
    Ok(())
}

/// Reassign or clear a topic's category
pub fn set_category(
    store: &mut Store,
    id: i64,
    category: Option<String>,
    output: &Output,
) -> Result<()> {
    if !store.update_category(id, category.as_deref())? {
        return Err(StoreError::TopicNotFound(id).into());
    }

    let known = store.categories()?;
    match category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(name) => {
            output.success(&format!("Topic #{} category set to '{}'", id, name));
            if !known.iter().any(|c| c == name) {
                output.message(&format!(
                    "Note: '{}' is not in the category list. Add it with: sprintlog category add \"{}\"",
                    name, name
                ));
            }
        }
        None => output.success(&format!("Topic #{} category cleared", id)),
    }

    Ok(())
}

/// Append a link to a topic
pub fn link(
    store: &mut Store,
    id: i64,
    url: String,
    label: Option<String>,
    output: &Output,
) -> Result<()> {
    if !store.append_link(id, &url, label.as_deref().unwrap_or(""))? {
        return Err(StoreError::TopicNotFound(id).into());
    }
    output.success(&format!("Added link to topic #{}", id));
    Ok(())
}

/// Move a topic to the archive
pub fn archive(store: &mut Store, id: i64, output: &Output) -> Result<()> {
    let topic = store.require_topic(id)?;
    if store.archive_topic(id)? {
        output.success(&format!("Archived topic #{}: {}", id, topic.title));
    } else {
        output.message(&format!("Topic #{} is already archived", id));
    }
    Ok(())
}

/// Restore an archived topic
pub fn restore(store: &mut Store, id: i64, output: &Output) -> Result<()> {
    let topic = store.require_topic(id)?;
    if store.restore_topic(id)? {
        output.success(&format!("Restored topic #{}: {}", id, topic.title));
    } else {
        output.message(&format!("Topic #{} is not archived", id));
    }
    Ok(())
}

/// Delete a topic together with its links, updates and comments
pub fn delete(store: &mut Store, id: i64, force: bool, output: &Output) -> Result<()> {
    let topic = store.require_topic(id)?;

    if !force && output.should_prompt() {
        let prompt = format!(
            "Delete topic #{} '{}' with all updates and comments?",
            id, topic.title
        );
        if !confirm(&prompt)? {
            bail!("Aborted. Pass --force to delete without confirmation.");
        }
    }

    store.delete_topic(id)?;
    output.success(&format!("Deleted topic #{}", id));
    Ok(())
}
