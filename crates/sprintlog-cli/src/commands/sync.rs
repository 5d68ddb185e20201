//! Sync command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use sprintlog_core::sync::{self, ARCHIVE_URL_SETTING};
use sprintlog_core::{ImportSummary, Store};

use crate::output::Output;

/// Download the remote archive into the local cache, optionally importing it
pub async fn fetch(
    store: &mut Store,
    url: Option<String>,
    and_import: bool,
    output: &Output,
) -> Result<()> {
    let url = sync::resolve_archive_url(store, url.as_deref()).with_context(|| {
        format!(
            "Set a default with: sprintlog setting set {} <url>",
            ARCHIVE_URL_SETTING
        )
    })?;
    let dest = store.config().archive_cache_path();

    output.message(&format!("Fetching {} ...", url));
    let bytes = sync::fetch_remote(&url, &dest).await.map_err(|e| {
        if let Some(hint) = e.recovery_suggestion() {
            output.message(hint);
        }
        e
    })?;
    output.success(&format!("Saved {} bytes to {}", bytes, dest.display()));

    if and_import {
        import_cache(store, output)?;
    }
    Ok(())
}

/// Import the cached archive
pub fn import_cache(store: &mut Store, output: &Output) -> Result<()> {
    let summary = sync::import_cached(store).context("Failed to import cached archive")?;
    report_import(&summary, output);
    Ok(())
}

/// Write a full spreadsheet snapshot of the local store
pub fn snapshot(store: &Store, path: Option<PathBuf>, output: &Output) -> Result<()> {
    let path = match path {
        Some(path) => {
            store.write_snapshot(&path)?;
            path
        }
        None => sync::write_snapshot(store)?,
    };

    if output.is_json() {
        output.print_json(&serde_json::json!({ "path": path }));
    } else if output.is_quiet() {
        println!("{}", path.display());
    } else {
        output.success(&format!("Wrote snapshot {}", path.display()));
    }
    Ok(())
}

/// Print what an import added and which topics it skipped
pub(crate) fn report_import(summary: &ImportSummary, output: &Output) {
    if output.is_json() {
        output.print_json(summary);
        return;
    }
    output.success(&format!(
        "Imported {} topic(s), {} link(s), {} update(s), {} comment(s)",
        summary.topics, summary.links, summary.updates, summary.comments
    ));
    if summary.skipped_topics > 0 {
        output.message(&format!(
            "Skipped {} topic(s) already present",
            summary.skipped_topics
        ));
    }
}
