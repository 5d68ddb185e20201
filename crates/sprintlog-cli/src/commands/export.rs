//! Export and import command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;

use sprintlog_core::storage::atomic_write;
use sprintlog_core::{Selection, Store};

use crate::commands::topic::FilterArgs;
use crate::output::Output;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Xlsx,
}

impl Format {
    fn extension(&self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Xlsx => "xlsx",
        }
    }
}

/// Resolve the export selection
///
/// Explicit ids win; otherwise filter flags select every listed topic;
/// with neither, everything is exported.
pub fn selection(store: &Store, ids: &[i64], filter: &FilterArgs) -> Result<Selection> {
    if !ids.is_empty() {
        return Ok(Selection::of(ids.iter().copied()));
    }

    let mut selection = Selection::all();
    if filter.is_set() {
        let topics = store.list_topics(&filter.to_filter())?;
        if topics.is_empty() {
            bail!("No topics match the given filters; nothing to export.");
        }
        selection.select_listed(&topics);
    }
    Ok(selection)
}

/// Write an export of the selected topics
pub fn export(
    store: &Store,
    format: Format,
    selection: &Selection,
    path: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let path = path.unwrap_or_else(|| default_export_path(store, format));

    let bytes = match format {
        Format::Pdf => store.export_pdf(selection)?,
        Format::Xlsx => store.export_xlsx(selection)?,
    };
    atomic_write(&path, &bytes).with_context(|| format!("Failed to write {:?}", path))?;

    let scope = if selection.is_all() {
        "all topics".to_string()
    } else {
        format!("{} selected topic(s)", selection.len())
    };
    output.success(&format!("Exported {} to {}", scope, path.display()));
    Ok(())
}

/// Import an `.xlsx` export, skipping topics already present
pub fn import(store: &mut Store, path: &Path, output: &Output) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let summary = store
        .import_spreadsheet(&bytes)
        .with_context(|| format!("Failed to import {:?}", path))?;

    super::sync::report_import(&summary, output);
    Ok(())
}

/// `sprintlog-export-YYYYMMDD-HHMMSS.<ext>` in the working directory
fn default_export_path(store: &Store, format: Format) -> PathBuf {
    let stamp = Utc::now().with_timezone(&store.tz()).format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("sprintlog-export-{}.{}", stamp, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprintlog_core::{Config, NewTopic, User};

    fn memory_store() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    #[test]
    fn test_selection_prefers_ids() {
        let store = memory_store();
        let filter = FilterArgs {
            search: Some("x".to_string()),
            ..FilterArgs::default()
        };
        let selection = selection(&store, &[3, 1], &filter).unwrap();
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_selection_from_filter() {
        let mut store = memory_store();
        let a = store.create_topic(&NewTopic::new("Solar", User::Kurt)).unwrap();
        store.create_topic(&NewTopic::new("Wind", User::Gerd)).unwrap();

        let filter = FilterArgs {
            authors: vec![User::Kurt],
            ..FilterArgs::default()
        };
        let selection = selection(&store, &[], &filter).unwrap();
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec![a]);

        let none = FilterArgs {
            search: Some("nothing matches".to_string()),
            ..FilterArgs::default()
        };
        assert!(super::selection(&store, &[], &none).is_err());

        assert!(super::selection(&store, &[], &FilterArgs::default())
            .unwrap()
            .is_all());
    }

    #[test]
    fn test_export_and_import_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = Output::new(crate::output::OutputFormat::Quiet, chrono_tz::Europe::Berlin);
        let mut store = memory_store();
        store
            .create_topic(&NewTopic::new("Solar Rollout", User::Kurt))
            .unwrap();

        let pdf = temp_dir.path().join("out.pdf");
        export(&store, Format::Pdf, &Selection::all(), Some(pdf.clone()), &output).unwrap();
        assert!(std::fs::read(&pdf).unwrap().starts_with(b"%PDF"));

        let xlsx = temp_dir.path().join("out.xlsx");
        export(&store, Format::Xlsx, &Selection::all(), Some(xlsx.clone()), &output).unwrap();

        let mut target = memory_store();
        import(&mut target, &xlsx, &output).unwrap();
        assert_eq!(target.stats().unwrap().active_topics, 1);
    }
}
