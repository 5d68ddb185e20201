//! Status command handler

use anyhow::Result;

use sprintlog_core::sync::ARCHIVE_URL_SETTING;
use sprintlog_core::Store;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let stats = store.stats()?;
    let config = store.config();
    let archive_url = store.setting(ARCHIVE_URL_SETTING)?;
    let cache = config.archive_cache_path();
    let database_size = std::fs::metadata(config.sqlite_path())
        .map(|m| m.len())
        .unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "timezone": config.timezone,
                    "default_user": config.default_user,
                    "database_size": database_size,
                    "archive_url": archive_url,
                    "archive_cached": cache.exists(),
                    "counts": stats
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", stats.active_topics);
        }
        OutputFormat::Human => {
            println!("Sprintlog Status");
            println!("================");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Database: {}", format_size(database_size));
            println!("  Timezone: {}", config.timezone);
            println!();
            println!("Archive:");
            println!(
                "  URL:    {}",
                archive_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  Cached: {}",
                if cache.exists() { "yes" } else { "no" }
            );
            println!();
            println!("Contents:");
            println!("  Topics:     {} active, {} archived", stats.active_topics, stats.archived_topics);
            println!("  Links:      {}", stats.links);
            println!("  Updates:    {}", stats.updates);
            println!("  Comments:   {}", stats.comments);
            println!("  Categories: {}", stats.categories);
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
