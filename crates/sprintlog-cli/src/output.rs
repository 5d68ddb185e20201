//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono_tz::Tz;
use serde::Serialize;

use sprintlog_core::export::format_local;
use sprintlog_core::{Entry, EntryKind, Topic, TopicBundle};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
    /// Zone for displayed timestamps
    pub tz: Tz,
}

impl Output {
    pub fn new(format: OutputFormat, tz: Tz) -> Self {
        Self { format, tz }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode JSON: {}", e),
        }
    }

    /// Print a topic with its links, updates and comments
    pub fn print_topic(&self, bundle: &TopicBundle) {
        let topic = &bundle.topic;
        match self.format {
            OutputFormat::Human => {
                println!("#{}  {}", topic.id, topic.title);
                println!(
                    "Category:    {}",
                    topic.category.as_deref().unwrap_or("(none)")
                );
                println!("Author:      {}", topic.created_by);
                println!("Created:     {}", format_local(topic.created_at, self.tz));
                if let Some(archived_at) = topic.archived_at {
                    println!("Archived:    {}", format_local(archived_at, self.tz));
                }
                if let Some(ref desc) = topic.description {
                    println!();
                    println!("{}", desc);
                }

                if !topic.links.is_empty() {
                    println!();
                    println!("── Links ({}) ──", topic.links.len());
                    for link in &topic.links {
                        if link.label == link.url {
                            println!("{}", link.url);
                        } else {
                            println!("{}: {}", link.label, link.url);
                        }
                    }
                }

                for (kind, entries) in [
                    (EntryKind::Update, &bundle.updates),
                    (EntryKind::Comment, &bundle.comments),
                ] {
                    if entries.is_empty() {
                        continue;
                    }
                    println!();
                    println!("── {} ({}) ──", kind.heading(), entries.len());
                    for entry in entries.iter() {
                        println!(
                            "[{}] {}: {}",
                            format_local(entry.created_at, self.tz),
                            entry.user,
                            truncate_line(&entry.content, 60)
                        );
                    }
                }
            }
            OutputFormat::Json => {
                self.print_json(&serde_json::json!({
                    "topic": topic,
                    "updates": bundle.updates,
                    "comments": bundle.comments,
                }));
            }
            OutputFormat::Quiet => {
                println!("{}", topic.id);
            }
        }
    }

    /// Print a list of topics
    pub fn print_topics(&self, topics: &[Topic]) {
        match self.format {
            OutputFormat::Human => {
                if topics.is_empty() {
                    println!("No topics found.");
                    return;
                }
                for topic in topics {
                    let archived = if topic.is_archived() { " [archived]" } else { "" };
                    println!(
                        "#{:<4} | {} | {:<6} | {:<20} | {}{}",
                        topic.id,
                        topic.created_at.with_timezone(&self.tz).format("%Y-%m-%d"),
                        topic.created_by.as_str(),
                        truncate(topic.category.as_deref().unwrap_or("—"), 20),
                        truncate(&topic.title, 40),
                        archived
                    );
                }
                println!("\n{} topic(s)", topics.len());
            }
            OutputFormat::Json => self.print_json(topics),
            OutputFormat::Quiet => {
                for topic in topics {
                    println!("{}", topic.id);
                }
            }
        }
    }

    /// Print the updates or comments of a topic
    pub fn print_entries(&self, kind: EntryKind, topic: &Topic, entries: &[Entry]) {
        match self.format {
            OutputFormat::Human => {
                println!("{} for: #{} {}", kind.heading(), topic.id, topic.title);
                println!();

                if entries.is_empty() {
                    println!("No {}s on this topic.", kind);
                    return;
                }

                for entry in entries {
                    println!("────────────────────────────────────────");
                    println!(
                        "ID: {}  {}  {}",
                        entry.id,
                        format_local(entry.created_at, self.tz),
                        entry.user
                    );
                    println!();
                    println!("{}", entry.content);
                    println!();
                }
                println!("{} {}(s)", entries.len(), kind);
            }
            OutputFormat::Json => self.print_json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print a list of names, one per line
    pub fn print_names(&self, names: &[String], noun: &str) {
        match self.format {
            OutputFormat::Human => {
                if names.is_empty() {
                    println!("No {}s found.", noun);
                    return;
                }
                for name in names {
                    println!("{}", name);
                }
                println!("\n{} {}(s)", names.len(), noun);
            }
            OutputFormat::Json => self.print_json(names),
            OutputFormat::Quiet => {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print key/value settings
    pub fn print_settings(&self, settings: &[(String, String)]) {
        match self.format {
            OutputFormat::Human => {
                if settings.is_empty() {
                    println!("No settings stored.");
                    return;
                }
                let width = settings.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
                for (key, value) in settings {
                    println!("{:<width$}  {}", key, value, width = width);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = settings
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                self.print_json(&map);
            }
            OutputFormat::Quiet => {
                for (_, value) in settings {
                    println!("{}", value);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
