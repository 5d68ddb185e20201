//! Sprintlog CLI
//!
//! Command-line interface for sprintlog - sprint topics, updates,
//! comments and exports.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sprintlog_core::config::DEFAULT_TZ;
use sprintlog_core::{Config, EntryKind, NewTopic, Store, User};

mod commands;
mod editor;
mod output;

use commands::export::Format;
use commands::topic::FilterArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "sprintlog")]
#[command(about = "Sprintlog - shared sprint topics with updates, comments and exports")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Act as this user (Marek, Annika, Kurt, Gerd)
    #[arg(short, long, global = true)]
    user: Option<User>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage topics
    Topic {
        #[command(subcommand)]
        command: TopicCommands,
    },
    /// Progress updates on a topic
    Update {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Comments on a topic
    Comment {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Manage the category list
    Category {
        #[command(subcommand)]
        command: Option<CategoryCommands>,
    },
    /// Export topics to PDF or spreadsheet
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Import topics from a spreadsheet export
    Import {
        /// Path to an .xlsx file
        file: PathBuf,
    },
    /// Remote archive and snapshots
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Shared settings stored in the database
    Setting {
        #[command(subcommand)]
        command: Option<SettingCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (storage, archive, counts)
    Status,
}

#[derive(Subcommand)]
enum TopicCommands {
    /// Create a new topic
    #[command(alias = "add")]
    Create {
        /// Topic title
        title: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
        /// Category
        #[arg(short, long)]
        category: Option<String>,
        /// Link as `label=url` or a bare URL (repeatable)
        #[arg(short, long = "link", value_name = "LINK")]
        links: Vec<String>,
    },
    /// List topics
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show topic details with updates and comments
    Show {
        /// Topic id
        id: i64,
    },
    /// Set or clear a topic's category
    Category {
        /// Topic id
        id: i64,
        /// New category (omit to clear)
        category: Option<String>,
    },
    /// Append a link to a topic
    Link {
        /// Topic id
        id: i64,
        /// URL (http:// or https://)
        url: String,
        /// Label (defaults to the URL)
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Move a topic to the archive
    Archive {
        /// Topic id
        id: i64,
    },
    /// Restore an archived topic
    Restore {
        /// Topic id
        id: i64,
    },
    /// Delete a topic with all its updates and comments
    #[command(alias = "rm")]
    Delete {
        /// Topic id
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Add an entry (opens $EDITOR if no text is given)
    Add {
        /// Topic id
        topic_id: i64,
        /// Text
        text: Option<String>,
    },
    /// List entries, newest first
    #[command(alias = "ls")]
    List {
        /// Topic id
        topic_id: i64,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    #[command(alias = "ls")]
    List,
    /// Add a category
    Add { name: String },
    /// Remove a category (topics keep their value)
    #[command(alias = "rm")]
    Delete { name: String },
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Topic ids to export (default: all, or those matching the filters)
    ids: Vec<i64>,

    #[command(flatten)]
    filter: FilterArgs,

    /// Output file
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Paginated PDF report
    Pdf(ExportArgs),
    /// Spreadsheet with Topics, Links, Updates, Comments and Meta sheets
    Xlsx(ExportArgs),
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Download the remote archive into the local cache
    Fetch {
        /// Archive URL (default: the `archive_url` setting)
        url: Option<String>,
        /// Import the archive after downloading
        #[arg(long)]
        import: bool,
    },
    /// Import the cached archive
    Import,
    /// Write a spreadsheet snapshot of all topics
    Snapshot {
        /// Output file (default: snapshots/snapshot-<timestamp>.xlsx in the data dir)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SettingCommands {
    /// List all settings
    #[command(alias = "ls")]
    List,
    /// Print one setting
    Get { key: String },
    /// Store a setting
    Set { key: String, value: String },
    /// Remove a setting
    #[command(alias = "rm")]
    Unset { key: String },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, timezone, default_user, app_title, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from_flags(cli.json, cli.quiet);

    // Config commands skip validation so a bad value can be fixed
    if let Commands::Config { command } = &cli.command {
        let output = Output::new(format, DEFAULT_TZ);
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    let output = Output::new(format, config.tz()?);
    let acting_user = cli.user.or(config.default_user);
    let mut store = Store::open_with_config(config)?;
    debug!(data_dir = %store.config().data_dir.display(), "Store opened");

    match cli.command {
        Commands::Topic { command } => {
            handle_topic_command(command, &mut store, acting_user, &output)
        }
        Commands::Update { command } => {
            handle_entry_command(EntryKind::Update, command, &mut store, acting_user, &output)
        }
        Commands::Comment { command } => {
            handle_entry_command(EntryKind::Comment, command, &mut store, acting_user, &output)
        }
        Commands::Category { command } => handle_category_command(command, &mut store, &output),
        Commands::Export { command } => handle_export_command(command, &store, &output),
        Commands::Import { file } => commands::export::import(&mut store, &file, &output),
        Commands::Sync { command } => handle_sync_command(command, &mut store, &output).await,
        Commands::Setting { command } => handle_setting_command(command, &mut store, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&store, &output),
    }
}

/// The user to record as author
fn require_user(user: Option<User>) -> Result<User> {
    user.ok_or_else(|| {
        anyhow::anyhow!(
            "No user given. Pass --user <name> or set a default:\n  \
             sprintlog config set default_user <name>"
        )
    })
}

fn handle_topic_command(
    command: TopicCommands,
    store: &mut Store,
    user: Option<User>,
    output: &Output,
) -> Result<()> {
    match command {
        TopicCommands::Create {
            title,
            description,
            category,
            links,
        } => {
            let mut new = NewTopic::new(title, require_user(user)?);
            new.description = description;
            new.category = category;
            new.links = links
                .iter()
                .map(|arg| commands::topic::parse_link_arg(arg))
                .collect();
            commands::topic::create(store, new, output)
        }
        TopicCommands::List { filter } => commands::topic::list(store, &filter, output),
        TopicCommands::Show { id } => commands::topic::show(store, id, output),
        TopicCommands::Category { id, category } => {
            commands::topic::set_category(store, id, category, output)
        }
        TopicCommands::Link { id, url, label } => {
            commands::topic::link(store, id, url, label, output)
        }
        TopicCommands::Archive { id } => commands::topic::archive(store, id, output),
        TopicCommands::Restore { id } => commands::topic::restore(store, id, output),
        TopicCommands::Delete { id, force } => commands::topic::delete(store, id, force, output),
    }
}

fn handle_entry_command(
    kind: EntryKind,
    command: EntryCommands,
    store: &mut Store,
    user: Option<User>,
    output: &Output,
) -> Result<()> {
    match command {
        EntryCommands::Add { topic_id, text } => {
            commands::entry::add(store, kind, topic_id, require_user(user)?, text, output)
        }
        EntryCommands::List { topic_id } => commands::entry::list(store, kind, topic_id, output),
    }
}

fn handle_category_command(
    command: Option<CategoryCommands>,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        Some(CategoryCommands::List) | None => commands::category::list(store, output),
        Some(CategoryCommands::Add { name }) => commands::category::add(store, name, output),
        Some(CategoryCommands::Delete { name }) => commands::category::delete(store, name, output),
    }
}

fn handle_export_command(command: ExportCommands, store: &Store, output: &Output) -> Result<()> {
    let (format, args) = match command {
        ExportCommands::Pdf(args) => (Format::Pdf, args),
        ExportCommands::Xlsx(args) => (Format::Xlsx, args),
    };
    let selection = commands::export::selection(store, &args.ids, &args.filter)?;
    commands::export::export(store, format, &selection, args.output, output)
}

async fn handle_sync_command(
    command: SyncCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        SyncCommands::Fetch { url, import } => {
            commands::sync::fetch(store, url, import, output).await
        }
        SyncCommands::Import => commands::sync::import_cache(store, output),
        SyncCommands::Snapshot { output: path } => commands::sync::snapshot(store, path, output),
    }
}

fn handle_setting_command(
    command: Option<SettingCommands>,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        Some(SettingCommands::List) | None => commands::setting::list(store, output),
        Some(SettingCommands::Get { key }) => commands::setting::get(store, key, output),
        Some(SettingCommands::Set { key, value }) => {
            commands::setting::set(store, key, value, output)
        }
        Some(SettingCommands::Unset { key }) => commands::setting::unset(store, key, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging to stderr, or to the configured log file
fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::new(format!(
        "sprintlog_core={},sprintlog_cli={}",
        log_level, log_level
    ));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_topic_create() {
        let cli = Cli::try_parse_from([
            "sprintlog",
            "--user",
            "kurt",
            "topic",
            "create",
            "Solar Rollout",
            "-c",
            "Privatpersonen",
            "--link",
            "Plan=https://example.com/plan",
        ])
        .unwrap();

        assert_eq!(cli.user, Some(User::Kurt));
        match cli.command {
            Commands::Topic {
                command: TopicCommands::Create { title, category, links, .. },
            } => {
                assert_eq!(title, "Solar Rollout");
                assert_eq!(category.as_deref(), Some("Privatpersonen"));
                assert_eq!(links, vec!["Plan=https://example.com/plan"]);
            }
            _ => panic!("expected topic create"),
        }
    }

    #[test]
    fn test_parse_export_with_filters() {
        let cli = Cli::try_parse_from([
            "sprintlog", "export", "pdf", "-a", "Gerd", "--from", "2025-01-01", "-o", "out.pdf",
        ])
        .unwrap();

        match cli.command {
            Commands::Export {
                command: ExportCommands::Pdf(args),
            } => {
                assert!(args.ids.is_empty());
                assert_eq!(args.filter.authors, vec![User::Gerd]);
                assert!(args.filter.from.is_some());
                assert_eq!(args.output, Some(PathBuf::from("out.pdf")));
            }
            _ => panic!("expected export pdf"),
        }
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        assert!(Cli::try_parse_from(["sprintlog", "--user", "Bob", "status"]).is_err());
    }

    #[test]
    fn test_require_user() {
        assert_eq!(require_user(Some(User::Marek)).unwrap(), User::Marek);
        assert!(require_user(None).is_err());
    }
}
