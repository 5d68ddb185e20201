//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/sprintlog/config.toml)
//! 3. Environment variables (SPRINTLOG_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::User;

/// Environment variable prefix
const ENV_PREFIX: &str = "SPRINTLOG";

/// Default display time zone
pub const DEFAULT_TZ: Tz = chrono_tz::Europe::Berlin;

/// Name of [`DEFAULT_TZ`] as written to the config file
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Default title printed on exports
pub const DEFAULT_APP_TITLE: &str = "Qrauts AG Themensammler";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, archive cache, snapshots)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// IANA time zone used for timestamps and date filters
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Acting user when none is given on the command line
    #[serde(default)]
    pub default_user: Option<User>,

    /// Title printed in export headers
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timezone: default_timezone(),
            default_user: None,
            app_title: default_app_title(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SPRINTLOG_DATA_DIR, SPRINTLOG_TIMEZONE, ...)
    /// 2. Config file (~/.config/sprintlog/config.toml or SPRINTLOG_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = Self::load_for_edit(path)?;
        config.tz()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration without validating values
    ///
    /// Used by `config show` and `config set`, which must still work when the
    /// file holds a value that [`Config::load_from_path`] would reject.
    pub fn load_for_edit(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.tz()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_TIMEZONE", ENV_PREFIX)) {
            if !val.is_empty() {
                self.timezone = val;
            }
        }

        // An unknown name is ignored rather than failing every command
        if let Ok(val) = std::env::var(format!("{}_USER", ENV_PREFIX)) {
            self.default_user = if val.is_empty() { None } else { val.parse().ok() };
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// The configured time zone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SPRINTLOG_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sprintlog")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("sprintlog.db")
    }

    /// Get the path of the fetched remote archive
    pub fn archive_cache_path(&self) -> PathBuf {
        self.data_dir.join("archive_cache.xlsx")
    }

    /// Get the directory for spreadsheet snapshots
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sprintlog")
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_app_title() -> String {
    DEFAULT_APP_TITLE.to_string()
}
