//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use sprintlog_core::{Config, User};

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "timezone": config.timezone,
                    "default_user": config.default_user,
                    "app_title": config.app_title,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:     {}", config.data_dir.display());
            println!("  timezone:     {}", config.timezone);
            println!(
                "  default_user: {}",
                config
                    .default_user
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  app_title:    {}", config.app_title);
            println!(
                "  log_file:     {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config = load(config_path)?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Load the file for editing, without rejecting invalid values
fn load(config_path: Option<&PathBuf>) -> Result<Config> {
    let path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    Config::load_for_edit(&path).context("Failed to load configuration")
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "timezone" => {
            config.timezone = value.to_string();
            config.tz()?;
        }
        "default_user" => {
            config.default_user = if unset {
                None
            } else {
                Some(value.parse::<User>()?)
            };
        }
        "app_title" => {
            if value.trim().is_empty() {
                bail!("app_title cannot be empty");
            }
            config.app_title = value.trim().to_string();
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, timezone, default_user, app_title, log_file",
                key
            );
        }
    }

    Ok(())
}
