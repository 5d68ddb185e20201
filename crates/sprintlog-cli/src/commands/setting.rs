//! Stored setting command handlers
//!
//! Settings live in the database and are shared by everyone using it,
//! unlike the per-machine config file.

use anyhow::Result;

use sprintlog_core::Store;

use crate::output::{Output, OutputFormat};

pub fn list(store: &Store, output: &Output) -> Result<()> {
    output.print_settings(&store.settings()?);
    Ok(())
}

pub fn get(store: &Store, key: String, output: &Output) -> Result<()> {
    let value = store.setting(&key)?;
    match output.format {
        OutputFormat::Json => output.print_json(&serde_json::json!({ "key": key, "value": value })),
        OutputFormat::Quiet => {
            if let Some(value) = value {
                println!("{}", value);
            }
        }
        OutputFormat::Human => match value {
            Some(value) => println!("{}", value),
            None => println!("{} is not set", key),
        },
    }
    Ok(())
}

pub fn set(store: &mut Store, key: String, value: String, output: &Output) -> Result<()> {
    store.set_setting(&key, &value)?;
    output.success(&format!("Set {} = {}", key.trim(), value.trim()));
    Ok(())
}

pub fn unset(store: &mut Store, key: String, output: &Output) -> Result<()> {
    if store.delete_setting(&key)? {
        output.success(&format!("Removed {}", key.trim()));
    } else {
        output.message(&format!("{} is not set", key.trim()));
    }
    Ok(())
}
