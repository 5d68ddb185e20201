//! Category command handlers

use anyhow::Result;

use sprintlog_core::Store;

use crate::output::Output;

/// List selectable categories
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let categories = store.categories()?;
    output.print_names(&categories, "category");
    Ok(())
}

/// Add a category to the selectable list
pub fn add(store: &mut Store, name: String, output: &Output) -> Result<()> {
    if store.add_category(&name)? {
        output.success(&format!("Added category '{}'", name.trim()));
    } else {
        output.message(&format!("Category '{}' already exists", name.trim()));
    }
    Ok(())
}

/// Remove a category from the list; topics keep their current value
pub fn delete(store: &mut Store, name: String, output: &Output) -> Result<()> {
    if store.delete_category(&name)? {
        output.success(&format!("Deleted category '{}'", name.trim()));
    } else {
        output.message(&format!("Category '{}' does not exist", name.trim()));
    }
    Ok(())
}
