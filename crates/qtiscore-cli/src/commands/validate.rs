//! The `qtiscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use qtiscore_core::package::{load_package, validate_package};
use qtiscore_core::registry::Registry;

pub fn execute(package_path: PathBuf) -> Result<()> {
    let package = load_package(&package_path)?;

    match &package.test {
        Some(test) => println!(
            "Package: {} ({} items, {} item refs)",
            test.identifier,
            package.items.len(),
            test.item_refs.len()
        ),
        None => println!("Package: ({} items, no test)", package.items.len()),
    }

    let warnings = validate_package(&package, &Registry::default());
    for w in &warnings {
        let prefix = w
            .scope
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Package valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
