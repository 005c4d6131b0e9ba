//! The `qtiscore score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use qtiscore_core::config::load_config_from;
use qtiscore_core::package::{load_package, load_results};
use qtiscore_core::ScoringEngine;

pub fn execute(
    package_path: PathBuf,
    results_path: PathBuf,
    item_id: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let package = load_package(&package_path)?;
    let results = load_results(&results_path)?;

    let item = package
        .items
        .iter()
        .find(|item| item.identifier == item_id)
        .cloned()
        .with_context(|| format!("item not found in package: {item_id}"))?;

    let engine = ScoringEngine::builder()
        .item(item.clone())
        .config(config)
        .build()
        .context("failed to prepare scoring engine")?;

    for mut result in results {
        match result
            .item_results
            .iter_mut()
            .find(|r| r.identifier == item_id)
        {
            Some(item_result) => {
                let score = engine.normalized_item_score(&item, item_result, &result.identifier);
                println!("{}\t{score:.4}", result.identifier);
            }
            None => println!("{}\t-", result.identifier),
        }
    }

    Ok(())
}
