//! The `qtiscore run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use qtiscore_core::config::load_config_from;
use qtiscore_core::engine::ProgressReporter;
use qtiscore_core::model::AssessmentResult;
use qtiscore_core::package::{load_package, load_results};
use qtiscore_core::report::{ScoringReport, Stage};
use qtiscore_core::ScoringEngine;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_result_complete(&self, result: &AssessmentResult) {
        eprintln!(
            "  Done: {} ({} item results)",
            result.identifier,
            result.item_results.len()
        );
    }

    fn on_batch_complete(&self, total: usize, elapsed: Duration) {
        eprintln!("\nComplete: {total} results ({:.1}s)", elapsed.as_secs_f64());
    }
}

pub async fn execute(
    package_path: PathBuf,
    results_path: PathBuf,
    stage: String,
    parallel: bool,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let stage: Stage = stage.parse().map_err(anyhow::Error::msg)?;

    let mut config = load_config_from(config_path.as_deref())?;
    if parallel {
        config.process_parallel = true;
    }

    let package = load_package(&package_path)?;
    let results = load_results(&results_path)?;

    eprintln!(
        "Scoring {} results against {} items ({stage})",
        results.len(),
        package.items.len()
    );

    let mut builder = ScoringEngine::builder().items(package.items).config(config);
    if let Some(test) = package.test {
        builder = builder.test(test);
    }
    let engine = builder.build().context("failed to prepare scoring engine")?;

    let report = engine.run(stage, results, &ConsoleReporter).await?;

    print_summary(&report);

    report.save_json(&output)?;
    eprintln!("Report saved to: {}", output.display());

    Ok(())
}

fn print_summary(report: &ScoringReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Result", "Outcome", "Value"]);

    for row in report.summary() {
        if row.outcomes.is_empty() {
            table.add_row(vec![Cell::new(&row.result), Cell::new("-"), Cell::new("-")]);
            continue;
        }
        for (identifier, value) in &row.outcomes {
            table.add_row(vec![
                Cell::new(&row.result),
                Cell::new(identifier),
                Cell::new(value),
            ]);
        }
    }

    println!("{table}");
}
