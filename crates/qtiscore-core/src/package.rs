//! Scoring package loading and validation.
//!
//! A package bundles an optional test and its items. It is either one JSON
//! file (`{"test": ..., "items": [...]}`) or a directory holding `test.json`
//! and one JSON file per item under `items/`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{AssessmentItem, AssessmentResult, AssessmentTest, OutcomeDeclaration};
use crate::node::Node;
use crate::outcome::totals::is_outcome_root;
use crate::registry::{ExecutorKind, ExpressionKind, Handler, Registry};

/// The inputs of a scoring run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringPackage {
    #[serde(default)]
    pub test: Option<AssessmentTest>,
    #[serde(default)]
    pub items: Vec<AssessmentItem>,
}

/// Load a package from a JSON file or a package directory.
pub fn load_package(path: &Path) -> Result<ScoringPackage> {
    if path.is_dir() {
        return load_package_dir(path);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read package: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse package JSON: {}", path.display()))
}

fn load_package_dir(dir: &Path) -> Result<ScoringPackage> {
    let test_path = dir.join("test.json");
    let test = if test_path.exists() {
        let content = std::fs::read_to_string(&test_path)
            .with_context(|| format!("failed to read test: {}", test_path.display()))?;
        let test: AssessmentTest = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse test JSON: {}", test_path.display()))?;
        Some(test)
    } else {
        None
    };

    let mut items = Vec::new();
    let items_dir = dir.join("items");
    if items_dir.is_dir() {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&items_dir)
            .with_context(|| format!("failed to read directory: {}", items_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read item: {}", path.display()))?;
            let item: AssessmentItem = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse item JSON: {}", path.display()))?;
            items.push(item);
        }
    }

    tracing::debug!(
        "loaded package from {} ({} items, test: {})",
        dir.display(),
        items.len(),
        test.is_some()
    );
    Ok(ScoringPackage { test, items })
}

/// Load assessment results from a JSON array.
pub fn load_results(path: &Path) -> Result<Vec<AssessmentResult>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse results JSON: {}", path.display()))
}

/// Write assessment results as a JSON array.
pub fn save_results(path: &Path, results: &[AssessmentResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results).context("failed to serialize results")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write results to {}", path.display()))?;
    Ok(())
}

/// A validation warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The item or test identifier (if applicable).
    pub scope: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(scope: &str, message: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a package for problems that would only show up as diagnostics
/// at scoring time.
pub fn validate_package(package: &ScoringPackage, registry: &Registry) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for item in &package.items {
        if !seen_ids.insert(item.identifier.as_str()) {
            warnings.push(ValidationWarning::new(
                &item.identifier,
                format!("duplicate item identifier: {}", item.identifier),
            ));
        }
    }

    for item in &package.items {
        match &item.response_processing {
            Some(root) => check_tree(
                &item.identifier,
                root,
                &item.outcome_declarations,
                registry,
                &mut warnings,
            ),
            None => warnings.push(ValidationWarning::new(
                &item.identifier,
                "item has no response processing",
            )),
        }
    }

    if let Some(test) = &package.test {
        for item_ref in &test.item_refs {
            if !seen_ids.contains(item_ref.identifier.as_str()) {
                warnings.push(ValidationWarning::new(
                    &test.identifier,
                    format!("item ref {} has no matching item", item_ref.identifier),
                ));
            }
        }
        if let Some(root) = &test.outcome_processing {
            if !is_outcome_root(&root.name) {
                warnings.push(ValidationWarning::new(
                    &test.identifier,
                    format!("outcome processing root is {}", root.name),
                ));
            }
            check_tree(
                &test.identifier,
                root,
                &test.outcome_declarations,
                registry,
                &mut warnings,
            );
        }
    }

    warnings
}

fn check_tree(
    scope: &str,
    root: &Node,
    declarations: &[OutcomeDeclaration],
    registry: &Registry,
    warnings: &mut Vec<ValidationWarning>,
) {
    // The root's own tag is structural; validate what is below it.
    for node in root.children.iter().flat_map(|child| child.descendants()) {
        match registry.classify(node) {
            Handler::Unknown(tag) => {
                warnings.push(ValidationWarning::new(scope, format!("unsupported tag: {tag}")));
            }
            Handler::Expression(ExpressionKind::CustomOperator) => {
                let class = node
                    .non_empty_attr("class")
                    .or_else(|| node.non_empty_attr("definition"))
                    .unwrap_or_default();
                if registry.custom_operator(class).is_none() {
                    warnings.push(ValidationWarning::new(
                        scope,
                        format!("custom operator is not registered: {class}"),
                    ));
                }
            }
            Handler::Executor(ExecutorKind::SetOutcomeValue) => {
                let target = node.identifier();
                if !declarations.iter().any(|d| d.identifier == target) {
                    warnings.push(ValidationWarning::new(
                        scope,
                        format!("setOutcomeValue target has no declaration: {target}"),
                    ));
                }
            }
            _ => {}
        }
    }
}
