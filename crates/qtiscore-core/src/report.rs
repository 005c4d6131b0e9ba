//! Scoring report with JSON persistence.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::AssessmentResult;

/// Which processing passes a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Responses,
    Outcomes,
    All,
}

impl Stage {
    pub fn includes_responses(self) -> bool {
        matches!(self, Stage::Responses | Stage::All)
    }

    pub fn includes_outcomes(self) -> bool {
        matches!(self, Stage::Outcomes | Stage::All)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Responses => write!(f, "responses"),
            Stage::Outcomes => write!(f, "outcomes"),
            Stage::All => write!(f, "all"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "responses" | "response" => Ok(Stage::Responses),
            "outcomes" | "outcome" => Ok(Stage::Outcomes),
            "all" => Ok(Stage::All),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// A complete scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Passes that were run.
    pub stage: Stage,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// The processed assessment results.
    pub results: Vec<AssessmentResult>,
}

/// One row of a report summary: a result's test outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub result: String,
    pub outcomes: Vec<(String, String)>,
}

impl ScoringReport {
    pub fn new(stage: Stage, duration_ms: u64, results: Vec<AssessmentResult>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            stage,
            duration_ms,
            results,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ScoringReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Test outcomes per result, sorted by result identifier then outcome.
    pub fn summary(&self) -> Vec<ResultSummary> {
        let mut rows: Vec<ResultSummary> = self
            .results
            .iter()
            .map(|result| {
                let mut outcomes: Vec<(String, String)> = result
                    .test_results
                    .iter()
                    .flat_map(|t| t.outcome_variables.iter())
                    .map(|v| {
                        let value = match &v.value {
                            Some(value) => value.clone(),
                            None => v.values.join(" "),
                        };
                        (v.identifier.clone(), value)
                    })
                    .collect();
                outcomes.sort();
                ResultSummary {
                    result: result.identifier.clone(),
                    outcomes,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.result.cmp(&b.result));
        rows
    }
}
