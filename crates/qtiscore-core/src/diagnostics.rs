//! Diagnostics sinks.
//!
//! Rule evaluation never fails outright; every resolution failure is
//! reported here and evaluation continues with a default.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Receiver for diagnostics emitted while processing.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, severity: Severity, message: &str);
}

/// Forwards diagnostics to `tracing`.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "qtiscore", "{message}"),
            Severity::Warning => tracing::warn!(target: "qtiscore", "{message}"),
            Severity::Error => tracing::error!(target: "qtiscore", "{message}"),
        }
    }
}

/// Drops every diagnostic.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&self, _: Severity, _: &str) {}
}

/// Collects diagnostics in memory.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of diagnostics at `severity` whose message contains `needle`.
    pub fn count(&self, severity: Severity, needle: &str) -> usize {
        self.entries()
            .iter()
            .filter(|d| d.severity == severity && d.message.contains(needle))
            .count()
    }

    /// Number of diagnostics at `severity`.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.count(severity, "")
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Diagnostic {
                severity,
                message: message.to_string(),
            });
    }
}
