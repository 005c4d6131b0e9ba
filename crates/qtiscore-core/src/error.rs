//! Error types for the scoring engine.
//!
//! Only configuration-level failures are surfaced as errors to the caller.
//! Everything that goes wrong while evaluating a rule tree is reported to the
//! diagnostics sink and replaced by a safe default instead.

use thiserror::Error;

/// Errors that abort a whole batch before (or instead of) processing it.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Outcome processing was requested but no assessment test was supplied.
    #[error("assessment test is required for outcome processing")]
    MissingAssessmentTest,

    /// Response processing was requested but no assessment items were supplied.
    #[error("assessment items are required for response processing")]
    MissingAssessmentItems,

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two items share the same identifier.
    #[error("duplicate assessment item identifier: {0}")]
    DuplicateItem(String),

    /// A parallel worker panicked or was cancelled.
    #[error("scoring worker failed: {0}")]
    Worker(String),
}

/// Typed failures at the value boundary.
///
/// These never leave a rule evaluation: the caller logs them and substitutes
/// a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The string is not a number in the invariant format.
    #[error("value '{0}' could not be parsed as a number")]
    NotNumeric(String),

    /// The string is not `true` or `false`.
    #[error("value '{0}' could not be parsed as a boolean")]
    NotBoolean(String),

    /// A scalar was needed but the value is empty or a container.
    #[error("value '{0}' has no single value")]
    NotScalar(String),
}

impl ScoringError {
    /// Returns `true` if the error comes from the caller's configuration
    /// rather than from running the batch.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ScoringError::Worker(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_short() {
        assert_eq!(
            ScoringError::MissingAssessmentTest.to_string(),
            "assessment test is required for outcome processing"
        );
        assert_eq!(
            ValueError::NotNumeric("1,5".into()).to_string(),
            "value '1,5' could not be parsed as a number"
        );
    }

    #[test]
    fn worker_failures_are_not_configuration() {
        assert!(ScoringError::DuplicateItem("ITM-1".into()).is_configuration());
        assert!(!ScoringError::Worker("panicked".into()).is_configuration());
    }
}
