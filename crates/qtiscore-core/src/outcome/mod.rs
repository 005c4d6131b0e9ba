//! Outcome aggregator.
//!
//! Runs a test's outcome processing once per assessment result, after all
//! item results exist, and writes the test result.

pub mod totals;

use crate::config::EngineConfig;
use crate::context::{label, OutcomeContext};
use crate::diagnostics::DiagnosticsSink;
use crate::model::{AssessmentResult, AssessmentTest, TestResult};
use crate::registry::Registry;
use crate::response::run_processing;

pub use totals::{derived_totals, with_derived_totals, DerivedTotal};

/// Run the test's outcome processing against one assessment result.
///
/// The test result is created when missing, and every declared test
/// outcome exists afterwards, holding its default unless a rule wrote it.
pub fn process_test(
    test: &AssessmentTest,
    result: &mut AssessmentResult,
    registry: &Registry,
    config: &EngineConfig,
    sink: &dyn DiagnosticsSink,
) {
    let index = match result
        .test_results
        .iter()
        .position(|r| r.identifier == test.identifier)
    {
        Some(index) => index,
        None => {
            result.test_results.push(TestResult::new(test.identifier.as_str()));
            result.test_results.len() - 1
        }
    };

    let AssessmentResult {
        identifier,
        item_results,
        test_results,
    } = result;
    let test_result = &mut test_results[index];
    for declaration in &test.outcome_declarations {
        test_result.outcome_mut(declaration);
    }

    let Some(root) = test.outcome_processing.as_ref() else {
        return;
    };
    let mut ctx = OutcomeContext::new(
        test,
        item_results,
        test_result,
        registry,
        config,
        sink,
        label(&test.identifier, identifier),
    );
    run_processing(root, &mut ctx);
}
