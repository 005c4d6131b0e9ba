//! Evaluation contexts.
//!
//! A context borrows the read-only inputs of one evaluation (declarations,
//! item refs, registry, configuration) and exclusively borrows the one result
//! structure that evaluation writes. Two results never share a context, so
//! batches can run in parallel without locks.

use std::collections::HashMap;
use std::fmt::Display;

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticsSink, Severity};
use crate::model::{
    AssessmentItem, AssessmentTest, ItemResult, OutcomeDeclaration, OutcomeVariable, TestResult,
};
use crate::node::Node;
use crate::registry::Registry;
use crate::value::{BaseValue, Cardinality};

/// The surface rule handlers evaluate against.
pub trait ProcessingContext {
    fn registry(&self) -> &Registry;

    fn config(&self) -> &EngineConfig;

    fn sink(&self) -> &dyn DiagnosticsSink;

    /// `"{scope} - {result}"`, prefixed to every diagnostic.
    fn label(&self) -> &str;

    fn log_error(&self, message: impl Display) {
        self.sink()
            .record(Severity::Error, &format!("{}: {message}", self.label()));
    }

    fn log_warning(&self, message: impl Display) {
        self.sink()
            .record(Severity::Warning, &format!("{}: {message}", self.label()));
    }

    fn log_info(&self, message: impl Display) {
        self.sink()
            .record(Severity::Info, &format!("{}: {message}", self.label()));
    }

    /// Value of a `variable` node. Unresolvable identifiers log an error and
    /// yield a zero float.
    fn resolve_variable(&self, node: &Node) -> BaseValue;

    /// Value of a `correct` node, or nothing when it cannot be resolved.
    fn resolve_correct(&self, node: &Node) -> Option<BaseValue>;

    /// Value of a `testVariables` node, or nothing when it cannot be resolved.
    fn resolve_test_variables(&self, node: &Node) -> Option<BaseValue>;

    /// Declaration of an outcome this context may write.
    fn outcome_declaration(&self, identifier: &str) -> Option<OutcomeDeclaration>;

    /// Write an outcome, creating the variable from its declaration if needed.
    fn store_outcome(&mut self, declaration: &OutcomeDeclaration, value: &BaseValue);
}

/// Builds the `"{scope} - {result}"` label.
pub fn label(scope: &str, result: &str) -> String {
    format!("{scope} - {result}")
}

fn unresolved(identifier: &str) -> BaseValue {
    BaseValue::float(0.0).with_identifier(identifier)
}

// ---------------------------------------------------------------------------
// Response processing
// ---------------------------------------------------------------------------

/// Context for one item's response processing within one assessment result.
pub struct ResponseContext<'a> {
    item: &'a AssessmentItem,
    result: &'a mut ItemResult,
    registry: &'a Registry,
    config: &'a EngineConfig,
    sink: &'a dyn DiagnosticsSink,
    label: String,
}

impl<'a> ResponseContext<'a> {
    pub fn new(
        item: &'a AssessmentItem,
        result: &'a mut ItemResult,
        registry: &'a Registry,
        config: &'a EngineConfig,
        sink: &'a dyn DiagnosticsSink,
        label: String,
    ) -> Self {
        Self {
            item,
            result,
            registry,
            config,
            sink,
            label,
        }
    }
}

impl ProcessingContext for ResponseContext<'_> {
    fn registry(&self) -> &Registry {
        self.registry
    }

    fn config(&self) -> &EngineConfig {
        self.config
    }

    fn sink(&self) -> &dyn DiagnosticsSink {
        self.sink
    }

    fn label(&self) -> &str {
        &self.label
    }

    // Lookup order: recorded response (shaped by its declaration), recorded
    // outcome, declared outcome default, declared response with no record.
    fn resolve_variable(&self, node: &Node) -> BaseValue {
        let identifier = node.identifier();
        if identifier.is_empty() {
            self.log_error("Cannot find attribute identifier on variable");
            return unresolved(identifier);
        }

        let declaration = self.item.response_declaration(identifier);
        if let Some(variable) = self.result.response(identifier) {
            let mut shaped = variable.clone();
            if let Some(declaration) = declaration {
                shaped.base_type = declaration.base_type;
                if shaped.cardinality != declaration.cardinality {
                    let recorded = shaped.to_base_value();
                    shaped.cardinality = declaration.cardinality;
                    shaped.assign(&recorded);
                }
            }
            return shaped.to_base_value();
        }
        if let Some(variable) = self.result.outcome(identifier) {
            return variable.to_base_value();
        }
        if let Some(declaration) = self.item.outcome_declaration(identifier) {
            return declaration.to_variable().to_base_value();
        }
        if let Some(declaration) = declaration {
            let empty = OutcomeVariable {
                identifier: identifier.to_string(),
                base_type: declaration.base_type,
                cardinality: declaration.cardinality,
                value: None,
                values: Vec::new(),
            };
            return empty.to_base_value();
        }

        self.log_error(format!("Cannot find variable: {identifier}"));
        unresolved(identifier)
    }

    fn resolve_correct(&self, node: &Node) -> Option<BaseValue> {
        let identifier = node.identifier();
        let Some(declaration) = self.item.response_declaration(identifier) else {
            self.log_error(format!("Cannot find responseDeclaration: {identifier}"));
            return None;
        };
        let value = match declaration.cardinality {
            Cardinality::Single => {
                let correct = declaration
                    .correct_response
                    .clone()
                    .or_else(|| declaration.correct_responses.first().cloned());
                let Some(correct) = correct else {
                    self.log_error(format!("No correct response declared for: {identifier}"));
                    return None;
                };
                BaseValue::scalar(declaration.base_type, correct)
            }
            cardinality => {
                let mut correct = declaration.correct_responses.clone();
                if correct.is_empty() {
                    correct.extend(declaration.correct_response.clone());
                }
                BaseValue::list(declaration.base_type, correct).with_cardinality(cardinality)
            }
        };
        Some(value.with_identifier(identifier))
    }

    fn resolve_test_variables(&self, node: &Node) -> Option<BaseValue> {
        self.log_error(format!(
            "{} is only available in outcome processing",
            node.name
        ));
        None
    }

    fn outcome_declaration(&self, identifier: &str) -> Option<OutcomeDeclaration> {
        self.item.outcome_declaration(identifier).cloned()
    }

    fn store_outcome(&mut self, declaration: &OutcomeDeclaration, value: &BaseValue) {
        self.result.outcome_mut(declaration).assign(value);
    }
}

// ---------------------------------------------------------------------------
// Outcome processing
// ---------------------------------------------------------------------------

/// Context for a test's outcome processing within one assessment result.
pub struct OutcomeContext<'a> {
    test: &'a AssessmentTest,
    result: &'a mut TestResult,
    /// Every recorded item outcome, keyed `{item}.{outcome}`.
    outcomes: HashMap<String, &'a OutcomeVariable>,
    registry: &'a Registry,
    config: &'a EngineConfig,
    sink: &'a dyn DiagnosticsSink,
    label: String,
}

impl<'a> OutcomeContext<'a> {
    pub fn new(
        test: &'a AssessmentTest,
        item_results: &'a [ItemResult],
        result: &'a mut TestResult,
        registry: &'a Registry,
        config: &'a EngineConfig,
        sink: &'a dyn DiagnosticsSink,
        label: String,
    ) -> Self {
        let outcomes = item_results
            .iter()
            .flat_map(|item| {
                item.outcome_variables.iter().map(move |variable| {
                    (format!("{}.{}", item.identifier, variable.identifier), variable)
                })
            })
            .collect();
        Self {
            test,
            result,
            outcomes,
            registry,
            config,
            sink,
            label,
        }
    }

    /// An item outcome, optionally multiplied by one of the item ref's
    /// weights.
    ///
    /// A missing item ref or outcome is an error. A weight identifier the
    /// item ref does not declare is a warning, and the unweighted value is
    /// returned.
    pub fn resolve_item_outcome(
        &self,
        item: &str,
        outcome: &str,
        weight: Option<&str>,
    ) -> Option<BaseValue> {
        self.lookup_item_outcome(item, outcome, weight, Severity::Error)
    }

    fn lookup_item_outcome(
        &self,
        item: &str,
        outcome: &str,
        weight: Option<&str>,
        missing: Severity,
    ) -> Option<BaseValue> {
        let Some(item_ref) = self.test.item_ref(item) else {
            self.log_error(format!("Cannot find assessmentItemRef: {item}"));
            return None;
        };
        let key = format!("{item}.{outcome}");
        let Some(variable) = self.outcomes.get(&key) else {
            let message = format!("Cannot find assessmentItemRef outcomeVariable: {key}");
            match missing {
                Severity::Error => self.log_error(message),
                Severity::Warning => self.log_warning(message),
                Severity::Info => self.log_info(message),
            }
            return None;
        };
        let value = variable.to_base_value().with_identifier(key.as_str());

        let Some(weight) = weight else {
            return Some(value);
        };
        let Some(factor) = item_ref.weights.get(weight) else {
            self.log_warning(format!(
                "Cannot find weight with identifier: {weight} from item: {key}"
            ));
            return Some(value);
        };
        match value.as_number() {
            Ok(number) => Some(BaseValue::float(number * factor).with_identifier(key)),
            Err(err) => {
                self.log_warning(format!("Cannot apply weight {weight} to {key}: {err}"));
                Some(value)
            }
        }
    }
}

impl ProcessingContext for OutcomeContext<'_> {
    fn registry(&self) -> &Registry {
        self.registry
    }

    fn config(&self) -> &EngineConfig {
        self.config
    }

    fn sink(&self) -> &dyn DiagnosticsSink {
        self.sink
    }

    fn label(&self) -> &str {
        &self.label
    }

    // Test outcomes shadow item outcomes; `ITEM.OUTCOME` addresses an item
    // outcome, split on the last dot since item identifiers may contain dots.
    fn resolve_variable(&self, node: &Node) -> BaseValue {
        let identifier = node.identifier();
        if identifier.is_empty() {
            self.log_error("Cannot find attribute identifier on variable");
            return unresolved(identifier);
        }
        if let Some(variable) = self.result.outcome(identifier) {
            return variable.to_base_value();
        }
        if let Some(declaration) = self.test.outcome_declaration(identifier) {
            return declaration.to_variable().to_base_value();
        }
        if let Some((item, outcome)) = identifier.rsplit_once('.') {
            let weight = node.non_empty_attr("weightIdentifier");
            return self
                .resolve_item_outcome(item, outcome, weight)
                .unwrap_or_else(|| unresolved(identifier));
        }
        self.log_error(format!("Cannot find variable: {identifier}"));
        unresolved(identifier)
    }

    fn resolve_correct(&self, node: &Node) -> Option<BaseValue> {
        self.log_error(format!(
            "{} is only available in response processing",
            node.name
        ));
        None
    }

    // Only the first include-category entry decides whether a ref is kept.
    fn resolve_test_variables(&self, node: &Node) -> Option<BaseValue> {
        let Some(outcome) = node.non_empty_attr("variableIdentifier") else {
            self.log_error("Cannot find attribute variable-identifier on testVariables");
            return None;
        };
        let weight = node.non_empty_attr("weightIdentifier");
        let include: Vec<&str> = node
            .attr("includeCategory")
            .map(|v| v.split_whitespace().collect())
            .unwrap_or_default();
        let exclude: Vec<&str> = node
            .attr("excludeCategory")
            .map(|v| v.split_whitespace().collect())
            .unwrap_or_default();

        let mut total = 0.0;
        for item_ref in &self.test.item_refs {
            if exclude.iter().any(|c| item_ref.categories.contains(*c)) {
                continue;
            }
            if let Some(first) = include.first() {
                if !item_ref.categories.contains(*first) {
                    continue;
                }
            }
            let Some(value) =
                self.lookup_item_outcome(&item_ref.identifier, outcome, weight, Severity::Warning)
            else {
                continue;
            };
            match value.as_number() {
                Ok(number) => total += number,
                Err(err) => tracing::debug!("skipping {}: {err}", item_ref.identifier),
            }
        }
        Some(BaseValue::float(total).with_identifier(outcome))
    }

    fn outcome_declaration(&self, identifier: &str) -> Option<OutcomeDeclaration> {
        self.test.outcome_declaration(identifier).cloned()
    }

    fn store_outcome(&mut self, declaration: &OutcomeDeclaration, value: &BaseValue) {
        self.result.outcome_mut(declaration).assign(value);
    }
}
