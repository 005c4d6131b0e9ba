//! Assessment documents and result structures.
//!
//! Declarations, item refs and processing trees are read-only during
//! evaluation. Item and test results are the only structures the engine
//! mutates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::value::{BaseType, BaseValue, Cardinality};

/// Static metadata for an outcome variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDeclaration {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl OutcomeDeclaration {
    /// A single float outcome defaulting to zero, the shape of every derived
    /// test total.
    pub fn float(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            base_type: BaseType::Float,
            cardinality: Cardinality::Single,
            default_value: Some("0".to_string()),
        }
    }

    /// A fresh variable holding the declared default.
    pub fn to_variable(&self) -> Variable {
        Variable {
            identifier: self.identifier.clone(),
            base_type: self.base_type,
            cardinality: self.cardinality,
            value: self.default_value.clone(),
            values: Vec::new(),
        }
    }
}

/// Static metadata for a response variable, including its correct response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDeclaration {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Correct response for single cardinality.
    #[serde(default)]
    pub correct_response: Option<String>,
    /// Correct responses for multiple/ordered cardinality.
    #[serde(default)]
    pub correct_responses: Vec<String>,
}

/// A runtime variable binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

pub type OutcomeVariable = Variable;
pub type ResponseVariable = Variable;

impl Variable {
    pub fn single(identifier: impl Into<String>, base_type: BaseType, value: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            base_type,
            cardinality: Cardinality::Single,
            value: Some(value.into()),
            values: Vec::new(),
        }
    }

    pub fn list(
        identifier: impl Into<String>,
        base_type: BaseType,
        cardinality: Cardinality,
        values: Vec<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            base_type,
            cardinality,
            value: None,
            values,
        }
    }

    /// Copy this variable into a transient value. Single cardinality copies
    /// `value`; containers leave `value` empty and copy `values`.
    pub fn to_base_value(&self) -> BaseValue {
        match self.cardinality {
            Cardinality::Single => BaseValue {
                base_type: self.base_type,
                cardinality: Cardinality::Single,
                value: Some(self.value.clone().unwrap_or_default()),
                values: None,
                identifier: Some(self.identifier.clone()),
            },
            Cardinality::Multiple | Cardinality::Ordered => BaseValue {
                base_type: self.base_type,
                cardinality: self.cardinality,
                value: None,
                values: Some(self.values.clone()),
                identifier: Some(self.identifier.clone()),
            },
        }
    }

    /// Store a value according to this variable's cardinality.
    pub fn assign(&mut self, value: &BaseValue) {
        match self.cardinality {
            Cardinality::Single => {
                let scalar = value
                    .value
                    .clone()
                    .or_else(|| value.values.as_ref().and_then(|v| v.first().cloned()))
                    .unwrap_or_default();
                self.value = Some(scalar);
                self.values.clear();
            }
            Cardinality::Multiple | Cardinality::Ordered => {
                self.values = match (&value.values, &value.value) {
                    (Some(values), _) => values.clone(),
                    (None, Some(v)) if !v.is_empty() => vec![v.clone()],
                    _ => Vec::new(),
                };
                self.value = None;
            }
        }
    }
}

fn find<'a>(variables: &'a [Variable], identifier: &str) -> Option<&'a Variable> {
    variables.iter().find(|v| v.identifier == identifier)
}

fn upsert<'a>(variables: &'a mut Vec<Variable>, declaration: &OutcomeDeclaration) -> &'a mut Variable {
    match variables
        .iter()
        .position(|v| v.identifier == declaration.identifier)
    {
        Some(index) => &mut variables[index],
        None => {
            variables.push(declaration.to_variable());
            let last = variables.len() - 1;
            &mut variables[last]
        }
    }
}

/// Variables recorded for one item within one assessment result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemResult {
    pub identifier: String,
    #[serde(default)]
    pub response_variables: Vec<ResponseVariable>,
    #[serde(default)]
    pub outcome_variables: Vec<OutcomeVariable>,
}

impl ItemResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn response(&self, identifier: &str) -> Option<&ResponseVariable> {
        find(&self.response_variables, identifier)
    }

    pub fn outcome(&self, identifier: &str) -> Option<&OutcomeVariable> {
        find(&self.outcome_variables, identifier)
    }

    /// The outcome variable for a declaration, created from its default when
    /// missing.
    pub fn outcome_mut(&mut self, declaration: &OutcomeDeclaration) -> &mut OutcomeVariable {
        upsert(&mut self.outcome_variables, declaration)
    }
}

/// Test-level outcome variables within one assessment result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestResult {
    pub identifier: String,
    #[serde(default)]
    pub outcome_variables: Vec<OutcomeVariable>,
}

impl TestResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            outcome_variables: Vec::new(),
        }
    }

    pub fn outcome(&self, identifier: &str) -> Option<&OutcomeVariable> {
        find(&self.outcome_variables, identifier)
    }

    pub fn outcome_mut(&mut self, declaration: &OutcomeDeclaration) -> &mut OutcomeVariable {
        upsert(&mut self.outcome_variables, declaration)
    }
}

/// A candidate's results for one test session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub identifier: String,
    #[serde(default)]
    pub item_results: Vec<ItemResult>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl AssessmentResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn item_result(&self, identifier: &str) -> Option<&ItemResult> {
        self.item_results.iter().find(|r| r.identifier == identifier)
    }

    pub fn test_result(&self, identifier: &str) -> Option<&TestResult> {
        self.test_results.iter().find(|r| r.identifier == identifier)
    }

    /// Convenience accessor for a test outcome's scalar value.
    pub fn test_outcome_value(&self, test: &str, outcome: &str) -> Option<&str> {
        self.test_result(test)?.outcome(outcome)?.value.as_deref()
    }

    /// Convenience accessor for an item outcome's scalar value.
    pub fn item_outcome_value(&self, item: &str, outcome: &str) -> Option<&str> {
        self.item_result(item)?.outcome(outcome)?.value.as_deref()
    }
}

/// An item definition: declarations plus its response-processing tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentItem {
    pub identifier: String,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    #[serde(default)]
    pub response_declarations: Vec<ResponseDeclaration>,
    #[serde(default)]
    pub response_processing: Option<Node>,
}

impl AssessmentItem {
    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    pub fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.response_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }
}

/// A test's reference to an item, carrying its categories and weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentItemRef {
    pub identifier: String,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

/// A test definition: item refs, test-level declarations and the
/// outcome-processing tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssessmentTest {
    pub identifier: String,
    #[serde(default)]
    pub item_refs: Vec<AssessmentItemRef>,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    #[serde(default)]
    pub outcome_processing: Option<Node>,
}

impl AssessmentTest {
    pub fn item_ref(&self, identifier: &str) -> Option<&AssessmentItemRef> {
        self.item_refs.iter().find(|r| r.identifier == identifier)
    }

    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }
}
