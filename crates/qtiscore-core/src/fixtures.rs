//! Builders shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    AssessmentItem, AssessmentItemRef, AssessmentResult, AssessmentTest, ItemResult,
    OutcomeDeclaration, ResponseDeclaration, Variable,
};
use crate::node::Node;
use crate::value::{BaseType, Cardinality};

pub fn item_result(identifier: &str, outcomes: &[(&str, &str)]) -> ItemResult {
    let mut result = ItemResult::new(identifier);
    result.outcome_variables = outcomes
        .iter()
        .map(|(id, value)| Variable::single(*id, BaseType::Float, *value))
        .collect();
    result
}

pub fn answered(identifier: &str, response: &str) -> ItemResult {
    let mut result = ItemResult::new(identifier);
    result
        .response_variables
        .push(Variable::single("RESPONSE", BaseType::Identifier, response));
    result
}

pub fn var(identifier: &str) -> Node {
    Node::new("qti-variable").with_attr("identifier", identifier)
}

pub fn base(base_type: &str, text: &str) -> Node {
    Node::new("qti-base-value")
        .with_attr("base-type", base_type)
        .with_text(text)
}

pub fn correct(identifier: &str) -> Node {
    Node::new("qti-correct").with_attr("identifier", identifier)
}

pub fn op(tag: &str, operands: Vec<Node>) -> Node {
    Node::new(tag).with_children(operands)
}

pub fn set_outcome(identifier: &str, value: Node) -> Node {
    Node::new("qti-set-outcome-value")
        .with_attr("identifier", identifier)
        .with_child(value)
}

pub fn response_if(condition: Node, body: Vec<Node>) -> Node {
    Node::new("qti-response-if")
        .with_child(condition)
        .with_children(body)
}

pub fn response_else_if(condition: Node, body: Vec<Node>) -> Node {
    Node::new("qti-response-else-if")
        .with_child(condition)
        .with_children(body)
}

pub fn response_else(body: Vec<Node>) -> Node {
    Node::new("qti-response-else").with_children(body)
}

pub fn response_condition(branches: Vec<Node>) -> Node {
    Node::new("qti-response-condition").with_children(branches)
}

pub fn response_processing(statements: Vec<Node>) -> Node {
    Node::new("qti-response-processing").with_children(statements)
}

/// A choice item scoring 1 when RESPONSE matches the correct answer and 0
/// otherwise, with MAXSCORE 1.
pub fn choice_item(identifier: &str, correct_answer: &str) -> AssessmentItem {
    AssessmentItem {
        identifier: identifier.to_string(),
        outcome_declarations: vec![
            OutcomeDeclaration::float("SCORE"),
            OutcomeDeclaration {
                default_value: Some("1".into()),
                ..OutcomeDeclaration::float("MAXSCORE")
            },
        ],
        response_declarations: vec![ResponseDeclaration {
            identifier: "RESPONSE".into(),
            base_type: BaseType::Identifier,
            cardinality: Cardinality::Single,
            correct_response: Some(correct_answer.to_string()),
            correct_responses: Vec::new(),
        }],
        response_processing: Some(response_processing(vec![response_condition(vec![
            response_if(
                op("qti-match", vec![var("RESPONSE"), correct("RESPONSE")]),
                vec![set_outcome("SCORE", base("float", "1"))],
            ),
            response_else(vec![set_outcome("SCORE", base("float", "0"))]),
        ])])),
    }
}

pub fn item_ref(identifier: &str, categories: &[&str], weights: &[(&str, f64)]) -> AssessmentItemRef {
    AssessmentItemRef {
        identifier: identifier.to_string(),
        categories: categories.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>(),
        weights: weights
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn test(identifier: &str, item_refs: Vec<AssessmentItemRef>) -> AssessmentTest {
    AssessmentTest {
        identifier: identifier.to_string(),
        item_refs,
        outcome_declarations: Vec::new(),
        outcome_processing: None,
    }
}

pub fn assessment_result(identifier: &str, item_results: Vec<ItemResult>) -> AssessmentResult {
    AssessmentResult {
        identifier: identifier.to_string(),
        item_results,
        test_results: Vec::new(),
    }
}
