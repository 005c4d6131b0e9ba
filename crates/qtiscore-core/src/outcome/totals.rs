//! Derived test totals.
//!
//! Tests that do not author their own totals still report SCORE_TOTAL,
//! SCORE_TOTAL_WEIGHTED and one pair per category found on the item refs.
//! The totals are added as ordinary `setOutcomeValue` rules over
//! `testVariables`, so they run through the same interpreter as authored
//! rules.

use std::collections::{BTreeSet, HashSet};

use crate::model::{AssessmentTest, OutcomeDeclaration};
use crate::node::{normalize_tag, Node};

pub const SCORE: &str = "SCORE";
pub const WEIGHT: &str = "WEIGHT";
pub const SCORE_TOTAL: &str = "SCORE_TOTAL";
pub const SCORE_TOTAL_WEIGHTED: &str = "SCORE_TOTAL_WEIGHTED";

/// One synthesized total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTotal {
    pub identifier: String,
    pub weight: Option<&'static str>,
    pub category: Option<String>,
}

impl DerivedTotal {
    fn node(&self) -> Node {
        let mut variables =
            Node::new("qti-test-variables").with_attr("variable-identifier", SCORE);
        if let Some(weight) = self.weight {
            variables = variables.with_attr("weight-identifier", weight);
        }
        if let Some(category) = &self.category {
            variables = variables.with_attr("include-category", category.as_str());
        }
        Node::new("qti-set-outcome-value")
            .with_attr("identifier", self.identifier.as_str())
            .with_child(variables)
    }
}

/// Every total a test should report, in a stable order: the two overall
/// totals, then a pair per category sorted by name.
pub fn derived_totals(test: &AssessmentTest) -> Vec<DerivedTotal> {
    let categories: BTreeSet<&str> = test
        .item_refs
        .iter()
        .flat_map(|item_ref| item_ref.categories.iter())
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut totals = vec![
        DerivedTotal {
            identifier: SCORE_TOTAL.to_string(),
            weight: None,
            category: None,
        },
        DerivedTotal {
            identifier: SCORE_TOTAL_WEIGHTED.to_string(),
            weight: Some(WEIGHT),
            category: None,
        },
    ];
    for category in categories {
        totals.push(DerivedTotal {
            identifier: format!("{SCORE_TOTAL}_{category}"),
            weight: None,
            category: Some(category.to_string()),
        });
        totals.push(DerivedTotal {
            identifier: format!("{SCORE_TOTAL_WEIGHTED}_{category}"),
            weight: Some(WEIGHT),
            category: Some(category.to_string()),
        });
    }
    totals
}

/// Identifiers already assigned by an authored `setOutcomeValue`.
fn authored_targets(test: &AssessmentTest) -> HashSet<String> {
    test.outcome_processing
        .iter()
        .flat_map(|root| root.descendants())
        .filter(|node| node.tag() == "setoutcomevalue")
        .map(|node| node.identifier().to_string())
        .collect()
}

/// A copy of `test` with rules and declarations for every derived total the
/// test does not author itself.
pub fn with_derived_totals(test: &AssessmentTest) -> AssessmentTest {
    let authored = authored_targets(test);
    let mut prepared = test.clone();
    let root = prepared
        .outcome_processing
        .get_or_insert_with(|| Node::new("qti-outcome-processing"));
    for total in derived_totals(test) {
        if authored.contains(&total.identifier) {
            continue;
        }
        root.children.push(total.node());
        if prepared
            .outcome_declarations
            .iter()
            .all(|d| d.identifier != total.identifier)
        {
            prepared
                .outcome_declarations
                .push(OutcomeDeclaration::float(total.identifier.as_str()));
        }
    }
    prepared
}

/// Whether a tag is the outcome-processing root in either dialect.
pub fn is_outcome_root(tag: &str) -> bool {
    normalize_tag(tag) == "outcomeprocessing"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{item_ref, set_outcome, test as make_test};

    #[test]
    fn totals_per_category() {
        let test = make_test(
            "TST",
            vec![
                item_ref("ITM-1", &["A", "_1F"], &[]),
                item_ref("ITM-2", &["A"], &[]),
                item_ref("ITM-3", &[], &[]),
            ],
        );
        let ids: Vec<String> = derived_totals(&test).into_iter().map(|t| t.identifier).collect();
        assert_eq!(
            ids,
            vec![
                "SCORE_TOTAL",
                "SCORE_TOTAL_WEIGHTED",
                "SCORE_TOTAL_A",
                "SCORE_TOTAL_WEIGHTED_A",
                "SCORE_TOTAL__1F",
                "SCORE_TOTAL_WEIGHTED__1F",
            ]
        );
    }

    #[test]
    fn synthesized_rules_and_declarations() {
        let test = make_test("TST", vec![item_ref("ITM-1", &["A"], &[])]);
        let prepared = with_derived_totals(&test);
        let root = prepared.outcome_processing.as_ref().unwrap();
        assert!(is_outcome_root(&root.name));
        assert_eq!(root.children.len(), 4);
        assert_eq!(prepared.outcome_declarations.len(), 4);

        let weighted_a = &root.children[3];
        assert_eq!(weighted_a.identifier(), "SCORE_TOTAL_WEIGHTED_A");
        let variables = &weighted_a.children[0];
        assert_eq!(variables.attr("weight-identifier"), Some("WEIGHT"));
        assert_eq!(variables.attr("include-category"), Some("A"));
    }

    #[test]
    fn authored_totals_are_left_alone() {
        let mut test = make_test("TST", vec![item_ref("ITM-1", &[], &[])]);
        test.outcome_declarations.push(OutcomeDeclaration::float(SCORE_TOTAL));
        test.outcome_processing = Some(
            Node::new("outcomeProcessing").with_child(Node::new("outcomeCondition").with_child(
                Node::new("outcomeElse").with_child(set_outcome(
                    SCORE_TOTAL,
                    Node::new("baseValue").with_attr("baseType", "float").with_text("42"),
                )),
            )),
        );
        let prepared = with_derived_totals(&test);
        let root = prepared.outcome_processing.as_ref().unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].identifier(), SCORE_TOTAL_WEIGHTED);
        assert_eq!(prepared.outcome_declarations.len(), 2);
    }
}
