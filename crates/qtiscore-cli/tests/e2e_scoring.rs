//! End-to-end scoring tests through the public engine API.
//!
//! These build items and tests in code, score batches of results and check
//! the item outcomes, the derived test totals and the diagnostics emitted
//! along the way.

use std::sync::Arc;

use qtiscore_core::config::EngineConfig;
use qtiscore_core::custom_operators::CustomOperator;
use qtiscore_core::diagnostics::{MemorySink, Severity};
use qtiscore_core::model::{
    AssessmentItem, AssessmentItemRef, AssessmentResult, AssessmentTest, ItemResult,
    OutcomeDeclaration, ResponseDeclaration, Variable,
};
use qtiscore_core::node::Node;
use qtiscore_core::value::{BaseType, BaseValue, Cardinality};
use qtiscore_core::{ScoringEngine, ScoringError};

fn set_score(value: &str) -> Node {
    Node::new("qti-set-outcome-value")
        .with_attr("identifier", "SCORE")
        .with_child(
            Node::new("qti-base-value")
                .with_attr("base-type", "float")
                .with_text(value),
        )
}

fn scored_item(identifier: &str, condition: Node) -> AssessmentItem {
    AssessmentItem {
        identifier: identifier.into(),
        outcome_declarations: vec![OutcomeDeclaration::float("SCORE")],
        response_declarations: vec![ResponseDeclaration {
            identifier: "RESPONSE".into(),
            base_type: BaseType::Identifier,
            cardinality: Cardinality::Single,
            correct_response: Some("A".into()),
            correct_responses: Vec::new(),
        }],
        response_processing: Some(
            Node::new("qti-response-processing").with_child(
                Node::new("qti-response-condition")
                    .with_child(
                        Node::new("qti-response-if")
                            .with_child(condition)
                            .with_child(set_score("1")),
                    )
                    .with_child(Node::new("qti-response-else").with_child(set_score("0"))),
            ),
        ),
    }
}

fn choice_item(identifier: &str) -> AssessmentItem {
    scored_item(
        identifier,
        Node::new("qti-match")
            .with_child(Node::new("qti-variable").with_attr("identifier", "RESPONSE"))
            .with_child(Node::new("qti-correct").with_attr("identifier", "RESPONSE")),
    )
}

fn item_ref(identifier: &str, category: &str, weight: Option<f64>) -> AssessmentItemRef {
    AssessmentItemRef {
        identifier: identifier.into(),
        categories: [category.to_string()].into(),
        weights: weight
            .map(|w| [("WEIGHT".to_string(), w)].into())
            .unwrap_or_default(),
    }
}

fn answered(item: &str, response: &str) -> ItemResult {
    let mut result = ItemResult::new(item);
    result
        .response_variables
        .push(Variable::single("RESPONSE", BaseType::Identifier, response));
    result
}

fn result(id: &str, items: Vec<ItemResult>) -> AssessmentResult {
    AssessmentResult {
        identifier: id.into(),
        item_results: items,
        test_results: Vec::new(),
    }
}

fn test_of(refs: Vec<AssessmentItemRef>) -> AssessmentTest {
    AssessmentTest {
        identifier: "TST".into(),
        item_refs: refs,
        outcome_declarations: Vec::new(),
        outcome_processing: None,
    }
}

/// Upper-cases its single operand.
struct Upper;

impl CustomOperator for Upper {
    fn definition(&self) -> &str {
        "acme:Upper"
    }

    fn apply(&self, values: Vec<BaseValue>) -> BaseValue {
        let text = values
            .first()
            .and_then(|v| v.as_scalar())
            .unwrap_or_default()
            .to_uppercase();
        BaseValue::string(text)
    }
}

#[tokio::test]
async fn weighted_totals_per_category() {
    let sink = Arc::new(MemorySink::new());
    let engine = ScoringEngine::builder()
        .items([choice_item("ITM-1"), choice_item("ITM-2"), choice_item("ITM-3")])
        .test(test_of(vec![
            item_ref("ITM-1", "_1F", Some(3.0)),
            item_ref("ITM-2", "_1F", Some(0.5)),
            item_ref("ITM-3", "_2F", Some(2.0)),
        ]))
        .sink(sink.clone())
        .build()
        .unwrap();

    let scored = engine
        .process_responses_and_outcomes(vec![result(
            "R1",
            vec![
                answered("ITM-1", "A"),
                answered("ITM-2", "A"),
                answered("ITM-3", "B"),
            ],
        )])
        .await
        .unwrap();

    let r = &scored[0];
    assert_eq!(r.item_outcome_value("ITM-3", "SCORE"), Some("0"));
    assert_eq!(r.test_outcome_value("TST", "SCORE_TOTAL"), Some("2"));
    assert_eq!(r.test_outcome_value("TST", "SCORE_TOTAL_WEIGHTED"), Some("3.5"));
    assert_eq!(r.test_outcome_value("TST", "SCORE_TOTAL__1F"), Some("2"));
    assert_eq!(r.test_outcome_value("TST", "SCORE_TOTAL_WEIGHTED__1F"), Some("3.5"));
    assert_eq!(r.test_outcome_value("TST", "SCORE_TOTAL__2F"), Some("0"));
    assert_eq!(sink.count_severity(Severity::Error), 0);
}

#[tokio::test]
async fn missing_weights_fall_back_to_one() {
    let sink = Arc::new(MemorySink::new());
    let engine = ScoringEngine::builder()
        .items([choice_item("ITM-1"), choice_item("ITM-2")])
        .test(test_of(vec![
            item_ref("ITM-1", "A", None),
            item_ref("ITM-2", "A", Some(4.0)),
        ]))
        .sink(sink.clone())
        .build()
        .unwrap();

    let scored = engine
        .process_responses_and_outcomes(vec![result(
            "R1",
            vec![answered("ITM-1", "A"), answered("ITM-2", "A")],
        )])
        .await
        .unwrap();

    assert_eq!(scored[0].test_outcome_value("TST", "SCORE_TOTAL_WEIGHTED"), Some("5"));
    assert!(sink.count(Severity::Warning, "Cannot find weight with identifier: WEIGHT") >= 1);
}

#[tokio::test]
async fn parallel_matches_sequential() {
    let build = |parallel: bool| {
        ScoringEngine::builder()
            .items([choice_item("ITM-1"), choice_item("ITM-2")])
            .test(test_of(vec![
                item_ref("ITM-1", "A", Some(2.0)),
                item_ref("ITM-2", "B", Some(1.0)),
            ]))
            .config(EngineConfig::default().parallel(parallel))
            .sink(Arc::new(MemorySink::new()))
            .build()
            .unwrap()
    };
    let batch: Vec<AssessmentResult> = (0..30)
        .map(|n| {
            result(
                &format!("R{n:02}"),
                vec![
                    answered("ITM-1", if n % 2 == 0 { "A" } else { "B" }),
                    answered("ITM-2", if n % 5 == 0 { "A" } else { "C" }),
                ],
            )
        })
        .collect();

    let mut sequential = build(false)
        .process_responses_and_outcomes(batch.clone())
        .await
        .unwrap();
    let mut parallel = build(true)
        .process_responses_and_outcomes(batch)
        .await
        .unwrap();
    sequential.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    parallel.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    assert_eq!(sequential, parallel);
}

#[tokio::test]
async fn custom_operator_feeds_string_match() {
    let condition = Node::new("qti-string-match")
        .with_attr("case-sensitive", "true")
        .with_child(
            Node::new("qti-custom-operator")
                .with_attr("class", "acme:Upper")
                .with_child(Node::new("qti-variable").with_attr("identifier", "RESPONSE")),
        )
        .with_child(
            Node::new("qti-base-value")
                .with_attr("base-type", "string")
                .with_text("A"),
        );
    let sink = Arc::new(MemorySink::new());
    let engine = ScoringEngine::builder()
        .item(scored_item("ITM-1", condition))
        .custom_operator(Arc::new(Upper))
        .sink(sink.clone())
        .build()
        .unwrap();

    let scored = engine
        .process_responses(vec![
            result("R1", vec![answered("ITM-1", "a")]),
            result("R2", vec![answered("ITM-1", "b")]),
        ])
        .await
        .unwrap();

    assert_eq!(scored[0].item_outcome_value("ITM-1", "SCORE"), Some("1"));
    assert_eq!(scored[1].item_outcome_value("ITM-1", "SCORE"), Some("0"));
    assert_eq!(sink.count_severity(Severity::Error), 0);
}

#[tokio::test]
async fn configuration_errors_abort_the_batch() {
    let items_only = ScoringEngine::builder()
        .item(choice_item("ITM-1"))
        .build()
        .unwrap();
    let err = items_only.process_outcomes(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ScoringError::MissingAssessmentTest));

    let test_only = ScoringEngine::builder()
        .test(test_of(vec![item_ref("ITM-1", "A", None)]))
        .build()
        .unwrap();
    let err = test_only.process_responses(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ScoringError::MissingAssessmentItems));

    let duplicate = ScoringEngine::builder()
        .items([choice_item("ITM-1"), choice_item("ITM-1")])
        .build();
    assert!(matches!(duplicate, Err(ScoringError::DuplicateItem(id)) if id == "ITM-1"));
}
