//! Batch driver.
//!
//! Scores a set of assessment results: response processing per item, then
//! outcome processing per test, either in order or in parallel across
//! results. Results never share mutable state, so parallel workers only
//! share the read-only engine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::config::EngineConfig;
use crate::context::label;
use crate::custom_operators::{CustomOperator, EquivalenceChecker, TextualEquivalence};
use crate::diagnostics::{DiagnosticsSink, Severity, TracingSink};
use crate::error::ScoringError;
use crate::model::{AssessmentItem, AssessmentResult, AssessmentTest, ItemResult};
use crate::outcome::{process_test, with_derived_totals};
use crate::registry::Registry;
use crate::report::{ScoringReport, Stage};
use crate::response::process_item;
use crate::value::parse_float;

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_result_complete(&self, result: &AssessmentResult);
    fn on_batch_complete(&self, total: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_result_complete(&self, _: &AssessmentResult) {}
    fn on_batch_complete(&self, _: usize, _: Duration) {}
}

struct EngineInner {
    items: Vec<AssessmentItem>,
    test: Option<AssessmentTest>,
    registry: Registry,
    sink: Arc<dyn DiagnosticsSink>,
    config: EngineConfig,
}

/// The scoring engine. Cheap to clone; clones share the prepared inputs.
#[derive(Clone)]
pub struct ScoringEngine {
    inner: Arc<EngineInner>,
}

/// Collects the engine's inputs. See [`ScoringEngine::builder`].
#[derive(Default)]
pub struct ScoringEngineBuilder {
    items: Vec<AssessmentItem>,
    test: Option<AssessmentTest>,
    custom_operators: Vec<Arc<dyn CustomOperator>>,
    checker: Option<Arc<dyn EquivalenceChecker>>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    config: EngineConfig,
}

impl ScoringEngineBuilder {
    pub fn item(mut self, item: AssessmentItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = AssessmentItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn test(mut self, test: AssessmentTest) -> Self {
        self.test = Some(test);
        self
    }

    /// Register an extra custom operator. Replaces a shipped operator with
    /// the same definition.
    pub fn custom_operator(mut self, operator: Arc<dyn CustomOperator>) -> Self {
        self.custom_operators.push(operator);
        self
    }

    /// Capability used by `depcp:MathEqual`. Defaults to
    /// [`TextualEquivalence`].
    pub fn equivalence_checker(mut self, checker: Arc<dyn EquivalenceChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Diagnostics receiver. Defaults to [`TracingSink`].
    pub fn sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ScoringEngine, ScoringError> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.identifier.as_str()) {
                return Err(ScoringError::DuplicateItem(item.identifier.clone()));
            }
        }

        let checker = self.checker.unwrap_or_else(|| Arc::new(TextualEquivalence));
        let mut registry = Registry::with_defaults(checker);
        for operator in self.custom_operators {
            registry.register(operator);
        }

        let test = match self.test {
            Some(test) if self.config.derive_totals => Some(with_derived_totals(&test)),
            other => other,
        };

        Ok(ScoringEngine {
            inner: Arc::new(EngineInner {
                items: self.items,
                test,
                registry,
                sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
                config: self.config,
            }),
        })
    }
}

impl ScoringEngine {
    pub fn builder() -> ScoringEngineBuilder {
        ScoringEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// The test as prepared for outcome processing, derived totals included.
    pub fn test(&self) -> Option<&AssessmentTest> {
        self.inner.test.as_ref()
    }

    pub fn item(&self, identifier: &str) -> Option<&AssessmentItem> {
        self.inner.items.iter().find(|i| i.identifier == identifier)
    }

    /// Run response processing for every result.
    pub async fn process_responses(
        &self,
        results: Vec<AssessmentResult>,
    ) -> Result<Vec<AssessmentResult>, ScoringError> {
        self.process(Stage::Responses, results, &NoopReporter).await
    }

    /// Run outcome processing for every result.
    pub async fn process_outcomes(
        &self,
        results: Vec<AssessmentResult>,
    ) -> Result<Vec<AssessmentResult>, ScoringError> {
        self.process(Stage::Outcomes, results, &NoopReporter).await
    }

    /// Run response then outcome processing for every result.
    pub async fn process_responses_and_outcomes(
        &self,
        results: Vec<AssessmentResult>,
    ) -> Result<Vec<AssessmentResult>, ScoringError> {
        self.process(Stage::All, results, &NoopReporter).await
    }

    /// Process a batch and wrap it in a timed report.
    pub async fn run(
        &self,
        stage: Stage,
        results: Vec<AssessmentResult>,
        progress: &dyn ProgressReporter,
    ) -> Result<ScoringReport, ScoringError> {
        let start = Instant::now();
        let results = self.process(stage, results, progress).await?;
        Ok(ScoringReport::new(
            stage,
            start.elapsed().as_millis() as u64,
            results,
        ))
    }

    /// Process a batch. In parallel mode the output order is unspecified.
    pub async fn process(
        &self,
        stage: Stage,
        results: Vec<AssessmentResult>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<AssessmentResult>, ScoringError> {
        self.check_inputs(stage)?;
        let start = Instant::now();
        let total = results.len();

        let scored = if self.inner.config.process_parallel {
            self.process_parallel(stage, results, progress).await?
        } else {
            results
                .into_iter()
                .map(|mut result| {
                    self.inner.score(&mut result, stage);
                    progress.on_result_complete(&result);
                    result
                })
                .collect()
        };

        progress.on_batch_complete(total, start.elapsed());
        tracing::debug!(
            "scored {total} results ({stage}) in {}ms",
            start.elapsed().as_millis()
        );
        Ok(scored)
    }

    async fn process_parallel(
        &self,
        stage: Stage,
        results: Vec<AssessmentResult>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<AssessmentResult>, ScoringError> {
        let semaphore = Arc::new(Semaphore::new(self.inner.config.parallelism));
        let mut futures = FuturesUnordered::new();

        for mut result in results {
            let inner = Arc::clone(&self.inner);
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ScoringError::Worker("semaphore closed".into()))?;
                tokio::task::spawn_blocking(move || {
                    inner.score(&mut result, stage);
                    result
                })
                .await
                .map_err(|e| ScoringError::Worker(e.to_string()))
            });
        }

        let mut scored = Vec::with_capacity(futures.len());
        while let Some(outcome) = futures.next().await {
            let result = outcome?;
            progress.on_result_complete(&result);
            scored.push(result);
        }
        Ok(scored)
    }

    /// Configuration checks that abort a batch before it starts.
    fn check_inputs(&self, stage: Stage) -> Result<(), ScoringError> {
        if stage.includes_responses() && self.inner.items.is_empty() {
            return Err(ScoringError::MissingAssessmentItems);
        }
        if stage.includes_outcomes() && self.inner.test.is_none() {
            return Err(ScoringError::MissingAssessmentTest);
        }
        Ok(())
    }

    /// Score one result in place on the current thread.
    pub fn score_result(&self, result: &mut AssessmentResult, stage: Stage) -> Result<(), ScoringError> {
        self.check_inputs(stage)?;
        self.inner.score(result, stage);
        Ok(())
    }

    /// Run one item's response processing and return its score normalised
    /// by MAXSCORE into `[0, 1]`.
    ///
    /// MAXSCORE defaults to 1 when neither recorded nor declared. Negative
    /// scores count as 0. `assessment_result` is the identifier of the
    /// result the item result belongs to, used to label diagnostics.
    pub fn normalized_item_score(
        &self,
        item: &AssessmentItem,
        result: &mut ItemResult,
        assessment_result: &str,
    ) -> f64 {
        let inner = &self.inner;
        process_item(
            item,
            result,
            assessment_result,
            &inner.registry,
            &inner.config,
            inner.sink.as_ref(),
        );

        let read = |identifier: &str| -> Option<f64> {
            let raw = result.outcome(identifier)?.value.as_deref()?;
            parse_float(raw).ok()
        };
        let score = read("SCORE").unwrap_or(0.0).max(0.0);
        let max_score = read("MAXSCORE").unwrap_or(1.0);
        if max_score <= 0.0 {
            inner.sink.record(
                Severity::Warning,
                &format!(
                    "{}: MAXSCORE {max_score} is not positive, score is 0",
                    label(&item.identifier, assessment_result)
                ),
            );
            return 0.0;
        }
        (score / max_score).clamp(0.0, 1.0)
    }
}

impl EngineInner {
    fn score(&self, result: &mut AssessmentResult, stage: Stage) {
        if stage.includes_responses() {
            for item in &self.items {
                let Some(item_result) = result
                    .item_results
                    .iter_mut()
                    .find(|r| r.identifier == item.identifier)
                else {
                    self.sink.record(
                        Severity::Info,
                        &format!(
                            "{}: no item result, skipping",
                            label(&item.identifier, &result.identifier)
                        ),
                    );
                    continue;
                };
                process_item(
                    item,
                    item_result,
                    &result.identifier,
                    &self.registry,
                    &self.config,
                    self.sink.as_ref(),
                );
            }
        }
        if stage.includes_outcomes() {
            if let Some(test) = &self.test {
                process_test(test, result, &self.registry, &self.config, self.sink.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::fixtures::{answered, assessment_result, choice_item, item_ref, test as make_test};

    fn engine(config: EngineConfig, sink: Arc<MemorySink>) -> ScoringEngine {
        ScoringEngine::builder()
            .items([choice_item("ITM-1", "A"), choice_item("ITM-2", "B")])
            .test(make_test(
                "TST",
                vec![
                    item_ref("ITM-1", &["A"], &[("WEIGHT", 3.0)]),
                    item_ref("ITM-2", &["B"], &[("WEIGHT", 2.0)]),
                ],
            ))
            .sink(sink)
            .config(config)
            .build()
            .unwrap()
    }

    fn batch() -> Vec<AssessmentResult> {
        (0..20)
            .map(|n| {
                let first = if n % 2 == 0 { "A" } else { "C" };
                let second = if n % 3 == 0 { "B" } else { "C" };
                assessment_result(
                    &format!("R{n:02}"),
                    vec![answered("ITM-1", first), answered("ITM-2", second)],
                )
            })
            .collect()
    }

    fn sorted(mut results: Vec<AssessmentResult>) -> Vec<AssessmentResult> {
        results.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        results
    }

    #[tokio::test]
    async fn end_to_end_totals() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine(EngineConfig::default(), sink.clone());
        let results = engine
            .process_responses_and_outcomes(vec![assessment_result(
                "R1",
                vec![answered("ITM-1", "A"), answered("ITM-2", "B")],
            )])
            .await
            .unwrap();

        let result = &results[0];
        assert_eq!(result.item_outcome_value("ITM-1", "SCORE"), Some("1"));
        assert_eq!(result.test_outcome_value("TST", "SCORE_TOTAL"), Some("2"));
        assert_eq!(result.test_outcome_value("TST", "SCORE_TOTAL_WEIGHTED"), Some("5"));
        assert_eq!(result.test_outcome_value("TST", "SCORE_TOTAL_A"), Some("1"));
        assert_eq!(result.test_outcome_value("TST", "SCORE_TOTAL_WEIGHTED_B"), Some("2"));
        assert_eq!(sink.count_severity(Severity::Error), 0);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let sequential = engine(EngineConfig::default(), Arc::new(MemorySink::new()))
            .process_responses_and_outcomes(batch())
            .await
            .unwrap();
        let parallel = engine(
            EngineConfig::default().parallel(true),
            Arc::new(MemorySink::new()),
        )
        .process_responses_and_outcomes(batch())
        .await
        .unwrap();

        assert_eq!(parallel.len(), 20);
        assert_eq!(sorted(parallel), sorted(sequential));
    }

    #[tokio::test]
    async fn stages_can_run_separately() {
        let engine = engine(EngineConfig::default(), Arc::new(MemorySink::new()));
        let results = engine.process_responses(batch()).await.unwrap();
        assert!(results[0].test_results.is_empty());
        let results = engine.process_outcomes(results).await.unwrap();
        assert_eq!(results[0].test_outcome_value("TST", "SCORE_TOTAL"), Some("2"));
    }

    #[tokio::test]
    async fn missing_inputs_are_configuration_errors() {
        let no_test = ScoringEngine::builder()
            .item(choice_item("ITM-1", "A"))
            .build()
            .unwrap();
        let err = no_test.process_outcomes(vec![]).await.unwrap_err();
        assert!(matches!(err, ScoringError::MissingAssessmentTest));
        assert!(no_test.process_responses(vec![]).await.is_ok());

        let no_items = ScoringEngine::builder()
            .test(make_test("TST", vec![]))
            .build()
            .unwrap();
        let err = no_items.process_responses_and_outcomes(vec![]).await.unwrap_err();
        assert!(matches!(err, ScoringError::MissingAssessmentItems));
    }

    #[test]
    fn builder_rejects_bad_input() {
        let duplicate = ScoringEngine::builder()
            .items([choice_item("ITM-1", "A"), choice_item("ITM-1", "B")])
            .build();
        assert!(matches!(duplicate, Err(ScoringError::DuplicateItem(id)) if id == "ITM-1"));

        let config = EngineConfig {
            parallelism: 0,
            ..Default::default()
        };
        let invalid = ScoringEngine::builder().config(config).build();
        assert!(matches!(invalid, Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn unanswered_items_are_skipped_with_info() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine(EngineConfig::default(), sink.clone());
        let mut result = assessment_result("R1", vec![answered("ITM-1", "A")]);
        engine.score_result(&mut result, Stage::Responses).unwrap();

        assert_eq!(result.item_outcome_value("ITM-1", "SCORE"), Some("1"));
        assert!(result.item_result("ITM-2").is_none());
        assert_eq!(sink.count(Severity::Info, "ITM-2 - R1: no item result"), 1);
    }

    #[test]
    fn derive_totals_can_be_disabled() {
        let config = EngineConfig {
            derive_totals: false,
            ..Default::default()
        };
        let engine = engine(config, Arc::new(MemorySink::new()));
        assert!(engine.test().unwrap().outcome_processing.is_none());
    }

    #[test]
    fn normalized_score_is_clamped() {
        let engine = engine(EngineConfig::default(), Arc::new(MemorySink::new()));
        let item = choice_item("ITM-1", "A");

        assert_eq!(engine.normalized_item_score(&item, &mut answered("ITM-1", "A"), "R1"), 1.0);
        assert_eq!(engine.normalized_item_score(&item, &mut answered("ITM-1", "B"), "R1"), 0.0);

        let mut halved = item.clone();
        halved.outcome_declarations[1].default_value = Some("2".into());
        assert_eq!(engine.normalized_item_score(&halved, &mut answered("ITM-1", "A"), "R1"), 0.5);

        let mut negative = item.clone();
        negative.response_processing = Some(crate::fixtures::response_processing(vec![
            crate::fixtures::set_outcome("SCORE", crate::fixtures::base("float", "-3")),
        ]));
        assert_eq!(engine.normalized_item_score(&negative, &mut answered("ITM-1", "A"), "R1"), 0.0);
    }

    #[test]
    fn normalized_score_diagnostics_carry_result_label() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine(EngineConfig::default(), sink.clone());
        let mut unbounded = choice_item("ITM-1", "A");
        unbounded.outcome_declarations[1].default_value = Some("0".into());

        let score = engine.normalized_item_score(&unbounded, &mut answered("ITM-1", "A"), "R7");
        assert_eq!(score, 0.0);
        assert_eq!(
            sink.count(Severity::Warning, "ITM-1 - R7: MAXSCORE 0 is not positive"),
            1
        );
    }
}
