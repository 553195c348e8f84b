//! Batch evaluation: generation, execution, comparison, aggregation.

use crate::db::QueryExecutor;
use crate::eval::compare::{Execution, ResultComparator};
use crate::eval::normalize::exact_match_score;
use crate::eval::report::{ComparisonOutcome, EvaluationReport, ScoreAggregator};
use crate::llm::SqlGenerator;
use crate::otel::{eval_span, record_eval_scores};
use crate::types::{EvalError, ExecutionFailure, Result, TestCase};
use tracing::Instrument;

/// Result of evaluating a single test case.
#[derive(Debug, Clone)]
pub struct CaseEvaluation {
    /// First SQL candidate from the generator (empty if none)
    pub generated_sql: String,

    /// Both scores
    pub outcome: ComparisonOutcome,

    /// Live generated result, for display
    pub generated: Execution,

    /// Live expected result, for display
    pub expected: Execution,

    /// Drift check against the case's recorded result
    pub fixture_matches: Option<bool>,
}

/// Sequential dual-metric evaluator.
///
/// Cases are processed one at a time; the only state shared across cases is
/// the running aggregate.
pub struct Evaluator<'a> {
    executor: &'a dyn QueryExecutor,
    comparator: ResultComparator,
}

impl<'a> Evaluator<'a> {
    /// Create evaluator over a query executor.
    ///
    /// # Arguments
    ///
    /// * `executor` - Database boundary used for both queries of every case
    /// * `comparator` - Result equivalence rules (numeric precision)
    pub fn new(executor: &'a dyn QueryExecutor, comparator: ResultComparator) -> Self {
        Self {
            executor,
            comparator,
        }
    }

    /// Evaluate a batch of test cases.
    ///
    /// # Arguments
    ///
    /// * `cases` - Test cases, evaluated in order
    /// * `generator` - Produces SQL for each question
    ///
    /// # Returns
    ///
    /// Finalized report (0% for an empty batch)
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Connection` only if the database is unreachable
    /// before the first case. Every per-case failure is scored 0.0 instead.
    pub async fn run(
        &self,
        cases: &[TestCase],
        generator: &dyn SqlGenerator,
    ) -> Result<EvaluationReport> {
        self.executor.ping().await.map_err(|e| match e {
            EvalError::Connection(msg) => EvalError::Connection(msg),
            other => EvalError::Connection(other.to_string()),
        })?;

        let mut aggregator = ScoreAggregator::new();
        tracing::info!(run_id = %aggregator.run_id(), cases = cases.len(), "starting evaluation");

        for (i, case) in cases.iter().enumerate() {
            let span = eval_span(i + 1, &case.question);
            let evaluation = self
                .evaluate_case(case, generator)
                .instrument(span.clone())
                .await;

            span.in_scope(|| {
                record_eval_scores(
                    evaluation.outcome.exact_match_score,
                    evaluation.outcome.execution_match_score,
                )
            });
            aggregator.record(
                case,
                &evaluation.generated_sql,
                &evaluation.outcome,
                evaluation.fixture_matches,
            );
        }

        let report = aggregator.finish();
        tracing::info!(
            run_id = %report.run_id,
            count = report.count,
            exact_match = report.exact_match_accuracy,
            execution = report.execution_accuracy,
            "evaluation finished"
        );

        Ok(report)
    }

    /// Evaluate one case: generate SQL, then score it.
    ///
    /// Generation failures are recorded on the outcome; the case still runs
    /// with an empty query and scores 0.0 on execution.
    pub async fn evaluate_case(
        &self,
        case: &TestCase,
        generator: &dyn SqlGenerator,
    ) -> CaseEvaluation {
        let (generated_sql, generation_error) = match generator.generate(&case.question).await {
            Ok(candidates) => (candidates.into_iter().next().unwrap_or_default(), None),
            Err(e) => {
                tracing::warn!(error = %e, "SQL generation failed");
                (String::new(), Some(e.to_string()))
            }
        };

        let mut evaluation = self.compare_sql(&generated_sql, &case.expected_sql).await;

        if let Some(error) = generation_error {
            evaluation.outcome = evaluation.outcome.with_error(error);
        }

        if let (Some(fixture), Ok(live)) = (&case.expected_result, &evaluation.expected) {
            let matches = self
                .comparator
                .compare_results(live, fixture)
                .map(|verdict| verdict.is_match())
                .unwrap_or(false);
            if !matches {
                tracing::warn!("live expected result differs from recorded fixture");
            }
            evaluation.fixture_matches = Some(matches);
        }

        evaluation
    }

    /// Score a generated query against an expected query.
    ///
    /// Exact match is computed from text alone, independent of execution.
    /// Both queries are executed; execution match follows the comparator
    /// rules, with execution failures taking precedence.
    pub async fn compare_sql(&self, generated_sql: &str, expected_sql: &str) -> CaseEvaluation {
        let generated_sql = generated_sql.trim();
        let expected_sql = expected_sql.trim();

        let exact = exact_match_score(generated_sql, expected_sql);

        let generated = if generated_sql.is_empty() {
            Err(ExecutionFailure::EmptyQuery)
        } else {
            self.executor.execute(generated_sql).await
        };
        let expected = self.executor.execute(expected_sql).await;

        let verdict = self.comparator.compare(&generated, &expected);
        tracing::debug!(
            exact_match = exact,
            execution_match = verdict.score,
            mismatch = ?verdict.mismatch,
            "case scored"
        );

        CaseEvaluation {
            generated_sql: generated_sql.to_string(),
            outcome: ComparisonOutcome::new(exact, verdict),
            generated,
            expected,
            fixture_matches: None,
        }
    }
}
