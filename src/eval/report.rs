//! Score aggregation and evaluation reports.

use crate::eval::compare::{ExecutionMatch, Mismatch};
use crate::types::{Result, TestCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Both metrics for one test case.
///
/// Created once per case evaluation; immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    /// 1.0 if normalized SQL texts are equal
    pub exact_match_score: f64,

    /// 1.0 if results are equivalent
    pub execution_match_score: f64,

    /// Failure reason, if generation, execution or comparison failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why execution match is 0.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,
}

impl ComparisonOutcome {
    /// Combine the exact-match score with an execution verdict.
    pub fn new(exact_match_score: f64, execution: ExecutionMatch) -> Self {
        Self {
            exact_match_score,
            execution_match_score: execution.score,
            error: execution.error,
            mismatch: execution.mismatch,
        }
    }

    /// Attach an error that happened before execution (e.g. SQL generation).
    ///
    /// Keeps an existing error and appends the new one.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{}; {}", error, existing),
            None => error,
        });
        self
    }
}

/// Per-case detail retained for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDetail {
    /// 1-based position in the batch
    pub index: usize,

    pub question: String,

    pub generated_sql: String,

    pub expected_sql: String,

    pub exact_match_score: f64,

    pub execution_match_score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether the live expected result still equals the recorded fixture
    ///
    /// `None` when the case has no fixture or the expected query failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_matches: Option<bool>,
}

/// Accumulates outcomes across a batch.
///
/// Single owner, folded one case at a time.
#[derive(Debug)]
pub struct ScoreAggregator {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    exact_match_total: f64,
    execution_match_total: f64,
    cases: Vec<CaseDetail>,
}

impl ScoreAggregator {
    /// Start a new run.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            exact_match_total: 0.0,
            execution_match_total: 0.0,
            cases: Vec::new(),
        }
    }

    /// Run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of cases recorded so far.
    pub fn count(&self) -> usize {
        self.cases.len()
    }

    /// Record one case.
    ///
    /// # Arguments
    ///
    /// * `case` - Test case that was evaluated
    /// * `generated_sql` - SQL produced for the case (may be empty)
    /// * `outcome` - Both scores and any error
    /// * `fixture_matches` - Drift check against the recorded result
    pub fn record(
        &mut self,
        case: &TestCase,
        generated_sql: &str,
        outcome: &ComparisonOutcome,
        fixture_matches: Option<bool>,
    ) {
        self.exact_match_total += outcome.exact_match_score;
        self.execution_match_total += outcome.execution_match_score;

        self.cases.push(CaseDetail {
            index: self.cases.len() + 1,
            question: case.question.clone(),
            generated_sql: generated_sql.to_string(),
            expected_sql: case.expected_sql.trim().to_string(),
            exact_match_score: outcome.exact_match_score,
            execution_match_score: outcome.execution_match_score,
            mismatch: outcome.mismatch.as_ref().map(ToString::to_string),
            error: outcome.error.clone(),
            fixture_matches,
        });
    }

    /// Finalize the report.
    ///
    /// Averages are percentages; an empty batch reports 0% rather than
    /// dividing by zero.
    pub fn finish(self) -> EvaluationReport {
        let count = self.cases.len();
        let percent = |total: f64| {
            if count == 0 {
                0.0
            } else {
                total / count as f64 * 100.0
            }
        };

        EvaluationReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            count,
            exact_match_accuracy: percent(self.exact_match_total),
            execution_accuracy: percent(self.execution_match_total),
            cases: self.cases,
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Final summary of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Number of test cases
    pub count: usize,

    /// Mean exact match, as a percentage
    pub exact_match_accuracy: f64,

    /// Mean execution match, as a percentage
    pub execution_accuracy: f64,

    /// Per-case details in evaluation order
    pub cases: Vec<CaseDetail>,
}

impl EvaluationReport {
    /// Check if no cases were evaluated.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of cases with an error recorded.
    pub fn error_count(&self) -> usize {
        self.cases.iter().filter(|c| c.error.is_some()).count()
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write per-case details as CSV (one row per case).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "index",
            "question",
            "generated_sql",
            "expected_sql",
            "exact_match",
            "execution_match",
            "mismatch",
            "error",
        ])?;

        for case in &self.cases {
            csv.write_record([
                case.index.to_string(),
                case.question.clone(),
                case.generated_sql.clone(),
                case.expected_sql.clone(),
                format!("{:.2}", case.exact_match_score),
                format!("{:.2}", case.execution_match_score),
                case.mismatch.clone().unwrap_or_default(),
                case.error.clone().unwrap_or_default(),
            ])?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Write per-case details as a CSV file.
    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        self.write_csv(std::fs::File::create(path)?)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Evaluation Summary ---")?;
        if self.is_empty() {
            writeln!(f, "No test cases evaluated")?;
        } else {
            writeln!(f, "Total Test Cases: {}", self.count)?;
        }
        writeln!(f, "Average Exact Match Accuracy: {:.2}%", self.exact_match_accuracy)?;
        writeln!(f, "Average Execution Accuracy: {:.2}%", self.execution_accuracy)?;
        if self.error_count() > 0 {
            writeln!(f, "Cases with errors: {}", self.error_count())?;
        }
        write!(f, "--------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exact: f64, execution: f64) -> ComparisonOutcome {
        ComparisonOutcome {
            exact_match_score: exact,
            execution_match_score: execution,
            error: None,
            mismatch: None,
        }
    }

    fn case(i: usize) -> TestCase {
        TestCase::new(format!("question {}", i), format!("SELECT {}", i))
    }

    #[test]
    fn test_execution_accuracy_percentage() {
        let mut aggregator = ScoreAggregator::new();
        for (i, score) in [1.0, 1.0, 1.0, 1.0, 0.0].into_iter().enumerate() {
            aggregator.record(&case(i), "SELECT 1", &outcome(0.0, score), None);
        }

        let report = aggregator.finish();
        assert_eq!(report.count, 5);
        assert!((report.execution_accuracy - 80.0).abs() < 1e-9);
        assert_eq!(report.exact_match_accuracy, 0.0);
        assert!(report.to_string().contains("Average Execution Accuracy: 80.00%"));
    }

    #[test]
    fn test_empty_batch() {
        let report = ScoreAggregator::new().finish();

        assert!(report.is_empty());
        assert_eq!(report.exact_match_accuracy, 0.0);
        assert_eq!(report.execution_accuracy, 0.0);
        assert!(report.to_string().contains("No test cases evaluated"));
    }

    #[test]
    fn test_case_details_retained() {
        let mut aggregator = ScoreAggregator::new();
        let failed = outcome(1.0, 0.0).with_error("generated query failed: syntax error");
        aggregator.record(&case(1), "SELEC 1", &failed, Some(true));

        let report = aggregator.finish();
        let detail = &report.cases[0];
        assert_eq!(detail.index, 1);
        assert_eq!(detail.question, "question 1");
        assert_eq!(detail.generated_sql, "SELEC 1");
        assert_eq!(detail.exact_match_score, 1.0);
        assert_eq!(detail.error.as_deref(), Some("generated query failed: syntax error"));
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_with_error_appends() {
        let mut base = outcome(0.0, 0.0);
        base.error = Some("generated query failed: empty query".to_string());

        let combined = base.with_error("LLM SQL generation failed: timeout");
        assert_eq!(
            combined.error.as_deref(),
            Some("LLM SQL generation failed: timeout; generated query failed: empty query")
        );
    }

    #[test]
    fn test_csv_export() {
        let mut aggregator = ScoreAggregator::new();
        aggregator.record(&case(1), "SELECT 1", &outcome(1.0, 1.0), None);
        let report = aggregator.finish();

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("index,question,generated_sql,expected_sql,exact_match,execution_match,mismatch,error")
        );
        assert_eq!(lines.next(), Some("1,question 1,SELECT 1,SELECT 1,1.00,1.00,,"));
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut aggregator = ScoreAggregator::new();
        aggregator.record(&case(1), "SELECT 1", &outcome(1.0, 0.0), None);
        let report = aggregator.finish();
        report.write_json(&path).unwrap();

        let loaded: EvaluationReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.execution_accuracy, 0.0);
        assert_eq!(loaded.cases.len(), 1);
    }
}
