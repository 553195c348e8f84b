//! Result-set equivalence (execution accuracy).
//!
//! Decides whether the generated query's result matches the expected query's
//! result. Comparison is:
//! - column-order independent (columns matched by name, case-insensitive)
//! - alias tolerant (same column count, different names: compared by position)
//! - row-order independent (rows compared as a multiset)
//! - type tolerant (numbers rounded, dates normalized, NULL-aware)
//!
//! Scoring is binary: 1.0 for an equivalent result, 0.0 otherwise.

use crate::types::{
    CanonicalRow, Canonicalizer, CellValue, ColumnPolicy, ExecutionFailure, Result,
    TabularResult,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Outcome of running one query.
pub type Execution = std::result::Result<TabularResult, ExecutionFailure>;

/// Why two executions did not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Mismatch {
    /// Generated query failed to execute
    GeneratedFailed,
    /// Expected query failed to execute
    ExpectedFailed,
    /// Column counts differ and names cannot be aligned
    ColumnCount { generated: usize, expected: usize },
    /// Row counts differ
    RowCount { generated: usize, expected: usize },
    /// Same shape, different values
    Values,
    /// Comparison itself failed (ragged rows, etc.)
    ComparisonFailed,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeneratedFailed => write!(f, "generated query failed"),
            Self::ExpectedFailed => write!(f, "expected query failed"),
            Self::ColumnCount { generated, expected } => {
                write!(f, "column count {} vs {}", generated, expected)
            }
            Self::RowCount { generated, expected } => {
                write!(f, "row count {} vs {}", generated, expected)
            }
            Self::Values => write!(f, "values differ"),
            Self::ComparisonFailed => write!(f, "comparison failed"),
        }
    }
}

/// How generated columns were lined up with expected columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlignment {
    /// Same names (case-insensitive), reordered to the expected order
    ByName,
    /// Names differ; compared by position
    ByPosition,
}

/// Execution-accuracy verdict for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMatch {
    /// 1.0 or 0.0
    pub score: f64,

    /// Reason for a 0.0 score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,

    /// Execution or comparison error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Column alignment used, when columns were compared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<ColumnAlignment>,
}

impl ExecutionMatch {
    fn matched(alignment: Option<ColumnAlignment>) -> Self {
        Self {
            score: 1.0,
            mismatch: None,
            error: None,
            alignment,
        }
    }

    fn mismatched(mismatch: Mismatch, alignment: Option<ColumnAlignment>) -> Self {
        Self {
            score: 0.0,
            mismatch: Some(mismatch),
            error: None,
            alignment,
        }
    }

    fn failed(mismatch: Mismatch, error: String) -> Self {
        Self {
            score: 0.0,
            mismatch: Some(mismatch),
            error: Some(error),
            alignment: None,
        }
    }

    /// Check if the results were judged equivalent.
    pub fn is_match(&self) -> bool {
        self.score >= 1.0
    }
}

/// Compares two executions under the equivalence rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultComparator {
    canonicalizer: Canonicalizer,
}

impl ResultComparator {
    /// Create comparator rounding numbers to `decimal_places`.
    pub fn new(decimal_places: u32) -> Self {
        Self {
            canonicalizer: Canonicalizer::new(decimal_places),
        }
    }

    /// Compare generated and expected executions.
    ///
    /// # Arguments
    ///
    /// * `generated` - Result (or failure) of the generated SQL
    /// * `expected` - Result (or failure) of the expected SQL
    ///
    /// # Returns
    ///
    /// Verdict with score 1.0 or 0.0. Never fails: execution failures and
    /// comparison errors are recorded in the verdict.
    pub fn compare(&self, generated: &Execution, expected: &Execution) -> ExecutionMatch {
        let (generated, expected) = match (generated, expected) {
            (Err(failure), _) => {
                return ExecutionMatch::failed(
                    Mismatch::GeneratedFailed,
                    format!("generated query failed: {}", failure),
                )
            }
            (_, Err(failure)) => {
                return ExecutionMatch::failed(
                    Mismatch::ExpectedFailed,
                    format!("expected query failed: {}", failure),
                )
            }
            (Ok(generated), Ok(expected)) => (generated, expected),
        };

        match self.compare_results(generated, expected) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "result comparison failed");
                ExecutionMatch::failed(Mismatch::ComparisonFailed, e.to_string())
            }
        }
    }

    /// Compare two successfully executed results.
    ///
    /// # Algorithm
    ///
    /// 1. Both empty: match (columns are irrelevant when neither side has rows)
    /// 2. Align columns: by name if the name multisets agree, else by
    ///    position if the counts agree, else mismatch
    /// 3. Row counts must agree
    /// 4. Derive one `ColumnPolicy` per column from both sides
    /// 5. Build canonical row bags and compare them
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ComparisonError` if either result is ragged
    pub fn compare_results(
        &self,
        generated: &TabularResult,
        expected: &TabularResult,
    ) -> Result<ExecutionMatch> {
        generated.validate_shape()?;
        expected.validate_shape()?;

        if generated.row_count() == 0 && expected.row_count() == 0 {
            return Ok(ExecutionMatch::matched(None));
        }

        let (aligned, alignment) = match generated.column_alignment(&expected.columns) {
            Some(_) => (
                Cow::Owned(generated.reorder_columns(&expected.columns)?),
                ColumnAlignment::ByName,
            ),
            None if generated.column_count() == expected.column_count() => {
                tracing::debug!(
                    generated = ?generated.columns,
                    expected = ?expected.columns,
                    "column names differ, comparing by position"
                );
                (Cow::Borrowed(generated), ColumnAlignment::ByPosition)
            }
            None => {
                return Ok(ExecutionMatch::mismatched(
                    Mismatch::ColumnCount {
                        generated: generated.column_count(),
                        expected: expected.column_count(),
                    },
                    None,
                ))
            }
        };

        if aligned.row_count() != expected.row_count() {
            return Ok(ExecutionMatch::mismatched(
                Mismatch::RowCount {
                    generated: aligned.row_count(),
                    expected: expected.row_count(),
                },
                Some(alignment),
            ));
        }

        let policies = column_policies(&aligned, expected);
        let generated_bag = aligned.to_canonical_row_bag(&policies, &self.canonicalizer)?;
        let expected_bag = expected.to_canonical_row_bag(&policies, &self.canonicalizer)?;

        if generated_bag == expected_bag {
            Ok(ExecutionMatch::matched(Some(alignment)))
        } else {
            if let Some((g, e)) = first_difference(&generated_bag, &expected_bag) {
                tracing::debug!(generated = ?g, expected = ?e, "first differing row");
            }
            Ok(ExecutionMatch::mismatched(Mismatch::Values, Some(alignment)))
        }
    }
}

/// One policy per column, observing every cell of that column on both sides.
fn column_policies(a: &TabularResult, b: &TabularResult) -> Vec<ColumnPolicy> {
    let width = b.column_count();
    let mut policies = vec![ColumnPolicy::default(); width];
    let cells = || a.rows.iter().chain(b.rows.iter());

    for row in cells() {
        for (policy, cell) in policies.iter_mut().zip(row) {
            policy.observe(cell);
        }
    }
    for row in cells() {
        for (policy, cell) in policies.iter_mut().zip(row) {
            if matches!(cell, CellValue::Text(_)) {
                policy.observe_text(cell);
            }
        }
    }

    policies
}

fn first_difference<'a>(
    a: &'a [CanonicalRow],
    b: &'a [CanonicalRow],
) -> Option<(&'a CanonicalRow, &'a CanonicalRow)> {
    a.iter().zip(b).find(|(x, y)| x != y)
}
