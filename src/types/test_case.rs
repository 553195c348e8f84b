//! Evaluation test cases.

use crate::types::error::{EvalError, Result};
use crate::types::tabular::TabularResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Evaluation set bundled with the crate (customers table benchmark).
const BUILTIN_CASES: &str = include_str!("../../data/test_cases.yaml");

/// One (question, expected SQL) pair driving evaluation.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Natural language question sent to the SQL generator
    #[serde(alias = "nl_query")]
    pub question: String,

    /// Reference SQL; its live result is the comparison target
    pub expected_sql: String,

    /// Result recorded when the case was authored (optional)
    ///
    /// Used to detect drift between the fixture and the live database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<TabularResult>,
}

impl TestCase {
    /// Create test case without a recorded result.
    pub fn new(question: impl Into<String>, expected_sql: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected_sql: expected_sql.into(),
            expected_result: None,
        }
    }

    /// Parse a YAML list of test cases.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::YamlError` on malformed YAML, or
    /// `EvalError::TestCaseError` if a case has an empty question or SQL
    pub fn parse_yaml(content: &str) -> Result<Vec<TestCase>> {
        let cases: Vec<TestCase> = serde_yaml::from_str(content)?;

        for (i, case) in cases.iter().enumerate() {
            if case.question.trim().is_empty() {
                return Err(EvalError::TestCaseError(format!(
                    "case {} has an empty question",
                    i + 1
                )));
            }
            if case.expected_sql.trim().is_empty() {
                return Err(EvalError::TestCaseError(format!(
                    "case {} has an empty expected_sql",
                    i + 1
                )));
            }
        }

        Ok(cases)
    }

    /// Load test cases from a YAML file.
    pub fn load_file(path: &Path) -> Result<Vec<TestCase>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Built-in evaluation set.
    pub fn builtin() -> Result<Vec<TestCase>> {
        Self::parse_yaml(BUILTIN_CASES)
    }
}
