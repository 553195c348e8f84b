//! Error types for evaluation operations.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.
//!
//! Two layers:
//! - `EvalError`: library-wide failures (configuration, LLM, setup, I/O)
//! - `ExecutionFailure`: per-query outcome of the execution runner, scored rather than raised

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Comprehensive error type for all evaluation operations.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Transport or authentication failure talking to the database
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Cell coercion or result-shape failure during comparison
    #[error("Result comparison failed: {0}")]
    ComparisonError(String),

    /// SQL text could not be parsed
    #[error("SQL parsing failed: {0}")]
    ParseError(String),

    /// Schema introspection failed
    #[error("Schema introspection failed: {0}")]
    SchemaError(String),

    /// LLM call or SQL generation failed
    #[error("LLM SQL generation failed: {0}")]
    LlmError(String),

    /// Test case file could not be loaded
    #[error("Invalid test case: {0}")]
    TestCaseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP client error (LLM APIs)
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl EvalError {
    /// Create a comparison error with context.
    ///
    /// # Arguments
    ///
    /// * `msg` - Error message
    ///
    /// # Returns
    ///
    /// `EvalError::ComparisonError`
    pub fn comparison(msg: impl Into<String>) -> Self {
        Self::ComparisonError(msg.into())
    }

    /// Create an LLM error with context.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::LlmError(msg.into())
    }

    /// Create a configuration error with context.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Why a single query failed to produce a result set.
///
/// Returned by the execution runner instead of an `Err` on the batch, so the
/// comparator's failure-precedence rule is a plain `match`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// Statement did not parse
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Referenced table, view or column does not exist
    #[error("missing relation: {0}")]
    MissingRelation(String),

    /// Role lacks privileges for the statement
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Statement exceeded the query timeout or was cancelled
    #[error("timeout: {0}")]
    Timeout(String),

    /// Could not connect, or the connection dropped mid-query
    #[error("connection error: {0}")]
    Connection(String),

    /// A returned value could not be decoded into a cell value
    #[error("undecodable value: {0}")]
    Decode(String),

    /// No SQL was supplied (e.g. the generator produced nothing)
    #[error("empty query")]
    EmptyQuery,

    /// Any other database-side error
    #[error("sql error: {0}")]
    Sql(String),
}

impl ExecutionFailure {
    /// Short classification used as the `error.type` span attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "syntax",
            Self::MissingRelation(_) => "missing_relation",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection",
            Self::Decode(_) => "decode",
            Self::EmptyQuery => "empty_query",
            Self::Sql(_) => "sql",
        }
    }
}

/// Convenient result type alias.
pub type Result<T> = std::result::Result<T, EvalError>;
