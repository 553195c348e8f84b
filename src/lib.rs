//! nl2sql-eval - natural language to PostgreSQL with dual-metric accuracy
//! evaluation.
//!
//! Every generated query is scored twice:
//! - **Exact match**: normalized SQL text equality
//! - **Execution accuracy**: both queries run and their result sets compared
//!   as unordered bags, by column name, with numeric and date tolerance

pub mod config;
pub mod db;
pub mod eval;
pub mod llm;
pub mod otel;
pub mod types;

// Re-export main types
pub use config::{DatabaseConfig, LlmConfig, LlmProvider};
pub use db::{PgExecutor, QueryExecutor};
pub use eval::{EvaluationReport, Evaluator, ResultComparator};
pub use llm::{LlmClient, LlmSqlGenerator, SqlGenerator};
pub use types::{CellValue, EvalError, ExecutionFailure, Result, TabularResult, TestCase};
