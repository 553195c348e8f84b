//! Dual-metric accuracy evaluation.
//!
//! - `normalize`: SQL text canonicalization and exact-match scoring
//! - `compare`: result-set equivalence and execution-match scoring
//! - `report`: per-case outcomes, aggregation, report export
//! - `evaluator`: batch orchestration over a database and a SQL generator

pub mod compare;
pub mod evaluator;
pub mod normalize;
pub mod report;

pub use compare::{ColumnAlignment, Execution, ExecutionMatch, Mismatch, ResultComparator};
pub use evaluator::{CaseEvaluation, Evaluator};
pub use normalize::{exact_match_score, normalize_sql};
pub use report::{CaseDetail, ComparisonOutcome, EvaluationReport, ScoreAggregator};
