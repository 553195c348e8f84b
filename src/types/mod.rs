//! Core data types for evaluation.
//!
//! Defines fundamental types used throughout the system:
//! - `CellValue`: Tagged cell value returned by query execution
//! - `TabularResult`: Column names plus rows of cells
//! - `CanonicalCell`: Ordered, comparable cell form for row bags
//! - `TestCase`: Question and expected SQL pair
//! - `EvalError` / `ExecutionFailure`: Error types for all operations
//! - `Result`: Convenient result type alias

pub mod canonical;
pub mod error;
pub mod tabular;
pub mod test_case;
pub mod value;

pub use canonical::{CanonicalCell, Canonicalizer, ColumnPolicy};
pub use error::{EvalError, ExecutionFailure, Result};
pub use tabular::{CanonicalRow, TabularResult};
pub use test_case::TestCase;
pub use value::{CellValue, Temporal};
