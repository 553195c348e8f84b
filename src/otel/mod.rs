//! Tracing instrumentation for evaluation runs.
//!
//! Follows OpenTelemetry semantic conventions for database operations:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//!
//! # Database Semantic Conventions
//!
//! **Span naming**: `{db.operation.name}`
//! - Example: `query`, `introspect`, `ping`
//!
//! **Required attributes**:
//! - `db.system.name`: Always `"postgresql"`
//!
//! **Conditionally required**:
//! - `db.namespace`: Database name
//! - `db.operation.name`: Operation type
//!
//! **Recommended**:
//! - `db.query.text`: Statement text for scored queries
//! - `db.response.returned_rows`: Rows fetched
//!
//! # Evaluation Conventions
//!
//! Per-case evaluation uses `INTERNAL` span kind with custom attributes
//! `eval.case.index`, `eval.exact_match`, `eval.execution_match`.
//!
//! # Example
//!
//! ```rust,ignore
//! use nl2sql_eval::otel::{db_query_span, record_db_metrics};
//!
//! let span = db_query_span("SELECT 1", Some("crm"));
//! let _guard = span.enter();
//! record_db_metrics(1);
//! ```

pub mod db;
pub mod eval;

pub use db::{db_query_span, db_span, record_db_error, record_db_metrics, DbOperation};
pub use eval::{eval_span, llm_span, record_eval_scores};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Output goes to stderr so
/// stdout stays clean for reports.
///
/// # Arguments
///
/// * `json` - Emit newline-delimited JSON instead of human-readable lines
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second install (e.g. from tests) is a no-op
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
