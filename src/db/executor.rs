//! Execution runner: run a SQL string against PostgreSQL and capture the
//! tabular result or a classified failure.

use crate::config::DatabaseConfig;
use crate::db::decode::decode_row;
use crate::db::guard::split_statements;
use crate::eval::Execution;
use crate::otel::{db_query_span, db_span, record_db_error, record_db_metrics, DbOperation};
use crate::types::{EvalError, ExecutionFailure, Result, TabularResult};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};
use tracing::Instrument;

/// Database boundary used by the evaluator.
///
/// `execute` never fails the batch: every problem with a single statement is
/// reported as an `ExecutionFailure` and scored.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute one statement and fetch every row.
    async fn execute(&self, sql: &str) -> Execution;

    /// Check the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Connection` if no connection can be opened
    async fn ping(&self) -> Result<()>;
}

/// Connection whose driver task is torn down when it goes out of scope,
/// including on early return or timeout.
pub(crate) struct ScopedConnection {
    pub(crate) client: Client,
    task: JoinHandle<()>,
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// PostgreSQL executor opening one connection per call.
///
/// Scoring is read-only and sequential, so there is no pool; each statement
/// sees a fresh session and nothing leaks between queries.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    config: DatabaseConfig,
}

impl PgExecutor {
    /// Create executor.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection settings and query timeout
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open a connection and drive it on a background task.
    pub(crate) async fn connect(
        &self,
    ) -> std::result::Result<ScopedConnection, tokio_postgres::Error> {
        let span = db_span(DbOperation::Connect, Some(&self.config.dbname));
        let (client, connection) = self
            .config
            .to_pg_config()
            .connect(NoTls)
            .instrument(span)
            .await?;

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "connection closed with error");
            }
        });

        Ok(ScopedConnection { client, task })
    }

    async fn run(&self, sql: &str) -> Execution {
        let conn = self
            .connect()
            .await
            .map_err(|e| ExecutionFailure::Connection(e.to_string()))?;

        // Leading statements of a batch run for effect; the last one's rows
        // are the result.
        let statements = split_statements(sql);
        let (leading, last) = match statements.split_last() {
            Some((last, leading)) if !leading.is_empty() => (leading, last.as_str()),
            _ => (&statements[..0], sql),
        };
        for statement in leading {
            conn.client
                .batch_execute(statement)
                .await
                .map_err(classify)?;
        }

        // Preparing first gives column names even for zero-row results.
        let statement = conn.client.prepare(last).await.map_err(classify)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = conn
            .client
            .query(&statement, &[])
            .await
            .map_err(classify)?;
        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(TabularResult::new(columns, rows))
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Execution {
        let span = db_query_span(sql, Some(&self.config.dbname));

        async move {
            // Server-side statement_timeout fires first; this bounds the
            // connect and a wedged socket.
            let limit = self.config.query_timeout + self.config.connect_timeout;
            let result = match tokio::time::timeout(limit, self.run(sql)).await {
                Ok(result) => result,
                Err(_) => Err(ExecutionFailure::Timeout(format!(
                    "no response within {}s",
                    limit.as_secs()
                ))),
            };

            match &result {
                Ok(table) => record_db_metrics(table.row_count()),
                Err(failure) => {
                    record_db_error(failure.kind());
                    tracing::warn!(error = %failure, "query failed");
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn ping(&self) -> Result<()> {
        let span = db_span(DbOperation::Ping, Some(&self.config.dbname));

        async move {
            let conn = self
                .connect()
                .await
                .map_err(|e| EvalError::Connection(e.to_string()))?;
            conn.client
                .simple_query("SELECT 1")
                .await
                .map_err(|e| EvalError::Connection(e.to_string()))?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Map a driver error onto the failure taxonomy.
fn classify(error: tokio_postgres::Error) -> ExecutionFailure {
    match error.as_db_error() {
        Some(db) => classify_code(db.code(), db.message().to_string()),
        None => ExecutionFailure::Connection(error.to_string()),
    }
}

fn classify_code(code: &SqlState, message: String) -> ExecutionFailure {
    if code == &SqlState::SYNTAX_ERROR {
        ExecutionFailure::Syntax(message)
    } else if code == &SqlState::UNDEFINED_TABLE
        || code == &SqlState::UNDEFINED_COLUMN
        || code == &SqlState::UNDEFINED_FUNCTION
    {
        ExecutionFailure::MissingRelation(message)
    } else if code == &SqlState::INSUFFICIENT_PRIVILEGE {
        ExecutionFailure::PermissionDenied(message)
    } else if code == &SqlState::QUERY_CANCELED {
        ExecutionFailure::Timeout(message)
    } else if code == &SqlState::ADMIN_SHUTDOWN || code == &SqlState::CONNECTION_FAILURE {
        ExecutionFailure::Connection(message)
    } else {
        ExecutionFailure::Sql(format!("{} ({})", message, code.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            // Reserved port; nothing listens here
            port: 1,
            dbname: "crm".to_string(),
            user: "eval".to_string(),
            password: None,
            connect_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_sqlstate_classification() {
        let classify = |code: &SqlState| classify_code(code, "boom".to_string());

        assert_eq!(
            classify(&SqlState::SYNTAX_ERROR),
            ExecutionFailure::Syntax("boom".into())
        );
        assert_eq!(
            classify(&SqlState::UNDEFINED_TABLE),
            ExecutionFailure::MissingRelation("boom".into())
        );
        assert_eq!(
            classify(&SqlState::UNDEFINED_COLUMN),
            ExecutionFailure::MissingRelation("boom".into())
        );
        assert_eq!(
            classify(&SqlState::INSUFFICIENT_PRIVILEGE),
            ExecutionFailure::PermissionDenied("boom".into())
        );
        // statement_timeout cancels with 57014
        assert_eq!(
            classify(&SqlState::from_code("57014")),
            ExecutionFailure::Timeout("boom".into())
        );
        assert_eq!(
            classify(&SqlState::ADMIN_SHUTDOWN),
            ExecutionFailure::Connection("boom".into())
        );
        assert_eq!(
            classify(&SqlState::DIVISION_BY_ZERO),
            ExecutionFailure::Sql("boom (22012)".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_database_is_scored_failure() {
        let executor = PgExecutor::new(unreachable_config());

        let result = executor.execute("SELECT 1").await;
        assert!(matches!(result, Err(ExecutionFailure::Connection(_))));
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_ping() {
        let executor = PgExecutor::new(unreachable_config());

        let err = executor.ping().await.unwrap_err();
        assert!(matches!(err, EvalError::Connection(_)));
    }
}
