//! Schema introspection from `information_schema`.

use crate::db::executor::PgExecutor;
use crate::otel::{db_span, record_db_metrics, DbOperation};
use crate::types::{EvalError, Result};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

// Base tables and views alike
const TABLES_QUERY: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = 'public' \
     ORDER BY table_name";

const COLUMNS_QUERY: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position";

/// Column name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// One table with its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Tables of the `public` schema, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look up a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Rename a table.
    ///
    /// # Returns
    ///
    /// `true` if the table existed
    pub fn rename_table(&mut self, from: &str, to: &str) -> bool {
        match self.tables.iter_mut().find(|t| t.name.eq_ignore_ascii_case(from)) {
            Some(table) => {
                table.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Rename a column in whichever tables carry it.
    ///
    /// # Returns
    ///
    /// Number of tables changed
    pub fn rename_column(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        for table in &mut self.tables {
            if let Some(column) = table
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(from))
            {
                column.name = to.to_string();
                changed += 1;
            }
        }
        changed
    }
}

impl PgExecutor {
    /// Read table and column names of the `public` schema.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Connection` if the database is unreachable, or
    /// `EvalError::SchemaError` if `information_schema` cannot be read
    pub async fn fetch_schema(&self) -> Result<DatabaseSchema> {
        let span = db_span(DbOperation::Introspect, Some(&self.config().dbname));

        async move {
            let conn = self
                .connect()
                .await
                .map_err(|e| EvalError::Connection(e.to_string()))?;

            let table_rows = conn
                .client
                .query(TABLES_QUERY, &[])
                .await
                .map_err(|e| EvalError::SchemaError(e.to_string()))?;

            let columns_statement = conn
                .client
                .prepare(COLUMNS_QUERY)
                .await
                .map_err(|e| EvalError::SchemaError(e.to_string()))?;

            let mut tables = Vec::with_capacity(table_rows.len());
            for row in &table_rows {
                let name: String = row
                    .try_get(0)
                    .map_err(|e| EvalError::SchemaError(e.to_string()))?;

                let columns = conn
                    .client
                    .query(&columns_statement, &[&name])
                    .await
                    .map_err(|e| EvalError::SchemaError(e.to_string()))?
                    .iter()
                    .map(|r| {
                        Ok(ColumnInfo::new(
                            r.try_get::<_, String>(0)?,
                            r.try_get::<_, String>(1)?,
                        ))
                    })
                    .collect::<std::result::Result<Vec<_>, tokio_postgres::Error>>()
                    .map_err(|e| EvalError::SchemaError(e.to_string()))?;

                tables.push(TableSchema::new(name, columns));
            }

            record_db_metrics(tables.len());
            tracing::debug!(tables = tables.len(), "schema introspected");

            Ok(DatabaseSchema::new(tables))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> DatabaseSchema {
        DatabaseSchema::new(vec![TableSchema::new(
            "customers",
            vec![
                ColumnInfo::new("id", "integer"),
                ColumnInfo::new("name", "character varying"),
                ColumnInfo::new("city", "character varying"),
                ColumnInfo::new("signup_date", "date"),
            ],
        )])
    }

    #[test]
    fn test_table_lookup_case_insensitive() {
        let schema = customers();
        assert!(schema.table("Customers").is_some());
        assert!(schema.table("orders").is_none());
    }

    #[test]
    fn test_rename_table_and_column() {
        let mut schema = customers();

        assert!(schema.rename_table("customers", "clients"));
        assert!(!schema.rename_table("orders", "purchases"));
        assert_eq!(schema.rename_column("signup_date", "joined_on"), 1);
        assert_eq!(schema.rename_column("missing", "x"), 0);

        let table = schema.table("clients").unwrap();
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["id", "name", "city", "joined_on"]
        );
    }

    #[test]
    fn test_schema_serializes() {
        let json = serde_json::to_string(&customers()).unwrap();
        let back: DatabaseSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, customers());
    }
}
