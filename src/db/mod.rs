//! PostgreSQL boundary: query execution, row decoding, schema introspection.

pub mod decode;
pub mod executor;
pub mod guard;
pub mod schema;

pub use executor::{PgExecutor, QueryExecutor};
pub use guard::is_read_only;
pub use schema::{ColumnInfo, DatabaseSchema, TableSchema};
