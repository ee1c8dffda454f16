//! Seams between the pipeline stages and the database drivers.
//!
//! - [`ScriptExecutor`]: runs dump statements against the source
//! - [`SourceReader`]: discovers and streams source tables
//! - [`TargetWriter`]: creates and appends to target tables
//! - [`ReportSource`]: lists and reads target tables for the workbook
//!
//! The MySQL and PostgreSQL handles implement these; tests use in-memory mocks.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::{SourceRow, TableData, TableDescriptor};
use super::value::Row;

/// Execute one SQL statement.
#[async_trait]
pub trait ScriptExecutor: Send {
    /// Run a single statement.
    ///
    /// Server failures are reported as `MigrateError::Statement` with the
    /// server's error number, so callers can classify them.
    async fn execute(&mut self, statement: &str) -> Result<()>;
}

/// Read tables from the source database.
#[async_trait]
pub trait SourceReader: Send {
    /// List every table and view with its columns, ordered by table name.
    async fn list_tables(&mut self) -> Result<Vec<TableDescriptor>>;

    /// Build the full-scan query for a table.
    fn select_all_sql(&self, table: &TableDescriptor) -> Result<String>;

    /// Stream rows for `sql` one at a time.
    ///
    /// Rows are pulled from the server as the stream is polled; nothing is
    /// buffered beyond what the driver holds for the current row.
    fn fetch_rows<'a>(&'a mut self, sql: &'a str) -> BoxStream<'a, Result<SourceRow>>;
}

/// Write rows to the target database.
#[async_trait]
pub trait TargetWriter: Send {
    /// Append rows to `table`, creating it first when it does not exist.
    ///
    /// A created table takes its column types from `rows`. Returns the number
    /// of rows written.
    async fn create_or_append(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
    ) -> Result<u64>;
}

/// Read back target tables for export.
#[async_trait]
pub trait ReportSource: Send {
    /// Table names in the target schema, ordered by name.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Every column and row of one table.
    async fn fetch_table(&mut self, table: &str) -> Result<TableData>;
}
