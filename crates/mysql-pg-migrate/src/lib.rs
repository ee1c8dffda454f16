//! # mysql-pg-migrate
//!
//! MySQL to PostgreSQL migration library.
//!
//! The pipeline replays a SQL dump into a freshly created MySQL database,
//! copies every table into a freshly created PostgreSQL database, and
//! exports the result to an xlsx workbook:
//!
//! - **Dump loading** with a configurable set of benign error numbers
//! - **Chunked streaming** using the PostgreSQL COPY protocol
//! - **camelCase column names** on the target
//! - **Workbook export** with a table manifest sheet
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> mysql_pg_migrate::Result<()> {
//!     let mut config = Config::load("config.yaml")?;
//!     config.apply_env();
//!     let orchestrator = Orchestrator::new(config)?;
//!     let result = orchestrator.run().await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod report;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, ReportConfig, SourceConfig, TargetConfig};
pub use core::{normalize, ColumnNameMapping, SqlValue};
pub use drivers::{ConnectionManager, DatabaseHandle, Engine, MysqlHandle, PostgresHandle};
pub use error::{MigrateError, Result};
pub use loader::{BenignErrors, BulkScriptLoader, LoadStats};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator};
pub use report::{ReportExporter, ReportSummary};
pub use transfer::{CopyStats, StreamingCopier, TableCopyStats};
