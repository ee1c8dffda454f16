//! Migration orchestrator - sequences the pipeline stages.
//!
//! Stages run strictly one after another:
//!
//! 1. recreate the source database and load the dump into it
//! 2. recreate the target database
//! 3. stream every source table into the target
//! 4. export the target to the workbook
//!
//! Every handle is closed by the stage that opened it, on success and on
//! failure.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::drivers::{ConnectionManager, Engine, MysqlHandle, PostgresHandle};
use crate::error::Result;
use crate::loader::{BulkScriptLoader, LoadStats, SkippedStatement};
use crate::report::{ReportExporter, ReportSummary};
use crate::transfer::{CopyStats, StreamingCopier, TableCopyStats};

/// Runs the whole migration.
pub struct Orchestrator {
    config: Config,
    connections: ConnectionManager,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub source_database: String,
    pub target_database: String,

    /// Dump statements sent to the source.
    pub statements_attempted: usize,
    pub statements_executed: usize,
    /// Dump statements that failed with a benign error.
    pub statements_skipped: Vec<SkippedStatement>,

    pub tables_total: usize,
    pub rows_transferred: u64,
    pub rows_per_second: u64,
    pub table_stats: Vec<TableCopyStats>,

    /// Workbook written by the export stage.
    pub report_path: PathBuf,
    pub report_sheets: usize,
}

impl MigrationResult {
    fn new(
        run_id: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        config: &Config,
        load: LoadStats,
        copy: CopyStats,
        report: ReportSummary,
    ) -> Self {
        let duration_seconds = elapsed.as_secs_f64();
        let rows_transferred = copy.total_rows();
        let rows_per_second = if duration_seconds > 0.0 {
            (rows_transferred as f64 / duration_seconds) as u64
        } else {
            0
        };

        Self {
            run_id,
            status: "completed".to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds,
            source_database: config.source.database.clone(),
            target_database: config.target.database.clone(),
            statements_attempted: load.attempted,
            statements_executed: load.executed,
            statements_skipped: load.skipped,
            tables_total: copy.tables.len(),
            rows_transferred,
            rows_per_second,
            table_stats: copy.tables,
            report_path: report.path,
            report_sheets: report.sheets.len(),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both servers.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Create an orchestrator from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let connections = ConnectionManager::new(config.source.clone(), config.target.clone());
        Ok(Self {
            config,
            connections,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the migration end to end.
    pub async fn run(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        info!("Phase 1: Recreating source database '{}'", self.config.source.database);
        let admin = self.connections.open(Engine::Mysql, None).await?;
        self.connections
            .recreate_database(admin, &self.config.source.database)
            .await?;

        let mut mysql = self
            .connections
            .open_mysql(Some(&self.config.source.database))
            .await?;
        let staged: Result<(LoadStats, CopyStats, PostgresHandle)> = async {
            let load = self.load_source(&mut mysql).await?;
            let (copy, pg) = self.copy_to_target(&mut mysql).await?;
            Ok((load, copy, pg))
        }
        .await;
        let (load, copy, mut pg) = finish(staged, mysql.close().await)?;

        info!("Phase 4: Exporting report");
        let exporter = ReportExporter::new(self.config.report.manifest_sheet.clone());
        let exported = exporter
            .export(&mut pg, &self.config.report.output_path)
            .await;
        let report = finish(exported, pg.close().await)?;

        let result = MigrationResult::new(
            run_id,
            started_at,
            timer.elapsed(),
            &self.config,
            load,
            copy,
            report,
        );
        info!(
            "Migration completed in {:.2}s: {} tables, {} rows, report at {}",
            result.duration_seconds,
            result.tables_total,
            result.rows_transferred,
            result.report_path.display()
        );
        Ok(result)
    }

    async fn load_source(&self, mysql: &mut MysqlHandle) -> Result<LoadStats> {
        info!("Phase 2: Loading dump {}", self.config.migration.dump_file.display());
        BulkScriptLoader::from_config(&self.config.migration)
            .load_file(&self.config.migration.dump_file, mysql)
            .await
    }

    /// Recreate the target, then copy every table into it.
    ///
    /// The returned handle is still open and bound to the target database.
    async fn copy_to_target(&self, mysql: &mut MysqlHandle) -> Result<(CopyStats, PostgresHandle)> {
        info!("Phase 3: Recreating target database '{}'", self.config.target.database);
        let admin = self.connections.open(Engine::Postgres, None).await?;
        self.connections
            .recreate_database(admin, &self.config.target.database)
            .await?;

        let mut pg = self
            .connections
            .open_postgres(Some(&self.config.target.database))
            .await?;
        let copier = StreamingCopier::new(self.config.migration.chunk_size);
        match copier.copy_all(mysql, &mut pg).await {
            Ok(stats) => Ok((stats, pg)),
            Err(e) => finish(Err(e), pg.close().await),
        }
    }

    /// Connect to both servers without a database and measure latency.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let (source_latency_ms, source_error) = self.probe(Engine::Mysql).await;
        let (target_latency_ms, target_error) = self.probe(Engine::Postgres).await;

        Ok(HealthCheckResult {
            source_connected: source_error.is_none(),
            source_latency_ms,
            target_connected: target_error.is_none(),
            target_latency_ms,
            healthy: source_error.is_none() && target_error.is_none(),
            source_error,
            target_error,
        })
    }

    async fn probe(&self, engine: Engine) -> (u64, Option<String>) {
        let start = Instant::now();
        let outcome: Result<()> = async {
            let mut handle = self.connections.open(engine, None).await?;
            let pinged = handle.ping().await;
            finish(pinged, handle.close().await)
        }
        .await;
        let latency = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                info!("{} reachable ({}ms)", engine, latency);
                (latency, None)
            }
            Err(e) => {
                warn!("{} unreachable: {}", engine, e);
                (latency, Some(e.to_string()))
            }
        }
    }
}

/// Combine a stage result with the result of closing its handle.
///
/// The stage error wins; a close error is reported only when the stage
/// itself succeeded.
fn finish<T>(result: Result<T>, closed: Result<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Error closing connection after failure: {}", close_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::report::SheetSummary;

    #[test]
    fn test_finish_prefers_stage_error() {
        let r: Result<()> = finish(
            Err(MigrateError::transfer("t", "boom")),
            Err(MigrateError::connectivity("postgresql", "closed")),
        );
        assert!(matches!(r, Err(MigrateError::Transfer { .. })));

        let r: Result<u8> = finish(Ok(1), Err(MigrateError::connectivity("mysql", "closed")));
        assert!(matches!(r, Err(MigrateError::Connectivity { .. })));

        assert_eq!(finish(Ok(7), Ok(())).unwrap(), 7);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.migration.chunk_size = 0;
        assert!(matches!(
            Orchestrator::new(config),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_migration_result_json() {
        let config = Config::default();
        let copy = CopyStats {
            tables: vec![TableCopyStats {
                table: "orders".into(),
                rows: 250,
                chunks: 3,
                duration: Duration::from_millis(40),
            }],
        };
        let load = LoadStats {
            attempted: 10,
            executed: 9,
            skipped: vec![SkippedStatement { index: 4, code: 1050 }],
        };
        let report = ReportSummary {
            path: PathBuf::from("output.xlsx"),
            manifest_sheet: "All tables".into(),
            sheets: vec![SheetSummary {
                table: "orders".into(),
                sheet: "orders".into(),
                rows: 250,
            }],
        };
        let result = MigrationResult::new(
            "run-1".into(),
            Utc::now(),
            Duration::from_secs(2),
            &config,
            load,
            copy,
            report,
        );

        assert_eq!(result.rows_transferred, 250);
        assert_eq!(result.rows_per_second, 125);
        assert_eq!(result.tables_total, 1);

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["statements_skipped"][0]["code"], 1050);
        assert_eq!(json["table_stats"][0]["duration"], 40);
        assert_eq!(json["report_path"], "output.xlsx");
    }

    #[tokio::test]
    async fn test_health_check_reports_unreachable_servers() {
        let mut config = Config::default();
        config.source.host = "127.0.0.1".into();
        config.source.port = 1;
        config.source.ssl_mode = "disabled".into();
        config.target.host = "127.0.0.1".into();
        config.target.port = 1;

        let result = Orchestrator::new(config)
            .unwrap()
            .health_check()
            .await
            .unwrap();
        assert!(!result.healthy);
        assert!(!result.source_connected);
        assert!(!result.target_connected);
        assert!(result.source_error.is_some());
        assert!(result.target_error.is_some());
    }

    /// Full pipeline against live servers configured through the environment.
    #[tokio::test]
    #[ignore]
    async fn test_full_run_against_live_servers() {
        let mut config = Config::default();
        config.apply_env();
        let dump = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            dump.path(),
            "CREATE TABLE orders (order_id INT PRIMARY KEY, customer_name VARCHAR(50));\n\
             CREATE TABLE orders (order_id INT PRIMARY KEY);\n\
             INSERT INTO orders VALUES (1, 'Ann'), (2, NULL);\n",
        )
        .unwrap();
        let out = tempfile::tempdir().unwrap();
        config.migration.dump_file = dump.path().to_path_buf();
        config.report.output_path = out.path().join("output.xlsx");

        let result = Orchestrator::new(config).unwrap().run().await.unwrap();
        assert_eq!(result.statements_skipped.len(), 1);
        assert_eq!(result.rows_transferred, 2);
        assert!(result.report_path.exists());
    }
}
