//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MySQL).
    #[serde(default)]
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    #[serde(default)]
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Spreadsheet report configuration.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Source database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database recreated and loaded from the dump.
    #[serde(default = "default_mysql_database")]
    pub database: String,

    /// Username.
    #[serde(default = "default_mysql_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// MySQL ssl mode: disabled, preferred, required, verify_ca, verify_identity.
    #[serde(default = "default_preferred")]
    pub ssl_mode: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_mysql_port(),
            database: default_mysql_database(),
            user: default_mysql_user(),
            password: String::new(),
            ssl_mode: default_preferred(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database recreated and filled by the copier.
    #[serde(default = "default_pg_database")]
    pub database: String,

    /// Username.
    #[serde(default = "default_pg_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema tables are created in and exported from (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_pg_port(),
            database: default_pg_database(),
            user: default_pg_user(),
            password: String::new(),
            schema: default_public_schema(),
            ssl_mode: default_disable(),
        }
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// SQL dump loaded into the source database.
    #[serde(default = "default_dump_file")]
    pub dump_file: PathBuf,

    /// Rows per streamed chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Character the dump is split on.
    #[serde(default = "default_delimiter")]
    pub statement_delimiter: char,

    /// MySQL error numbers the dump loader skips instead of aborting.
    #[serde(default = "default_benign_error_codes")]
    pub benign_error_codes: Vec<u16>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dump_file: default_dump_file(),
            chunk_size: default_chunk_size(),
            statement_delimiter: default_delimiter(),
            benign_error_codes: default_benign_error_codes(),
        }
    }
}

/// Spreadsheet report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Workbook written after the transfer.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Name of the sheet listing every table.
    #[serde(default = "default_manifest_sheet")]
    pub manifest_sheet: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            manifest_sheet: default_manifest_sheet(),
        }
    }
}

/// MySQL error numbers treated as benign while loading a dump.
///
/// - 1007 database exists
/// - 1050 table exists
/// - 1060 duplicate column name
/// - 1061 duplicate key name
/// - 1065 query was empty (a fragment holding only comments)
/// - 1205 lock wait timeout
/// - 1304 procedure/function exists
/// - 1359 trigger exists
/// - 1826 duplicate foreign key constraint name
pub const DEFAULT_BENIGN_ERROR_CODES: &[u16] = &[1007, 1050, 1060, 1061, 1065, 1205, 1304, 1359, 1826];

// Default value functions for serde
fn default_host() -> String {
    "localhost".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_mysql_database() -> String {
    "batest".to_string()
}

fn default_pg_database() -> String {
    "batest_postgresql".to_string()
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_preferred() -> String {
    "preferred".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_dump_file() -> PathBuf {
    PathBuf::from("batest.sql")
}

fn default_chunk_size() -> usize {
    100
}

fn default_delimiter() -> char {
    ';'
}

fn default_benign_error_codes() -> Vec<u16> {
    DEFAULT_BENIGN_ERROR_CODES.to_vec()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output.xlsx")
}

fn default_manifest_sheet() -> String {
    "All tables".to_string()
}
