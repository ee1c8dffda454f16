//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors (bad YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection failures.
pub const EXIT_CONNECTIVITY_ERROR: u8 = 2;
/// Exit code for a fatal dump statement failure.
pub const EXIT_STATEMENT_ERROR: u8 = 3;
/// Exit code for a failed table transfer.
pub const EXIT_TRANSFER_ERROR: u8 = 4;
/// Exit code for report export failures.
pub const EXIT_EXPORT_ERROR: u8 = 5;
/// Exit code for misuse of a database handle.
pub const EXIT_HANDLE_ERROR: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection refused, authentication failure or unknown database.
    #[error("Cannot connect to {engine}: {message}")]
    Connectivity { engine: String, message: String },

    /// A statement failed on the source engine.
    ///
    /// `code` is the server error number when the failure came from the server.
    #[error("Statement failed{}: {message}", .code.map(|c| format!(" (error {})", c)).unwrap_or_default())]
    Statement { code: Option<u16>, message: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Reading the target or writing the workbook failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Workbook serialization error
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A handle was used outside the scope it was opened for.
    #[error("Invalid handle use: {0}")]
    InvalidHandle(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connectivity error for the named engine.
    pub fn connectivity(engine: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connectivity {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    /// Create a Statement error.
    pub fn statement(code: Option<u16>, message: impl Into<String>) -> Self {
        MigrateError::Statement {
            code,
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Re-tag any error raised while moving `table` as a Transfer error.
    ///
    /// Errors that already name a table are returned unchanged.
    pub fn into_transfer(self, table: &str) -> Self {
        match self {
            MigrateError::Transfer { .. } => self,
            other => MigrateError::transfer(table, other.to_string()),
        }
    }

    /// Server error number carried by a Statement error.
    pub fn statement_code(&self) -> Option<u16> {
        match self {
            MigrateError::Statement { code, .. } => *code,
            _ => None,
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connectivity { .. } => EXIT_CONNECTIVITY_ERROR,
            MigrateError::Statement { .. } => EXIT_STATEMENT_ERROR,
            MigrateError::Transfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Export(_) | MigrateError::Xlsx(_) => EXIT_EXPORT_ERROR,
            MigrateError::InvalidHandle(_) => EXIT_HANDLE_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_display_includes_code() {
        let err = MigrateError::statement(Some(1050), "Table 'users' already exists");
        assert_eq!(
            err.to_string(),
            "Statement failed (error 1050): Table 'users' already exists"
        );

        let err = MigrateError::statement(None, "connection reset");
        assert_eq!(err.to_string(), "Statement failed: connection reset");
    }

    #[test]
    fn test_into_transfer_keeps_existing_table() {
        let err = MigrateError::transfer("orders", "COPY failed").into_transfer("users");
        match err {
            MigrateError::Transfer { table, .. } => assert_eq!(table, "orders"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = MigrateError::statement(Some(2013), "lost connection").into_transfer("users");
        match err {
            MigrateError::Transfer { table, message } => {
                assert_eq!(table, "users");
                assert!(message.contains("lost connection"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            MigrateError::connectivity("mysql", "refused").exit_code(),
            EXIT_CONNECTIVITY_ERROR
        );
        assert_eq!(
            MigrateError::statement(Some(1064), "syntax").exit_code(),
            EXIT_STATEMENT_ERROR
        );
        assert_eq!(
            MigrateError::transfer("t", "boom").exit_code(),
            EXIT_TRANSFER_ERROR
        );
        assert_eq!(MigrateError::Export("x".into()).exit_code(), EXIT_EXPORT_ERROR);
        assert_eq!(
            MigrateError::InvalidHandle("x".into()).exit_code(),
            EXIT_HANDLE_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "batest.sql");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: batest.sql"));
    }
}
