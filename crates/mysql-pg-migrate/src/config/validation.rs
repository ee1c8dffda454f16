//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::drivers::common::{parse_mysql_ssl_mode, SslMode};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    validate_identifier(&config.source.database)
        .map_err(|e| MigrateError::Config(format!("source.database: {}", e)))?;
    parse_mysql_ssl_mode(&config.source.ssl_mode)?;

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    validate_identifier(&config.target.database)
        .map_err(|e| MigrateError::Config(format!("target.database: {}", e)))?;
    validate_identifier(&config.target.schema)
        .map_err(|e| MigrateError::Config(format!("target.schema: {}", e)))?;
    SslMode::parse(&config.target.ssl_mode)?;

    // Cannot migrate to the same database
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    if config.migration.chunk_size == 0 {
        return Err(MigrateError::Config(
            "migration.chunk_size must be at least 1".into(),
        ));
    }
    if config.migration.statement_delimiter.is_whitespace() {
        return Err(MigrateError::Config(
            "migration.statement_delimiter cannot be whitespace".into(),
        ));
    }

    if config.report.manifest_sheet.trim().is_empty() {
        return Err(MigrateError::Config(
            "report.manifest_sheet cannot be empty".into(),
        ));
    }

    Ok(())
}
