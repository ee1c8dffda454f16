//! Identifier validation and quoting.
//!
//! Table, column and database names cannot be bound as parameters, so every
//! dynamic statement quotes them with the engine's delimiter after checking
//! for empty names, NUL bytes and excessive length.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted (MySQL allows 64, PostgreSQL 63 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// # Errors
///
/// Returns `MigrateError::Config` for empty names, names containing a NUL
/// byte and names longer than 128 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier with double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier with backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// `"schema"."table"` for PostgreSQL.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}
