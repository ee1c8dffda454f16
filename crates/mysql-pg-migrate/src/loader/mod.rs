//! Bulk loading of a SQL dump into the source database.
//!
//! The dump is split on a single delimiter character and executed statement
//! by statement. Failures whose server error number is in the configured
//! benign set are logged and skipped; any other failure stops the load.
//!
//! Splitting is lexically naive: a delimiter inside a string literal or a
//! comment splits the statement too.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::core::ScriptExecutor;
use crate::error::{MigrateError, Result};

/// Predicate over statement failures that the loader tolerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenignErrors {
    codes: HashSet<u16>,
}

impl BenignErrors {
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    /// True when `err` is a server error whose number is in the set.
    pub fn is_benign(&self, err: &MigrateError) -> bool {
        err.statement_code()
            .is_some_and(|code| self.codes.contains(&code))
    }
}

impl Default for BenignErrors {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BENIGN_ERROR_CODES.iter().copied())
    }
}

/// A statement that failed with a benign error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStatement {
    /// Zero-based position among the non-blank statements.
    pub index: usize,
    pub code: u16,
}

/// Outcome of a completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Statements sent to the server.
    pub attempted: usize,
    /// Statements that succeeded.
    pub executed: usize,
    /// Statements that failed benignly.
    pub skipped: Vec<SkippedStatement>,
}

/// Split a script on `delimiter`, dropping whitespace-only fragments.
pub fn split_statements(script: &str, delimiter: char) -> impl Iterator<Item = &str> {
    script
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Executes SQL dumps with tolerance for benign failures.
#[derive(Debug, Clone)]
pub struct BulkScriptLoader {
    delimiter: char,
    benign: BenignErrors,
}

impl BulkScriptLoader {
    pub fn new(delimiter: char, benign: BenignErrors) -> Self {
        Self { delimiter, benign }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(
            config.statement_delimiter,
            BenignErrors::new(config.benign_error_codes.iter().copied()),
        )
    }

    /// Execute every statement of `script` in order.
    ///
    /// # Errors
    ///
    /// Returns the first non-benign failure. Statements after it are not run
    /// and statements before it are not rolled back.
    pub async fn load<E>(&self, script: &str, executor: &mut E) -> Result<LoadStats>
    where
        E: ScriptExecutor + ?Sized,
    {
        let mut stats = LoadStats::default();

        for (index, statement) in split_statements(script, self.delimiter).enumerate() {
            stats.attempted += 1;
            match executor.execute(statement).await {
                Ok(()) => stats.executed += 1,
                Err(e) if self.benign.is_benign(&e) => {
                    let code = e.statement_code().unwrap_or_default();
                    warn!(index, code, "Skipping statement: {}", e);
                    stats.skipped.push(SkippedStatement { index, code });
                }
                Err(e) => {
                    debug!(index, "Fatal statement: {}", preview(statement));
                    return Err(e);
                }
            }
        }

        info!(
            "Loaded script: {} statements, {} executed, {} skipped",
            stats.attempted,
            stats.executed,
            stats.skipped.len()
        );
        Ok(stats)
    }

    /// Read a dump from disk and load it.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub async fn load_file<E>(&self, path: &Path, executor: &mut E) -> Result<LoadStats>
    where
        E: ScriptExecutor + ?Sized,
    {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            MigrateError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let script = String::from_utf8_lossy(&bytes);
        info!("Loading dump {} ({} bytes)", path.display(), bytes.len());
        self.load(&script, executor).await
    }
}

fn preview(statement: &str) -> String {
    const MAX: usize = 120;
    match statement.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &statement[..idx]),
        None => statement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;

    /// Records statements and fails those mapped to an error number.
    #[derive(Default)]
    struct MockExecutor {
        seen: Vec<String>,
        failures: HashMap<String, u16>,
    }

    impl MockExecutor {
        fn failing(pairs: &[(&str, u16)]) -> Self {
            Self {
                seen: Vec::new(),
                failures: pairs.iter().map(|(s, c)| (s.to_string(), *c)).collect(),
            }
        }
    }

    #[async_trait]
    impl ScriptExecutor for MockExecutor {
        async fn execute(&mut self, statement: &str) -> Result<()> {
            self.seen.push(statement.to_string());
            match self.failures.get(statement) {
                Some(code) => Err(MigrateError::statement(Some(*code), "mock failure")),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_split_statements_skips_blank_fragments() {
        let parts: Vec<&str> =
            split_statements("CREATE TABLE a (id INT);\n\n ;INSERT INTO a VALUES (1);\n", ';')
                .collect();
        assert_eq!(parts, vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]);
    }

    #[test]
    fn test_split_statements_is_naive_about_literals() {
        let parts: Vec<&str> = split_statements("INSERT INTO a VALUES ('x;y')", ';').collect();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_split_statements_custom_delimiter() {
        let parts: Vec<&str> = split_statements("SELECT 1$ SELECT 2$", '$').collect();
        assert_eq!(parts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_benign_errors() {
        let benign = BenignErrors::default();
        assert!(benign.is_benign(&MigrateError::statement(Some(1050), "exists")));
        assert!(!benign.is_benign(&MigrateError::statement(Some(1064), "syntax")));
        assert!(!benign.is_benign(&MigrateError::statement(None, "io")));
        assert!(!benign.is_benign(&MigrateError::connectivity("mysql", "gone")));
    }

    #[tokio::test]
    async fn test_load_all_statements_succeed() {
        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::default();
        let stats = loader
            .load("CREATE TABLE a (id INT); INSERT INTO a VALUES (1); ", &mut exec)
            .await
            .unwrap();
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.executed, 2);
        assert!(stats.skipped.is_empty());
        assert_eq!(exec.seen.len(), 2);
    }

    #[tokio::test]
    async fn test_load_tolerates_benign_failures() {
        let script = "CREATE TABLE a (id INT);\
                      CREATE TABLE a (id INT);\
                      INSERT INTO a VALUES (1);\
                      CREATE INDEX ix ON a (id);\
                      INSERT INTO a VALUES (2)";
        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::failing(&[
            ("CREATE TABLE a (id INT)", 1050),
            ("CREATE INDEX ix ON a (id)", 1061),
        ]);
        let stats = loader.load(script, &mut exec).await.unwrap();

        assert_eq!(stats.attempted, 5);
        assert_eq!(exec.seen.len(), 5);
        // Both CREATE TABLE statements are identical, so both fail with 1050.
        assert_eq!(stats.executed, 2);
        assert_eq!(
            stats.skipped,
            vec![
                SkippedStatement { index: 0, code: 1050 },
                SkippedStatement { index: 1, code: 1050 },
                SkippedStatement { index: 3, code: 1061 },
            ]
        );
    }

    #[tokio::test]
    async fn test_load_stops_on_fatal_error() {
        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::failing(&[("BROKEN SQL", 1064)]);
        let err = loader
            .load("SELECT 1; BROKEN SQL; SELECT 2", &mut exec)
            .await
            .unwrap_err();

        assert_eq!(err.statement_code(), Some(1064));
        assert_eq!(exec.seen, vec!["SELECT 1", "BROKEN SQL"]);
    }

    #[tokio::test]
    async fn test_configured_set_overrides_defaults() {
        let loader = BulkScriptLoader::new(';', BenignErrors::new([1064]));
        let mut exec = MockExecutor::failing(&[("A", 1064), ("B", 1050)]);
        let err = loader.load("A; B; C", &mut exec).await.unwrap_err();
        assert_eq!(err.statement_code(), Some(1050));
        assert_eq!(exec.seen, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_load_empty_script() {
        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::default();
        let stats = loader.load(" ;\n; ", &mut exec).await.unwrap();
        assert_eq!(stats, LoadStats::default());
        assert!(exec.seen.is_empty());
    }

    #[tokio::test]
    async fn test_load_file_replaces_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"INSERT INTO a VALUES ('\xff');SELECT 1;").unwrap();

        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::default();
        let stats = loader.load_file(file.path(), &mut exec).await.unwrap();

        assert_eq!(stats.executed, 2);
        assert_eq!(exec.seen[0], "INSERT INTO a VALUES ('\u{FFFD}')");
    }

    #[tokio::test]
    async fn test_load_file_missing_is_io_error() {
        let loader = BulkScriptLoader::new(';', BenignErrors::default());
        let mut exec = MockExecutor::default();
        let err = loader
            .load_file(Path::new("/nonexistent/batest.sql"), &mut exec)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
