//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from a lookup function.
    ///
    /// `DB_HOST` sets both hosts. `password` (or `DB_PASSWORD`) sets both
    /// passwords. Engine-specific keys set one side only. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("DB_HOST") {
            self.source.host = host.clone();
            self.target.host = host;
        }
        if let Some(password) = get("password").or_else(|| get("DB_PASSWORD")) {
            self.source.password = password.clone();
            self.target.password = password;
        }
        if let Some(db) = get("MYSQL_DB_NAME") {
            self.source.database = db;
        }
        if let Some(db) = get("POSTGRESQL_DB_NAME") {
            self.target.database = db;
        }
        if let Some(user) = get("MYSQL_DB_USER") {
            self.source.user = user;
        }
        if let Some(user) = get("POSTGRESQL_DB_USER") {
            self.target.user = user;
        }
    }
}

impl TargetConfig {
    /// Build a connection string for tokio-postgres.
    ///
    /// With `database` unset the `postgres` maintenance database is used.
    pub fn connection_string(&self, database: Option<&str>) -> String {
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={}",
            self.host,
            self.port,
            quote_conn_value(database.unwrap_or("postgres")),
            quote_conn_value(&self.user),
            quote_conn_value(&self.password),
            libpq_ssl_mode(&self.ssl_mode)
        )
    }
}

/// libpq only knows disable/prefer/require in tokio-postgres; stricter modes
/// are handled by our own TLS connector.
fn libpq_ssl_mode(mode: &str) -> &'static str {
    match mode.to_lowercase().as_str() {
        "disable" => "disable",
        "prefer" | "allow" => "prefer",
        _ => "require",
    }
}

fn quote_conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\') {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
