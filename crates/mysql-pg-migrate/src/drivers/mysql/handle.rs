//! Connection lifecycle and statement execution for MySQL.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::quote_mysql;
use crate::core::ScriptExecutor;
use crate::drivers::common::parse_mysql_ssl_mode;
use crate::error::{MigrateError, Result};

pub(crate) const ENGINE: &str = "mysql";

/// One open MySQL connection.
///
/// A handle opened without a database only accepts DDL.
pub struct MysqlHandle {
    pub(super) conn: MySqlConnection,
    database: Option<String>,
}

impl MysqlHandle {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(config: &SourceConfig, database: Option<&str>) -> Result<Self> {
        let ssl_mode = parse_mysql_ssl_mode(&config.ssl_mode)?;

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode)
            .charset("utf8mb4")
            .disable_statement_logging();
        if let Some(db) = database {
            options = options.database(db);
        }

        let mut conn = options
            .connect()
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;

        sqlx::query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host,
            config.port,
            database.unwrap_or("")
        );

        Ok(Self {
            conn,
            database: database.map(str::to_string),
        })
    }

    /// Database this handle was opened against, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub(crate) fn require_database(&self) -> Result<&str> {
        self.database.as_deref().ok_or_else(|| {
            MigrateError::InvalidHandle(
                "MySQL handle was opened without a database and only accepts DDL".into(),
            )
        })
    }

    /// Drop and create `name`. The handle must not be bound to a database.
    pub(crate) async fn recreate(&mut self, name: &str) -> Result<()> {
        if let Some(db) = &self.database {
            return Err(MigrateError::InvalidHandle(format!(
                "cannot recreate '{}' from a handle bound to '{}'",
                name, db
            )));
        }
        for stmt in recreate_statements(name)? {
            debug!("MySQL DDL: {}", stmt);
            sqlx::raw_sql(&stmt)
                .execute(&mut self.conn)
                .await
                .map_err(statement_error)?;
        }
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&mut self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;
        debug!("Closed MySQL connection");
        Ok(())
    }
}

#[async_trait]
impl ScriptExecutor for MysqlHandle {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.require_database()?;
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(statement))
            .await
            .map_err(statement_error)?;
        Ok(())
    }
}

/// The DROP/CREATE pair used to reset a database.
pub fn recreate_statements(name: &str) -> Result<[String; 2]> {
    let quoted = quote_mysql(name)?;
    Ok([
        format!("DROP DATABASE IF EXISTS {}", quoted),
        format!("CREATE DATABASE {}", quoted),
    ])
}

/// Map a sqlx error to a Statement error carrying the server error number.
pub(crate) fn statement_error(e: sqlx::Error) -> MigrateError {
    let code = match &e {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    };
    MigrateError::statement(code, e.to_string())
}
