//! Database drivers.
//!
//! - [`mysql`]: source engine (sqlx)
//! - [`postgres`]: target engine (tokio-postgres)
//! - [`common`]: TLS settings shared by both
//!
//! Handles are opened through [`ConnectionManager`], which also owns the
//! drop-and-create of whole databases.

pub mod common;
mod manager;
pub mod mysql;
pub mod postgres;

use std::fmt;
use std::str::FromStr;

pub use common::{SslMode, TlsBuilder};
pub use manager::ConnectionManager;
pub use mysql::MysqlHandle;
pub use postgres::PostgresHandle;

use crate::error::{MigrateError, Result};

/// Database engines the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Mysql,
    Postgres,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Mysql => write!(f, "mysql"),
            Engine::Postgres => write!(f, "postgresql"),
        }
    }
}

impl FromStr for Engine {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            other => Err(MigrateError::Config(format!("Unknown engine '{}'", other))),
        }
    }
}

/// An open connection to either engine.
pub enum DatabaseHandle {
    Mysql(MysqlHandle),
    Postgres(PostgresHandle),
}

impl DatabaseHandle {
    pub fn engine(&self) -> Engine {
        match self {
            DatabaseHandle::Mysql(_) => Engine::Mysql,
            DatabaseHandle::Postgres(_) => Engine::Postgres,
        }
    }

    /// Database the handle is bound to, if any.
    pub fn database(&self) -> Option<&str> {
        match self {
            DatabaseHandle::Mysql(h) => h.database(),
            DatabaseHandle::Postgres(h) => h.database(),
        }
    }

    /// Unwrap a MySQL handle.
    pub fn into_mysql(self) -> Result<MysqlHandle> {
        match self {
            DatabaseHandle::Mysql(h) => Ok(h),
            other => Err(MigrateError::InvalidHandle(format!(
                "expected a mysql handle, got {}",
                other.engine()
            ))),
        }
    }

    /// Unwrap a PostgreSQL handle.
    pub fn into_postgres(self) -> Result<PostgresHandle> {
        match self {
            DatabaseHandle::Postgres(h) => Ok(h),
            other => Err(MigrateError::InvalidHandle(format!(
                "expected a postgresql handle, got {}",
                other.engine()
            ))),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self {
            DatabaseHandle::Mysql(h) => h.ping().await,
            DatabaseHandle::Postgres(h) => h.ping().await,
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            DatabaseHandle::Mysql(h) => h.close().await,
            DatabaseHandle::Postgres(h) => h.close().await,
        }
    }
}

impl From<MysqlHandle> for DatabaseHandle {
    fn from(h: MysqlHandle) -> Self {
        DatabaseHandle::Mysql(h)
    }
}

impl From<PostgresHandle> for DatabaseHandle {
    fn from(h: PostgresHandle) -> Self {
        DatabaseHandle::Postgres(h)
    }
}
