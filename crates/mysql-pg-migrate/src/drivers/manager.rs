//! Opening handles and resetting databases.

use tracing::info;

use super::{DatabaseHandle, Engine, MysqlHandle, PostgresHandle};
use crate::config::{SourceConfig, TargetConfig};
use crate::error::Result;

/// Opens handles to the source and target servers.
///
/// Holds only connection settings; every handle it returns is owned by the
/// caller and must be closed by it.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    source: SourceConfig,
    target: TargetConfig,
}

impl ConnectionManager {
    pub fn new(source: SourceConfig, target: TargetConfig) -> Self {
        Self { source, target }
    }

    /// Open a handle to `engine`, optionally bound to `database`.
    ///
    /// # Errors
    ///
    /// Connectivity errors for unreachable hosts, rejected credentials or an
    /// unknown database.
    pub async fn open(&self, engine: Engine, database: Option<&str>) -> Result<DatabaseHandle> {
        Ok(match engine {
            Engine::Mysql => self.open_mysql(database).await?.into(),
            Engine::Postgres => self.open_postgres(database).await?.into(),
        })
    }

    pub async fn open_mysql(&self, database: Option<&str>) -> Result<MysqlHandle> {
        MysqlHandle::connect(&self.source, database).await
    }

    pub async fn open_postgres(&self, database: Option<&str>) -> Result<PostgresHandle> {
        PostgresHandle::connect(&self.target, database).await
    }

    /// Drop `name` if it exists and create it empty.
    ///
    /// The handle must have been opened without a database. It is closed
    /// before returning, whether or not the reset succeeded.
    pub async fn recreate_database(&self, handle: DatabaseHandle, name: &str) -> Result<()> {
        let engine = handle.engine();
        let (result, closed) = match handle {
            DatabaseHandle::Mysql(mut h) => {
                let result = h.recreate(name).await;
                (result, h.close().await)
            }
            DatabaseHandle::Postgres(mut h) => {
                let result = h.recreate(name).await;
                (result, h.close().await)
            }
        };
        result?;
        closed?;
        info!("Recreated {} database '{}'", engine, name);
        Ok(())
    }
}
