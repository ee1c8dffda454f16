//! Connection lifecycle for PostgreSQL.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::quote_pg;
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

pub(crate) const ENGINE: &str = "postgresql";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One open PostgreSQL connection.
///
/// The connection future runs on a spawned task that is joined on
/// [`PostgresHandle::close`].
pub struct PostgresHandle {
    pub(super) client: Client,
    connection: JoinHandle<()>,
    database: Option<String>,
    pub(super) schema: String,
}

impl PostgresHandle {
    /// Connect and verify the connection with `SELECT 1`.
    ///
    /// Without a database the `postgres` maintenance database is used and
    /// the handle only accepts DDL.
    pub async fn connect(config: &TargetConfig, database: Option<&str>) -> Result<Self> {
        let tls = TlsBuilder::parse(&config.ssl_mode)?.build()?;

        let mut pg_config: tokio_postgres::Config = config
            .connection_string(database)
            .parse()
            .map_err(|e| MigrateError::Config(format!("invalid target connection: {}", e)))?;
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let (client, connection) = match tls {
            Some(tls) => {
                let (client, conn) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| MigrateError::connectivity(ENGINE, e))?;
                (client, tokio::spawn(drive(conn)))
            }
            None => {
                let (client, conn) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| MigrateError::connectivity(ENGINE, e))?;
                (client, tokio::spawn(drive(conn)))
            }
        };

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host,
            config.port,
            database.unwrap_or("postgres")
        );

        Ok(Self {
            client,
            connection,
            database: database.map(str::to_string),
            schema: config.schema.clone(),
        })
    }

    /// Database this handle was opened against, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub(crate) fn require_database(&self) -> Result<&str> {
        self.database.as_deref().ok_or_else(|| {
            MigrateError::InvalidHandle(
                "PostgreSQL handle was opened without a database and only accepts DDL".into(),
            )
        })
    }

    /// Drop and create `name` in autocommit mode.
    pub(crate) async fn recreate(&mut self, name: &str) -> Result<()> {
        if let Some(db) = &self.database {
            return Err(MigrateError::InvalidHandle(format!(
                "cannot recreate '{}' from a handle bound to '{}'",
                name, db
            )));
        }
        // Each statement is its own simple query: CREATE DATABASE refuses to
        // run inside the implicit transaction of a multi-statement string.
        for stmt in recreate_statements(name)? {
            debug!("PostgreSQL DDL: {}", stmt);
            self.client
                .simple_query(&stmt)
                .await
                .map_err(|e| MigrateError::statement(None, e.to_string()))?;
        }
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&mut self) -> Result<()> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;
        Ok(())
    }

    /// Close the client and wait for the connection task to finish.
    pub async fn close(self) -> Result<()> {
        drop(self.client);
        self.connection
            .await
            .map_err(|e| MigrateError::connectivity(ENGINE, e))?;
        debug!("Closed PostgreSQL connection");
        Ok(())
    }
}

async fn drive<F>(connection: F)
where
    F: std::future::Future<Output = std::result::Result<(), tokio_postgres::Error>>,
{
    if let Err(e) = connection.await {
        warn!("PostgreSQL connection error: {}", e);
    }
}

/// The DROP/CREATE pair used to reset a database.
pub fn recreate_statements(name: &str) -> Result<[String; 2]> {
    let quoted = quote_pg(name)?;
    Ok([
        format!("DROP DATABASE IF EXISTS {}", quoted),
        format!("CREATE DATABASE {}", quoted),
    ])
}
