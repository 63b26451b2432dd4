//! Database abstraction layer for sqlform.
//!
//! Provides a trait-based interface for database operations, allowing
//! different database backends to be used interchangeably. A [`Connector`]
//! opens one connection per query; the returned [`DatabaseClient`] owns it
//! until [`DatabaseClient::close`] releases it.

mod mock;
mod mysql;
mod postgres;
pub mod setup;
mod sqlite;
mod types;

pub use mock::{FailingConnector, MockConnector};
pub use mysql::{MySqlClient, MySqlConnector};
pub use postgres::{PostgresClient, PostgresConnector};
pub use sqlite::{SqliteClient, SqliteConnector};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::{QueryFormError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            _ => None,
        }
    }
}

/// Builds the connector for the configured backend.
///
/// Nothing is opened here; connections are made per query.
pub fn connector_for(config: &ConnectionConfig) -> Result<Arc<dyn Connector>> {
    match config.backend {
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteConnector::new(config)?)),
        DatabaseBackend::Postgres => Ok(Arc::new(PostgresConnector::new(config)?)),
        DatabaseBackend::Mysql => Ok(Arc::new(MySqlConnector::new(config)?)),
    }
}

/// Maps a failed connection attempt to a query error.
///
/// Common failures get a short hint first; the driver's own text always follows.
pub(crate) fn connection_error(error: sqlx::Error, config: &ConnectionConfig) -> QueryFormError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let detail = error.to_string();
    let lower = detail.to_lowercase();

    let hint = if lower.contains("connection refused") || lower.contains("could not connect") {
        Some(format!("Cannot connect to {host}:{port}. Check that the server is running."))
    } else if lower.contains("authentication failed") || lower.contains("access denied") {
        Some(format!("Authentication failed for user '{user}'. Check your credentials."))
    } else if lower.contains("unknown database")
        || (lower.contains("does not exist") && lower.contains("database"))
    {
        Some(format!("Database '{database}' does not exist."))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        Some(format!("Connection to {host}:{port} timed out."))
    } else {
        None
    };

    match hint {
        Some(hint) => QueryFormError::query(format!("{hint}\n  {detail}")),
        None => QueryFormError::query(detail),
    }
}

/// Opens database connections on demand.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a fresh connection.
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>>;

    /// Short description of the target, without credentials.
    fn describe(&self) -> String;
}

/// A single open database connection.
///
/// All operations are async and return Results with QueryFormError.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Executes a SQL query and returns the results.
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}
