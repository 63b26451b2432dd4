//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for file-based SQLite databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{QueryFormError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column, ConnectOptions, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Opens connections to a SQLite database file.
///
/// The file must already exist; running a query never creates one.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    /// Creates a connector for the SQLite file named in the config.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| QueryFormError::config("SQLite database path is required"))?;
        Ok(Self::for_path(path))
    }

    /// Creates a connector for the given file.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false);
        Self { path, options }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        debug!("Opening SQLite connection to {}", self.path.display());
        let conn = self.options.connect().await.map_err(|e| {
            QueryFormError::query(format!(
                "Cannot open database {}: {}",
                self.path.display(),
                format_query_error(e)
            ))
        })?;
        Ok(Box::new(SqliteClient::new(conn)))
    }

    fn describe(&self) -> String {
        format!("{} (sqlite)", self.path.display())
    }
}

/// One open SQLite connection.
#[derive(Debug)]
pub struct SqliteClient {
    conn: Option<SqliteConnection>,
}

impl SqliteClient {
    /// Wraps an already open connection.
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| QueryFormError::query("Connection is closed"))?;

        let start = Instant::now();
        let result = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| QueryFormError::query(format_query_error(e)))?;
        let execution_time = start.elapsed();

        // Column metadata comes from the first row; empty results ask the prepared statement.
        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => match (&mut *conn).prepare(sql).await {
                Ok(statement) => statement
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
                Err(_) => Vec::new(),
            },
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| QueryFormError::query(format!("Failed to close connection: {e}")))?;
        }
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single column value using the value's runtime storage class.
///
/// SQLite columns are dynamically typed, so the declared column type is not reliable.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Extracts the database message from a sqlx error.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
