//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{connection_error, ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{QueryFormError, Result};
use async_trait::async_trait;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{
    Column, ConnectOptions, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::time::Instant;
use tracing::debug;

/// Opens connections to a PostgreSQL server.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    config: ConnectionConfig,
    options: PgConnectOptions,
}

impl PostgresConnector {
    /// Creates a connector from the host, port, database and credentials in the config.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let database = config
            .database
            .as_deref()
            .ok_or_else(|| QueryFormError::config("Database name is required"))?;

        let mut options = PgConnectOptions::new()
            .host(config.host.as_deref().unwrap_or("localhost"))
            .port(config.port)
            .database(database);
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Ok(Self {
            config: config.clone(),
            options,
        })
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        debug!("Opening PostgreSQL connection to {}", self.describe());
        let conn = self
            .options
            .connect()
            .await
            .map_err(|e| connection_error(e, &self.config))?;
        Ok(Box::new(PostgresClient::new(conn)))
    }

    fn describe(&self) -> String {
        self.config.display_string()
    }
}

/// One open PostgreSQL connection.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

impl PostgresClient {
    /// Wraps an already open connection.
    pub fn new(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
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

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            // Preparing describes the result columns without running the query again.
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

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// A non-NULL value never becomes [`Value::Null`]: when no typed decoder applies,
/// the raw bytes are kept.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    decode_typed(row, index, type_name).unwrap_or_else(|| {
        debug!("No decoder for PostgreSQL type {type_name}; keeping raw bytes");
        row.try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or_else(|_| Value::String(format!("<{type_name}>")))
    })
}

fn decode_typed(row: &PgRow, index: usize, type_name: &str) -> Option<Value> {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => Value::Bool(row.try_get(index).ok()?),
        "INT2" | "SMALLINT" => Value::Int(row.try_get::<i16, _>(index).ok()?.into()),
        "INT4" | "INT" | "INTEGER" => Value::Int(row.try_get::<i32, _>(index).ok()?.into()),
        "INT8" | "BIGINT" => Value::Int(row.try_get(index).ok()?),
        "OID" => Value::Int(row.try_get::<Oid, _>(index).ok()?.0.into()),
        "FLOAT4" | "REAL" => Value::Float(row.try_get::<f32, _>(index).ok()?.into()),
        "FLOAT8" | "DOUBLE PRECISION" => Value::Float(row.try_get(index).ok()?),
        "NUMERIC" => Value::String(row.try_get::<Decimal, _>(index).ok()?.to_string()),
        "BYTEA" => Value::Bytes(row.try_get(index).ok()?),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index).ok()?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index).ok()?.to_string()),
        "TIMESTAMP" => Value::String(row.try_get::<NaiveDateTime, _>(index).ok()?.to_string()),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index).ok()?.to_rfc3339()),
        "INTERVAL" => Value::String(format_interval(&row.try_get::<PgInterval, _>(index).ok()?)),
        "UUID" => Value::String(row.try_get::<Uuid, _>(index).ok()?.to_string()),
        "JSON" | "JSONB" => Value::String(row.try_get::<JsonValue, _>(index).ok()?.to_string()),
        // Everything else is shown as text when it decodes as text.
        _ => Value::String(row.try_get(index).ok()?),
    };
    Some(value)
}

/// Renders an interval the way psql prints it, e.g. `1 mon 2 days 03:04:05.5`.
fn format_interval(interval: &PgInterval) -> String {
    fn plural(n: i32, unit: &str) -> String {
        if n.unsigned_abs() == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(plural(years, "year"));
    }
    if months != 0 {
        parts.push(plural(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(plural(interval.days, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            time.push('.');
            time.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Formats a query error with PostgreSQL detail and hint lines when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }
    }

    result
}
