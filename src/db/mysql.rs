//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! for MySQL and MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{connection_error, ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{QueryFormError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue};
use sqlx::{
    Column, ConnectOptions, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::time::Instant;
use tracing::debug;

/// Opens connections to a MySQL server.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: ConnectionConfig,
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    /// Creates a connector from the host, port, database and credentials in the config.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let database = config
            .database
            .as_deref()
            .ok_or_else(|| QueryFormError::config("Database name is required"))?;

        let mut options = MySqlConnectOptions::new()
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
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        debug!("Opening MySQL connection to {}", self.describe());
        let conn = self
            .options
            .connect()
            .await
            .map_err(|e| connection_error(e, &self.config))?;
        Ok(Box::new(MySqlClient::new(conn)))
    }

    fn describe(&self) -> String {
        self.config.display_string()
    }
}

/// One open MySQL connection.
#[derive(Debug)]
pub struct MySqlClient {
    conn: Option<MySqlConnection>,
}

impl MySqlClient {
    /// Wraps an already open connection.
    pub fn new(conn: MySqlConnection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
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

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts one column value. Non-NULL values that no decoder accepts are kept as
/// text when they are valid UTF-8 and as raw bytes otherwise.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    if let Some(value) = decode_typed(row, index, type_name) {
        return value;
    }

    debug!("No decoder for MySQL type {type_name}; keeping raw value");
    if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
        return Value::String(text);
    }
    row.try_get_unchecked::<Vec<u8>, _>(index)
        .map(Value::Bytes)
        .unwrap_or_else(|_| Value::String(format!("<{type_name}>")))
}

fn decode_typed(row: &MySqlRow, index: usize, type_name: &str) -> Option<Value> {
    let type_name = type_name.to_uppercase();
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get(index).ok()?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get(index).ok()?)
        }
        unsigned if unsigned.ends_with(" UNSIGNED") => {
            let n = row.try_get::<u64, _>(index).ok()?;
            i64::try_from(n)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::String(n.to_string()))
        }
        "BIT" => Value::Int(row.try_get::<u64, _>(index).ok()?.try_into().ok()?),
        "FLOAT" => Value::Float(row.try_get::<f32, _>(index).ok()?.into()),
        "DOUBLE" => Value::Float(row.try_get(index).ok()?),
        "DECIMAL" => Value::String(row.try_get::<Decimal, _>(index).ok()?.to_string()),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index).ok()?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index).ok()?.to_string()),
        "DATETIME" => Value::String(row.try_get::<NaiveDateTime, _>(index).ok()?.to_string()),
        "TIMESTAMP" => Value::String(row.try_get::<DateTime<Utc>, _>(index).ok()?.to_rfc3339()),
        "JSON" => Value::String(row.try_get::<JsonValue, _>(index).ok()?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::Bytes(row.try_get(index).ok()?)
        }
        _ => Value::String(row.try_get(index).ok()?),
    };
    Some(value)
}

/// Formats a query error with the MySQL error code when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    match db_error.code() {
        Some(code) => format!("ERROR {code}: {}", db_error.message()),
        None => format!("ERROR: {}", db_error.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests need a running MySQL server and are skipped unless
    // SQLFORM_TEST_MYSQL_URL is set.

    fn get_test_config() -> Option<ConnectionConfig> {
        let url = std::env::var("SQLFORM_TEST_MYSQL_URL").ok()?;
        ConnectionConfig::from_connection_string(&url).ok()
    }

    #[tokio::test]
    async fn test_execute_select_query() {
        let Some(config) = get_test_config() else {
            eprintln!("Skipping test: SQLFORM_TEST_MYSQL_URL not set");
            return;
        };
        let connector = MySqlConnector::new(&config).unwrap();
        let mut client = connector.connect().await.unwrap();

        let result = client
            .execute_query(
                "SELECT 1 AS num, 'hello' AS greeting, NULL AS nothing, \
                        CAST(1.50 AS DECIMAL(4, 2)) AS price, DATE '2024-02-29' AS day",
            )
            .await
            .unwrap();

        assert_eq!(
            result.column_names(),
            vec!["num", "greeting", "nothing", "price", "day"]
        );
        assert_eq!(
            result.rows[0],
            vec![
                Value::Int(1),
                Value::from("hello"),
                Value::Null,
                Value::from("1.50"),
                Value::from("2024-02-29"),
            ]
        );

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_query_with_error() {
        let Some(config) = get_test_config() else {
            eprintln!("Skipping test: SQLFORM_TEST_MYSQL_URL not set");
            return;
        };
        let connector = MySqlConnector::new(&config).unwrap();
        let mut client = connector.connect().await.unwrap();

        let err = client
            .execute_query("SELECT * FROM nonexistent_table_xyz")
            .await
            .unwrap_err();
        assert!(err.message().starts_with("ERROR "));
        assert!(err.message().contains("nonexistent_table_xyz"));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_query_error() {
        let config = ConnectionConfig::from_connection_string("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let connector = MySqlConnector::new(&config).unwrap();

        let err = connector.connect().await.err().unwrap();

        assert_eq!(err.category(), "Query Error");
        assert!(err.message().starts_with("Cannot connect to 127.0.0.1:1."));
    }

    #[test]
    fn test_connector_requires_database() {
        let config = ConnectionConfig::from_connection_string("mysql://app@db").unwrap();
        let err = MySqlConnector::new(&config).unwrap_err();
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_connector_describe_hides_password() {
        let config = ConnectionConfig::from_connection_string("mysql://app:hunter2@db/shop")
            .unwrap();
        let connector = MySqlConnector::new(&config).unwrap();

        assert_eq!(connector.describe(), "shop @ db:3306");
    }
}
