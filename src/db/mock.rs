//! Mock connectors for testing.
//!
//! Provides in-memory connector implementations that count how often they are used.

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Value};
use crate::error::{QueryFormError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    queries: AtomicUsize,
    closes: AtomicUsize,
}

/// A connector whose connections return predefined results.
///
/// Registered SQL strings get their canned result or error; any other SELECT returns
/// a single text cell echoing the query, and other statements return an empty result.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    responses: Arc<HashMap<String, std::result::Result<QueryResult, String>>>,
    counters: Arc<Counters>,
}

impl MockConnector {
    /// Creates a new mock connector with no canned responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the result returned for an exact SQL string.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.into(), Ok(result));
        self
    }

    /// Registers a database error returned for an exact SQL string.
    pub fn with_error(mut self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.into(), Err(message.into()));
        self
    }

    /// Number of connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Number of queries executed so far.
    pub fn query_count(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient {
            responses: Arc::clone(&self.responses),
            counters: Arc::clone(&self.counters),
            open: true,
        }))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct MockDatabaseClient {
    responses: Arc<HashMap<String, std::result::Result<QueryResult, String>>>,
    counters: Arc<Counters>,
    open: bool,
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        if !self.open {
            return Err(QueryFormError::query("Connection is closed"));
        }
        self.counters.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(response) = self.responses.get(sql) {
            return response.clone().map_err(QueryFormError::query);
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let columns = vec![ColumnInfo::new("result", "text")];
            let rows = vec![vec![Value::String(format!("Mock result for: {}", sql))]];
            Ok(QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1)))
        } else {
            Ok(QueryResult::new().with_execution_time(Duration::from_millis(1)))
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A connector that can never reach its database.
#[derive(Debug, Clone)]
pub struct FailingConnector {
    message: String,
}

impl FailingConnector {
    /// Creates a connector whose every connect attempt fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        Err(QueryFormError::query(self.message.clone()))
    }

    fn describe(&self) -> String {
        "unreachable".to_string()
    }
}
