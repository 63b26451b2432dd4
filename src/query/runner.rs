//! Query execution with optional result memoization.
//!
//! Each run opens its own connection, executes the SQL, and releases the
//! connection before returning, whether the query succeeded or not.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::db::{Connector, QueryResult};
use crate::error::Result;
use crate::query::QueryCache;

/// Runs caller-supplied SQL against a database.
pub struct QueryRunner {
    connector: Arc<dyn Connector>,
    cache: Option<QueryCache>,
}

impl QueryRunner {
    /// Creates a runner that always queries the database.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            cache: None,
        }
    }

    /// Creates a runner that serves repeated query strings from its own cache.
    pub fn with_cache(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            cache: Some(QueryCache::new()),
        }
    }

    /// Creates a runner, caching when `cache_enabled` is set.
    pub fn from_settings(connector: Arc<dyn Connector>, cache_enabled: bool) -> Self {
        if cache_enabled {
            Self::with_cache(connector)
        } else {
            Self::new(connector)
        }
    }

    /// Returns true if results are memoized.
    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Description of the database target, safe to display.
    pub fn target(&self) -> String {
        self.connector.describe()
    }

    /// Executes `sql` and returns its result table.
    ///
    /// With caching enabled, a string seen before is answered from memory without
    /// connecting. Failures are never cached.
    pub async fn run(&self, sql: &str) -> Result<QueryOutcome> {
        if let Some(cache) = &self.cache {
            if let Some(result) = cache.get(sql).await {
                debug!("Serving query from cache");
                return Ok(QueryOutcome {
                    result,
                    from_cache: true,
                });
            }
        }

        let start = Instant::now();
        let result = Arc::new(self.execute_scoped(sql).await?);
        let elapsed = start.elapsed();
        info!("Query returned {} rows in {:?}", result.row_count, elapsed);

        if let Some(cache) = &self.cache {
            cache.insert(sql, Arc::clone(&result)).await;
        }

        Ok(QueryOutcome {
            result,
            from_cache: false,
        })
    }

    /// Drops all memoized results. Returns the number of entries removed.
    pub async fn clear_cache(&self) -> usize {
        match &self.cache {
            Some(cache) => {
                let removed = cache.clear().await;
                info!("Cleared {} cached queries", removed);
                removed
            }
            None => 0,
        }
    }

    /// Number of memoized query strings.
    pub async fn cached_queries(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.len().await,
            None => 0,
        }
    }

    /// Opens a connection, runs the query, and closes the connection on every path.
    async fn execute_scoped(&self, sql: &str) -> Result<QueryResult> {
        let mut client = match self.connector.connect().await {
            Ok(client) => client,
            Err(e) => {
                warn!("Could not connect to {}: {}", self.connector.describe(), e);
                return Err(e);
            }
        };

        let result = client.execute_query(sql).await;

        if let Err(e) = client.close().await {
            warn!("Failed to release connection: {}", e);
        }

        if let Err(e) = &result {
            warn!("Query failed: {}", e);
        }
        result
    }
}

/// Successful query execution outcome.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// The result table, shared with the cache when caching is enabled.
    pub result: Arc<QueryResult>,
    /// Whether the result came from the cache.
    pub from_cache: bool,
}
