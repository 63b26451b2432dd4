//! Memoized query results.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::QueryResult;

/// Results keyed by the literal SQL text.
///
/// Entries live until [`QueryCache::clear`] is called or the cache is dropped.
/// Nothing is invalidated when the underlying data changes.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, Arc<QueryResult>>>,
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for exactly this SQL text.
    pub async fn get(&self, sql: &str) -> Option<Arc<QueryResult>> {
        self.entries.read().await.get(sql).cloned()
    }

    /// Stores a result, replacing any previous entry for the same text.
    pub async fn insert(&self, sql: impl Into<String>, result: Arc<QueryResult>) {
        self.entries.write().await.insert(sql.into(), result);
    }

    /// Number of cached query strings.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry and returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, Value};

    fn one_row(value: i64) -> Arc<QueryResult> {
        Arc::new(QueryResult::with_data(
            vec![ColumnInfo::new("n", "INTEGER")],
            vec![vec![Value::Int(value)]],
        ))
    }

    #[tokio::test]
    async fn test_keys_are_literal_strings() {
        let cache = QueryCache::new();
        cache.insert("SELECT 1", one_row(1)).await;

        assert!(cache.get("SELECT 1").await.is_some());
        assert!(cache.get("select 1").await.is_none());
        assert!(cache.get("SELECT 1 ").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_entry() {
        let cache = QueryCache::new();
        cache.insert("q", one_row(1)).await;
        cache.insert("q", one_row(2)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("q").await.unwrap().rows[0][0], Value::Int(2));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = QueryCache::new();
        cache.insert("a", one_row(1)).await;
        cache.insert("b", one_row(2)).await;

        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty().await);
    }
}
