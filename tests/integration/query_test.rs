//! Query runner integration tests against real SQLite files.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlform::config::ConnectionConfig;
use sqlform::db::{self, setup, SqliteConnector, Value};
use sqlform::query::QueryRunner;

use super::common::{example_db, ALICE};

#[tokio::test]
async fn test_select_users_returns_seeded_row() {
    let (path, _dir) = example_db(ALICE).await;
    let runner = QueryRunner::new(Arc::new(SqliteConnector::for_path(&path)));

    let outcome = runner.run("SELECT * FROM users").await.unwrap();
    let result = &outcome.result;

    assert_eq!(result.row_count, 1);
    assert_eq!(result.column_names(), vec!["id", "name", "age"]);
    assert_eq!(
        result.record(0).unwrap(),
        vec![
            ("id", &Value::Int(1)),
            ("name", &Value::from("Alice")),
            ("age", &Value::Int(30)),
        ]
    );
}

#[tokio::test]
async fn test_row_count_matches_table_contents() {
    let (path, _dir) = example_db(
        "INSERT INTO users (name, age) VALUES ('Alice', 30), ('Bob', 25), ('Carol', NULL);",
    )
    .await;
    let runner = QueryRunner::new(Arc::new(SqliteConnector::for_path(&path)));

    let outcome = runner
        .run("SELECT name, age FROM users ORDER BY id")
        .await
        .unwrap();

    assert_eq!(outcome.result.row_count, 3);
    assert_eq!(outcome.result.column_names(), vec!["name", "age"]);
    assert_eq!(outcome.result.value(2, "age"), Some(&Value::Null));
}

#[tokio::test]
async fn test_nonexistent_table_fails() {
    let (path, _dir) = example_db(ALICE).await;
    let runner = QueryRunner::with_cache(Arc::new(SqliteConnector::for_path(&path)));

    let err = runner.run("SELECT * FROM nonexistent").await.unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(err.message().contains("nonexistent"));
    assert_eq!(runner.cached_queries().await, 0);
}

#[tokio::test]
async fn test_malformed_sql_fails() {
    let (path, _dir) = example_db(ALICE).await;
    let runner = QueryRunner::new(Arc::new(SqliteConnector::for_path(&path)));

    let err = runner.run("SELEKT name FROM users").await.unwrap_err();

    assert!(err.message().contains("syntax error"));
}

#[tokio::test]
async fn test_cached_result_is_stale_after_write() {
    let (path, _dir) = example_db(ALICE).await;
    let runner = QueryRunner::with_cache(Arc::new(SqliteConnector::for_path(&path)));

    let before = runner.run("SELECT COUNT(*) AS n FROM users").await.unwrap();
    setup::run_seed_script(&path, "INSERT INTO users (name, age) VALUES ('Bob', 25);")
        .await
        .unwrap();
    let cached = runner.run("SELECT COUNT(*) AS n FROM users").await.unwrap();
    let fresh = runner.run("SELECT COUNT(*) AS n  FROM users").await.unwrap();

    assert_eq!(before.result.value(0, "n"), Some(&Value::Int(1)));
    assert!(cached.from_cache);
    assert_eq!(cached.result.value(0, "n"), Some(&Value::Int(1)));
    assert!(!fresh.from_cache);
    assert_eq!(fresh.result.value(0, "n"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_writes_through_runner_are_visible_to_next_query() {
    let (path, _dir) = example_db("").await;
    let runner = QueryRunner::new(Arc::new(SqliteConnector::for_path(&path)));

    let insert = runner
        .run("INSERT INTO users (name, age) VALUES ('Dana', 52)")
        .await
        .unwrap();
    let select = runner.run("SELECT name FROM users").await.unwrap();

    assert!(insert.result.columns.is_empty());
    assert_eq!(select.result.rows, vec![vec![Value::from("Dana")]]);
}

#[tokio::test]
async fn test_connector_from_connection_string() {
    let (path, _dir) = example_db(ALICE).await;
    let config =
        ConnectionConfig::from_connection_string(&format!("sqlite:{}", path.display())).unwrap();
    let runner = QueryRunner::new(db::connector_for(&config).unwrap());

    let outcome = runner.run("SELECT name FROM users").await.unwrap();

    assert_eq!(outcome.result.rows, vec![vec![Value::from("Alice")]]);
    assert!(runner.target().ends_with("example.db (sqlite)"));
}

#[tokio::test]
async fn test_missing_database_file_fails_without_creating_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never-created.db");
    let runner = QueryRunner::new(Arc::new(SqliteConnector::for_path(&path)));

    let err = runner.run("SELECT 1").await.unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(!path.exists());
}
