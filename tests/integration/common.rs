//! Shared fixtures for integration tests.

use sqlform::db::setup;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates the example database in a temp dir and seeds it with `seed`.
pub async fn example_db(seed: &str) -> (PathBuf, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.db");
    setup::create_example_database(&path).await.unwrap();
    if !seed.is_empty() {
        setup::run_seed_script(&path, seed).await.unwrap();
    }
    (path, dir)
}

/// The single-row table used throughout the tests.
pub const ALICE: &str = "INSERT INTO users (id, name, age) VALUES (1, 'Alice', 30);";
