//! Example database setup.
//!
//! Creates the SQLite file with the `users` table the form queries by default,
//! and runs optional seed scripts against it.

use crate::error::{QueryFormError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use tracing::info;

/// Schema of the example table.
pub const USERS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT,
    age INTEGER
)";

/// Creates the SQLite file if needed and makes sure the `users` table exists.
pub async fn create_example_database(path: &Path) -> Result<()> {
    ensure_parent_dirs(path)?;

    let mut conn = open(path, true).await?;
    let outcome = sqlx::query(USERS_TABLE_SQL)
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(|e| QueryFormError::query(format!("Failed to create users table: {e}")));
    close(conn).await;
    outcome?;

    info!("Example database ready at {}", path.display());
    Ok(())
}

/// Runs a SQL script (one or more statements) against an existing SQLite file.
pub async fn run_seed_script(path: &Path, script: &str) -> Result<()> {
    let mut conn = open(path, false).await?;
    let outcome = sqlx::raw_sql(script)
        .execute(&mut conn)
        .await
        .map_err(|e| QueryFormError::query(format!("Seed script failed: {e}")));
    close(conn).await;

    let done = outcome?;
    info!(
        "Seed script applied to {} ({} rows affected)",
        path.display(),
        done.rows_affected()
    );
    Ok(())
}

/// Reads a seed file from disk and runs it.
pub async fn run_seed_file(db_path: &Path, seed_path: &Path) -> Result<()> {
    let script = tokio::fs::read_to_string(seed_path).await.map_err(|e| {
        QueryFormError::config(format!(
            "Failed to read seed file {}: {e}",
            seed_path.display()
        ))
    })?;
    run_seed_script(db_path, &script).await
}

async fn open(path: &Path, create: bool) -> Result<SqliteConnection> {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .connect()
        .await
        .map_err(|e| QueryFormError::query(format!("Cannot open database {}: {e}", path.display())))
}

async fn close(conn: SqliteConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close setup connection: {e}");
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| {
                QueryFormError::config(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            }),
        _ => Ok(()),
    }
}
