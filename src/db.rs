//! SQLite database connection management.
//!
//! Provides a connection pool with WAL mode enabled, so retrieval reads
//! proceed while an ingestion transaction is writing. The database file
//! and its parent directories are created if they don't exist.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a connection pool to the configured SQLite database.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.db.path).await
}

/// Create a connection pool to the database at `db_path`.
///
/// Up to 5 connections; WAL journal mode. A connection waits up to
/// [`BUSY_TIMEOUT`] for another writer's lock before giving up.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
