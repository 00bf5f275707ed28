//! Database schema migrations.
//!
//! Every statement is idempotent; `kh init` and every store open may run
//! them again safely.
//!
//! # Schema
//!
//! | Object | Purpose |
//! |--------|---------|
//! | `knowledge_chunks` | One row per chunk, scoped by `(client_id, bot_type)` |
//! | `knowledge_chunks_fts` | FTS5 index; `text` is the only indexed column |
//! | `raw_datasets` | Pre-chunking section text, one row per tenant variant |
//! | `idx_chunks_tenant_section` | Exact filter on `(client_id, bot_type, section)` |
//! | `idx_chunks_tenant_recent` | Recency listing per tenant variant |

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // created_at is Unix milliseconds so one ingestion sorts after another
    // even within the same second.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_chunks (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            bot_type TEXT NOT NULL DEFAULT 'default',
            section TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL CHECK (length(trim(text)) > 0),
            hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_datasets (
            client_id TEXT NOT NULL,
            bot_type TEXT NOT NULL DEFAULT 'default',
            raw_sections_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (client_id, bot_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='knowledge_chunks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE knowledge_chunks_fts USING fts5(
                chunk_id UNINDEXED,
                client_id UNINDEXED,
                bot_type UNINDEXED,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_tenant_section ON knowledge_chunks(client_id, bot_type, section)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_tenant_recent ON knowledge_chunks(client_id, bot_type, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
