//! SQLite-backed [`KnowledgeStore`] implementation.
//!
//! Chunks live in `knowledge_chunks` and are mirrored into the FTS5 table
//! `knowledge_chunks_fts` for BM25 relevance search. Raw datasets are stored
//! as JSON in `raw_datasets`.
//!
//! `replace_chunks` runs in one `BEGIN IMMEDIATE` transaction, so readers
//! see either the old chunk set or the new one, and concurrent replaces
//! queue on SQLite's writer lock. A crash mid-replace rolls back
//! to the previous set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::time::Instant;

use crate::config::Config;
use crate::{db, migrate};

use knowledge_harness_core::error::{KnowledgeError, Result as KnowledgeResult};
use knowledge_harness_core::models::{KnowledgeChunk, RawDataset, RawSections, Section, TenantKey};
use knowledge_harness_core::store::{query_terms, KnowledgeStore, ScoredChunk};

const CHUNK_COLUMNS: &str =
    "id, client_id, bot_type, section, chunk_index, text, hash, created_at";

/// SQLite implementation of the [`KnowledgeStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and ensure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Writers take the database lock at `BEGIN`, so a second writer waits
    /// on the busy timeout instead of failing a read-to-write upgrade.
    async fn begin_immediate(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn replace_chunks_tx(&self, tenant: &TenantKey, chunks: &[KnowledgeChunk]) -> Result<usize> {
        let started = Instant::now();
        let mut tx = self.begin_immediate().await?;

        sqlx::query("DELETE FROM knowledge_chunks_fts WHERE client_id = ? AND bot_type = ?")
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE client_id = ? AND bot_type = ?")
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO knowledge_chunks (id, client_id, bot_type, section, chunk_index, text, hash, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .bind(chunk.section.as_str())
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(chunk.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO knowledge_chunks_fts (chunk_id, client_id, bot_type, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            %tenant,
            chunks = chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "replaced chunks"
        );
        Ok(chunks.len())
    }

    async fn search_fts(&self, tenant: &TenantKey, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };
        let started = Instant::now();

        // FTS5 rank is bm25(): lower is better.
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.client_id, c.bot_type, c.section, c.chunk_index, c.text, c.hash,
                   c.created_at, m.rank
            FROM (
                SELECT chunk_id, rank
                FROM knowledge_chunks_fts
                WHERE knowledge_chunks_fts MATCH ? AND client_id = ? AND bot_type = ?
                ORDER BY rank
                LIMIT ?
            ) AS m
            JOIN knowledge_chunks c ON c.id = m.chunk_id
            ORDER BY m.rank, c.created_at DESC, c.chunk_index ASC
            "#,
        )
        .bind(&match_expr)
        .bind(&tenant.client_id)
        .bind(&tenant.bot_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            %tenant,
            hits = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fts search"
        );

        rows.iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                Ok(ScoredChunk {
                    chunk: chunk_from_row(row)?,
                    score: -rank,
                })
            })
            .collect()
    }

    async fn list_recent_rows(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<KnowledgeChunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM knowledge_chunks \
             WHERE client_id = ? AND bot_type = ? \
             ORDER BY created_at DESC, chunk_index ASC LIMIT ?"
        ))
        .bind(&tenant.client_id)
        .bind(&tenant.bot_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn list_section_rows(&self, tenant: &TenantKey, section: Section) -> Result<Vec<KnowledgeChunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM knowledge_chunks \
             WHERE client_id = ? AND bot_type = ? AND section = ? \
             ORDER BY created_at DESC, chunk_index ASC"
        ))
        .bind(&tenant.client_id)
        .bind(&tenant.bot_type)
        .bind(section.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn delete_chunks_tx(&self, tenant: &TenantKey) -> Result<usize> {
        let mut tx = self.begin_immediate().await?;

        sqlx::query("DELETE FROM knowledge_chunks_fts WHERE client_id = ? AND bot_type = ?")
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM knowledge_chunks WHERE client_id = ? AND bot_type = ?")
            .bind(&tenant.client_id)
            .bind(&tenant.bot_type)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted as usize)
    }

    async fn upsert_dataset(&self, dataset: &RawDataset) -> Result<()> {
        let raw_json = serde_json::to_string(&dataset.raw_sections)?;
        sqlx::query(
            r#"
            INSERT INTO raw_datasets (client_id, bot_type, raw_sections_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(client_id, bot_type) DO UPDATE SET
                raw_sections_json = excluded.raw_sections_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&dataset.client_id)
        .bind(&dataset.bot_type)
        .bind(&raw_json)
        .bind(dataset.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_dataset(&self, tenant: &TenantKey) -> Result<Option<RawDataset>> {
        let row = sqlx::query(
            "SELECT raw_sections_json, updated_at FROM raw_datasets WHERE client_id = ? AND bot_type = ?",
        )
        .bind(&tenant.client_id)
        .bind(&tenant.bot_type)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw_json: String = row.get("raw_sections_json");
        let raw_sections: RawSections = serde_json::from_str(&raw_json)
            .with_context(|| format!("Corrupt raw dataset for {tenant}"))?;

        Ok(Some(RawDataset {
            client_id: tenant.client_id.clone(),
            bot_type: tenant.bot_type.clone(),
            raw_sections,
            updated_at: from_millis(row.get("updated_at"))?,
        }))
    }
}

/// OR together the quoted query terms, or `None` when nothing is
/// searchable. Terms are alphanumeric, so quoting needs no escaping.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

fn chunk_from_row(row: &SqliteRow) -> Result<KnowledgeChunk> {
    let section: String = row.get("section");
    Ok(KnowledgeChunk {
        id: row.get("id"),
        client_id: row.get("client_id"),
        bot_type: row.get("bot_type"),
        section: section.parse()?,
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        hash: row.get("hash"),
        created_at: from_millis(row.get("created_at"))?,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn replace_chunks(
        &self,
        tenant: &TenantKey,
        chunks: &[KnowledgeChunk],
    ) -> KnowledgeResult<usize> {
        self.replace_chunks_tx(tenant, chunks)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn search(
        &self,
        tenant: &TenantKey,
        query: &str,
        limit: usize,
    ) -> KnowledgeResult<Vec<ScoredChunk>> {
        self.search_fts(tenant, query, limit)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn list_recent(
        &self,
        tenant: &TenantKey,
        limit: usize,
    ) -> KnowledgeResult<Vec<KnowledgeChunk>> {
        self.list_recent_rows(tenant, limit)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn list_section(
        &self,
        tenant: &TenantKey,
        section: Section,
    ) -> KnowledgeResult<Vec<KnowledgeChunk>> {
        self.list_section_rows(tenant, section)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn delete_chunks(&self, tenant: &TenantKey) -> KnowledgeResult<usize> {
        self.delete_chunks_tx(tenant)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn save_dataset(&self, dataset: &RawDataset) -> KnowledgeResult<()> {
        self.upsert_dataset(dataset)
            .await
            .map_err(KnowledgeError::storage)
    }

    async fn get_dataset(&self, tenant: &TenantKey) -> KnowledgeResult<Option<RawDataset>> {
        self.load_dataset(tenant)
            .await
            .map_err(KnowledgeError::storage)
    }
}
