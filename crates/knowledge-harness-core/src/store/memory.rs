//! In-memory [`KnowledgeStore`] implementation for tests and embedded use.
//!
//! Uses `Vec` and `HashMap` behind a single `std::sync::RwLock`, so a
//! replace is one write-locked step and readers never see a partial swap.
//! Search is BM25 over the tenant's chunks, computed on every call.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{KnowledgeError, Result};
use crate::models::{KnowledgeChunk, RawDataset, Section, TenantKey};

use super::{query_terms, tokenize, KnowledgeStore, ScoredChunk};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

#[derive(Default)]
struct State {
    chunks: Vec<KnowledgeChunk>,
    datasets: HashMap<TenantKey, RawDataset>,
}

/// In-memory store for tests and single-process use.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| KnowledgeError::storage("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| KnowledgeError::storage("in-memory store lock poisoned"))
    }
}

fn belongs_to(chunk: &KnowledgeChunk, tenant: &TenantKey) -> bool {
    chunk.client_id == tenant.client_id && chunk.bot_type == tenant.bot_type
}

/// Newest first; within one ingestion, source order.
fn recency_order(a: &KnowledgeChunk, b: &KnowledgeChunk) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then(a.chunk_index.cmp(&b.chunk_index))
}

/// Okapi BM25 over `docs`, one score per doc. Docs with no query term
/// score 0.
fn bm25_scores(docs: &[&KnowledgeChunk], terms: &[String]) -> Vec<f64> {
    let tokenized: Vec<Vec<String>> = docs.iter().map(|c| tokenize(&c.text).collect()).collect();
    let n = tokenized.len() as f64;
    let avg_len = tokenized.iter().map(Vec::len).sum::<usize>() as f64 / n.max(1.0);

    let idf: Vec<f64> = terms
        .iter()
        .map(|term| {
            let df = tokenized.iter().filter(|toks| toks.contains(term)).count() as f64;
            (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
        })
        .collect();

    tokenized
        .iter()
        .map(|toks| {
            let len_norm = 1.0 - BM25_B + BM25_B * toks.len() as f64 / avg_len.max(1.0);
            terms
                .iter()
                .zip(&idf)
                .map(|(term, idf)| {
                    let tf = toks.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        0.0
                    } else {
                        idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * len_norm)
                    }
                })
                .sum()
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn replace_chunks(&self, tenant: &TenantKey, chunks: &[KnowledgeChunk]) -> Result<usize> {
        let mut state = self.write()?;
        state.chunks.retain(|c| !belongs_to(c, tenant));
        state.chunks.extend(chunks.iter().cloned());
        Ok(chunks.len())
    }

    async fn search(
        &self,
        tenant: &TenantKey,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.read()?;
        let docs: Vec<&KnowledgeChunk> = state
            .chunks
            .iter()
            .filter(|c| belongs_to(c, tenant))
            .collect();
        let scores = bm25_scores(&docs, &terms);

        let mut results: Vec<ScoredChunk> = docs
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(chunk, score)| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| recency_order(&a.chunk, &b.chunk))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn list_recent(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<KnowledgeChunk>> {
        let state = self.read()?;
        let mut chunks: Vec<KnowledgeChunk> = state
            .chunks
            .iter()
            .filter(|c| belongs_to(c, tenant))
            .cloned()
            .collect();
        chunks.sort_by(recency_order);
        chunks.truncate(limit);
        Ok(chunks)
    }

    async fn list_section(
        &self,
        tenant: &TenantKey,
        section: Section,
    ) -> Result<Vec<KnowledgeChunk>> {
        let state = self.read()?;
        let mut chunks: Vec<KnowledgeChunk> = state
            .chunks
            .iter()
            .filter(|c| belongs_to(c, tenant) && c.section == section)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn delete_chunks(&self, tenant: &TenantKey) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.chunks.len();
        state.chunks.retain(|c| !belongs_to(c, tenant));
        Ok(before - state.chunks.len())
    }

    async fn save_dataset(&self, dataset: &RawDataset) -> Result<()> {
        let tenant = TenantKey {
            client_id: dataset.client_id.clone(),
            bot_type: dataset.bot_type.clone(),
        };
        self.write()?.datasets.insert(tenant, dataset.clone());
        Ok(())
    }

    async fn get_dataset(&self, tenant: &TenantKey) -> Result<Option<RawDataset>> {
        Ok(self.read()?.datasets.get(tenant).cloned())
    }
}
