//! Storage abstraction for Knowledge Harness.
//!
//! The [`KnowledgeStore`] trait defines every storage operation the
//! ingestion and retrieval pipeline needs, enabling pluggable backends
//! (SQLite in the app crate, [`memory::InMemoryStore`] for tests and
//! embedded use).
//!
//! Every operation is scoped to a [`TenantKey`]; no call can see another
//! tenant's or another bot variant's data.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{KnowledgeChunk, RawDataset, Section, TenantKey};

/// Recommended pre-grouping pool size for [`KnowledgeStore::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// A chunk returned from relevance search, with its backend score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: KnowledgeChunk,
    /// Higher is more relevant. Only comparable within one result set.
    pub score: f64,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_chunks`](KnowledgeStore::replace_chunks) | Swap a tenant variant's chunk set |
/// | [`search`](KnowledgeStore::search) | Lexical relevance search |
/// | [`list_recent`](KnowledgeStore::list_recent) | Newest chunks, for fallback |
/// | [`list_section`](KnowledgeStore::list_section) | Exact (tenant, section) filter |
/// | [`delete_chunks`](KnowledgeStore::delete_chunks) | Remove a tenant variant's chunks |
/// | [`save_dataset`](KnowledgeStore::save_dataset) | Upsert the raw dataset |
/// | [`get_dataset`](KnowledgeStore::get_dataset) | Load the raw dataset |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Delete every chunk for `tenant`, then insert `chunks`.
    ///
    /// Readers must never observe a mix of the old and new sets. Returns the
    /// number of chunks inserted.
    async fn replace_chunks(&self, tenant: &TenantKey, chunks: &[KnowledgeChunk]) -> Result<usize>;

    /// Chunks matching `query`, most relevant first, at most `limit`.
    ///
    /// A query with no searchable terms returns an empty vector.
    async fn search(&self, tenant: &TenantKey, query: &str, limit: usize)
        -> Result<Vec<ScoredChunk>>;

    /// The `limit` most recently created chunks.
    ///
    /// Chunks from the same ingestion share a timestamp; among those, source
    /// order (`chunk_index`) is kept.
    async fn list_recent(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<KnowledgeChunk>>;

    /// All chunks of one section, in source order.
    async fn list_section(&self, tenant: &TenantKey, section: Section)
        -> Result<Vec<KnowledgeChunk>>;

    /// Delete every chunk for `tenant`. Returns the number removed.
    async fn delete_chunks(&self, tenant: &TenantKey) -> Result<usize>;

    /// Insert or overwrite the raw dataset for `dataset`'s tenant.
    async fn save_dataset(&self, dataset: &RawDataset) -> Result<()>;

    async fn get_dataset(&self, tenant: &TenantKey) -> Result<Option<RawDataset>>;
}

/// Lower-cased alphanumeric terms of `text`, deduplicated in first-seen
/// order.
///
/// Every backend builds its query from these terms; punctuation never
/// reaches a query parser.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in tokenize(text) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms_strip_punctuation() {
        assert_eq!(
            query_terms("What's on the MENU? menu, pizza!"),
            vec!["what", "s", "on", "the", "menu", "pizza"]
        );
    }

    #[test]
    fn test_query_terms_empty() {
        assert!(query_terms("  ?!  ").is_empty());
        assert!(query_terms("").is_empty());
    }

    #[test]
    fn test_query_terms_unicode() {
        assert_eq!(query_terms("Café—Crème"), vec!["café", "crème"]);
    }
}
