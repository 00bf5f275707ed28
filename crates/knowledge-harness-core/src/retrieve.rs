//! Query-time retrieval: search, fall back, group, and cap.
//!
//! The retriever operates entirely through the [`KnowledgeStore`] trait.
//! It turns a free-text user message into a [`GroupedChunks`] map that the
//! prompt assembler can render directly.
//!
//! # Algorithm
//!
//! 1. Trim the query. If it is empty, list the `recent_limit_empty_query`
//!    newest chunks and skip search entirely.
//! 2. Otherwise search with a pool of `search_limit` candidates.
//! 3. If the pool is empty, list the `recent_limit_fallback` newest chunks
//!    instead, so the prompt still has grounding data whenever the tenant
//!    has any knowledge at all.
//! 4. Partition by section and keep the first N of each section in the
//!    order received (relevance for search, recency for listings), where N
//!    is the section's cap.
//!
//! "Nothing found" is never an error; only store failures propagate.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::{GroupedChunks, KnowledgeChunk, Section, TenantKey};
use crate::store::{KnowledgeStore, DEFAULT_SEARCH_LIMIT};

/// Per-section retrieval caps, defaulting to [`Section::default_cap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionCaps {
    overrides: BTreeMap<Section, usize>,
}

impl SectionCaps {
    pub fn with_override(mut self, section: Section, cap: usize) -> Self {
        self.overrides.insert(section, cap);
        self
    }

    pub fn get(&self, section: Section) -> usize {
        self.overrides
            .get(&section)
            .copied()
            .unwrap_or_else(|| section.default_cap())
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Candidate pool size for relevance search.
    pub search_limit: usize,
    /// Recency listing size when the query is empty.
    pub recent_limit_empty_query: usize,
    /// Recency listing size when search finds nothing.
    pub recent_limit_fallback: usize,
    pub caps: SectionCaps,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            recent_limit_empty_query: 10,
            recent_limit_fallback: 25,
            caps: SectionCaps::default(),
        }
    }
}

/// Which store path produced a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RetrievalSource {
    /// Relevance search returned at least one chunk.
    Search,
    /// The query was empty; recency listing only.
    RecentEmptyQuery,
    /// Search returned nothing; recency listing used instead.
    RecentFallback,
}

/// Result of one [`retrieve`] call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieval {
    pub groups: GroupedChunks,
    pub source: RetrievalSource,
    /// Chunks received from the store before capping.
    pub pool_size: usize,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Retrieve a capped, section-grouped context for `query`.
pub async fn retrieve<S>(
    store: &S,
    tenant: &TenantKey,
    query: &str,
    params: &RetrievalParams,
) -> Result<Retrieval>
where
    S: KnowledgeStore + ?Sized,
{
    let query = query.trim();

    let (pool, source) = if query.is_empty() {
        let recent = store
            .list_recent(tenant, params.recent_limit_empty_query)
            .await?;
        (recent, RetrievalSource::RecentEmptyQuery)
    } else {
        let hits = store.search(tenant, query, params.search_limit).await?;
        if hits.is_empty() {
            tracing::debug!(%tenant, "search pool empty, falling back to recent chunks");
            let recent = store
                .list_recent(tenant, params.recent_limit_fallback)
                .await?;
            (recent, RetrievalSource::RecentFallback)
        } else {
            let ranked = hits.into_iter().map(|hit| hit.chunk).collect();
            (ranked, RetrievalSource::Search)
        }
    };

    let pool_size = pool.len();
    let groups = group_and_cap(pool, &params.caps);
    tracing::debug!(
        %tenant,
        ?source,
        pool_size,
        sections = groups.len(),
        "retrieved knowledge"
    );

    Ok(Retrieval {
        groups,
        source,
        pool_size,
    })
}

/// Partition chunks by section, keeping at most `caps.get(section)` per
/// section in the order given. Sections without chunks are absent.
pub fn group_and_cap<I>(chunks: I, caps: &SectionCaps) -> GroupedChunks
where
    I: IntoIterator<Item = KnowledgeChunk>,
{
    let mut groups = GroupedChunks::new();
    for chunk in chunks {
        let cap = caps.get(chunk.section);
        let texts = groups.entry(chunk.section).or_default();
        if texts.len() < cap {
            texts.push(chunk.text);
        }
    }
    groups.retain(|_, texts| !texts.is_empty());
    groups
}
