//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow raw sections → dataset upsert → chunking → chunk
//! replace. Validation happens before the store is touched.

use chrono::Utc;
use serde::Serialize;

use crate::chunk::build_chunks;
use crate::error::{KnowledgeError, Result};
use crate::models::{parse_raw_sections, RawDataset, RawSections, TenantKey};
use crate::store::KnowledgeStore;

/// Outcome of one ingestion or re-chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub client_id: String,
    pub bot_type: String,
    pub sections: usize,
    pub chunks_inserted: usize,
}

/// Ingest an untyped payload: `client_id`, optional `bot_type`, and a
/// section-name → text mapping.
///
/// Rejects an empty client id, an empty mapping, and unknown section names.
pub async fn ingest_payload<S, I, K, V>(
    store: &S,
    client_id: &str,
    bot_type: Option<&str>,
    raw_sections: I,
) -> Result<IngestReport>
where
    S: KnowledgeStore + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let tenant = TenantKey::new(client_id, bot_type)?;
    let sections = parse_raw_sections(raw_sections)?;
    ingest(store, &tenant, sections).await
}

/// Store `sections` as the tenant's dataset and replace its chunks with a
/// fresh chunking of it.
pub async fn ingest<S>(store: &S, tenant: &TenantKey, sections: RawSections) -> Result<IngestReport>
where
    S: KnowledgeStore + ?Sized,
{
    if sections.is_empty() {
        return Err(KnowledgeError::validation(
            "ingestion payload has no sections",
        ));
    }

    let dataset = RawDataset {
        client_id: tenant.client_id.clone(),
        bot_type: tenant.bot_type.clone(),
        raw_sections: sections,
        updated_at: Utc::now(),
    };
    store.save_dataset(&dataset).await?;

    replace_from_dataset(store, tenant, &dataset).await
}

/// Rebuild a tenant's chunks from its stored dataset, without re-upload.
pub async fn rechunk<S>(store: &S, tenant: &TenantKey) -> Result<IngestReport>
where
    S: KnowledgeStore + ?Sized,
{
    let dataset = store.get_dataset(tenant).await?.ok_or_else(|| {
        KnowledgeError::validation(format!("no dataset stored for {tenant}"))
    })?;
    replace_from_dataset(store, tenant, &dataset).await
}

async fn replace_from_dataset<S>(
    store: &S,
    tenant: &TenantKey,
    dataset: &RawDataset,
) -> Result<IngestReport>
where
    S: KnowledgeStore + ?Sized,
{
    let chunks = build_chunks(tenant, &dataset.raw_sections, Utc::now());
    let inserted = store.replace_chunks(tenant, &chunks).await?;
    tracing::info!(
        %tenant,
        sections = dataset.raw_sections.len(),
        chunks = inserted,
        "replaced knowledge chunks"
    );

    Ok(IngestReport {
        client_id: tenant.client_id.clone(),
        bot_type: tenant.bot_type.clone(),
        sections: dataset.raw_sections.len(),
        chunks_inserted: inserted,
    })
}
