//! `kh chunks`: inspect stored chunks for a tenant.

use anyhow::Result;

use knowledge_harness_core::store::KnowledgeStore;
use knowledge_harness_core::{KnowledgeChunk, Section, TenantKey};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Default number of chunks listed when no section is given.
pub const DEFAULT_LIST_LIMIT: usize = 25;

pub async fn list_chunks(
    config: &Config,
    tenant: &TenantKey,
    section: Option<Section>,
    limit: usize,
) -> Result<Vec<KnowledgeChunk>> {
    let store = SqliteStore::open(config).await?;
    let chunks = match section {
        Some(section) => store.list_section(tenant, section).await,
        None => store.list_recent(tenant, limit).await,
    };
    store.close().await;
    Ok(chunks?)
}

pub async fn run_chunks(
    config: &Config,
    tenant: &TenantKey,
    section: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let section = section.map(str::parse::<Section>).transpose()?;
    let chunks = list_chunks(config, tenant, section, limit.unwrap_or(DEFAULT_LIST_LIMIT)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    if chunks.is_empty() {
        println!("No chunks.");
        return Ok(());
    }

    for chunk in &chunks {
        println!(
            "[{}#{}] {} ({})",
            chunk.section,
            chunk.chunk_index,
            chunk.id,
            chunk.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!("    hash: {}", &chunk.hash[..chunk.hash.len().min(12)]);
        for line in chunk.text.lines() {
            println!("    {}", line);
        }
        println!();
    }

    Ok(())
}
