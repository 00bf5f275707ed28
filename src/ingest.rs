//! Ingestion commands: load a section file, chunk it, replace the tenant's
//! knowledge.
//!
//! Section files map section names to raw text, as TOML or JSON (chosen by
//! extension, TOML otherwise):
//!
//! ```toml
//! menu = """
//! Margherita 10
//! Pepperoni 12
//! """
//! hours = "Mon-Fri 9-5"
//! faqs = """
//! Do you deliver?
//! Yes, within 5 km.
//!
//! Is there parking?
//! Street parking only.
//! """
//! ```

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use knowledge_harness_core::chunk::chunk_section;
use knowledge_harness_core::ingest::{self, IngestReport};
use knowledge_harness_core::models::{parse_raw_sections, RawSections, TenantKey};
use knowledge_harness_core::store::KnowledgeStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Read a section file into typed [`RawSections`].
pub fn load_sections_file(path: &Path) -> Result<RawSections> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sections file: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    // JSON `null` text counts as an empty section.
    let raw: BTreeMap<String, Option<String>> = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON sections file: {}", path.display()))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML sections file: {}", path.display()))?
    };

    Ok(parse_raw_sections(
        raw.into_iter()
            .map(|(name, text)| (name, text.unwrap_or_default())),
    )?)
}

/// Ingest a section file for `tenant` and return the report.
pub async fn ingest_file(config: &Config, tenant: &TenantKey, path: &Path) -> Result<IngestReport> {
    let sections = load_sections_file(path)?;
    let store = SqliteStore::open(config).await?;
    let report = ingest::ingest(&store, tenant, sections).await;
    store.close().await;
    Ok(report?)
}

pub async fn run_ingest(config: &Config, tenant: &TenantKey, path: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        let sections = load_sections_file(path)?;
        println!("ingest {} (dry-run)", tenant);
        for (section, text) in &sections {
            println!("  {}: {} chunks", section, chunk_section(*section, text).len());
        }
        return Ok(());
    }

    let report = ingest_file(config, tenant, path).await?;
    print_report("ingest", &report);
    Ok(())
}

pub async fn run_rechunk(config: &Config, tenant: &TenantKey) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let report = ingest::rechunk(&store, tenant).await;
    store.close().await;
    print_report("rechunk", &report?);
    Ok(())
}

pub async fn run_purge(config: &Config, tenant: &TenantKey) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let deleted = store.delete_chunks(tenant).await;
    store.close().await;
    println!("purge {}", tenant);
    println!("  chunks deleted: {}", deleted?);
    println!("ok");
    Ok(())
}

fn print_report(action: &str, report: &IngestReport) {
    println!("{} {}/{}", action, report.client_id, report.bot_type);
    println!("  sections: {}", report.sections);
    println!("  chunks inserted: {}", report.chunks_inserted);
    println!("ok");
}
