//! Retrieval and prompt commands.
//!
//! `kh retrieve` shows what the bot would see for a message, grouped by
//! section. `kh prompt` goes one step further and prints the exact message
//! list a completion call would receive, as JSON.

use anyhow::{Context, Result};
use std::path::Path;

use knowledge_harness_core::prompt::{self, ChatMessage};
use knowledge_harness_core::retrieve::{self, Retrieval};
use knowledge_harness_core::TenantKey;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Rules used by `kh prompt` when neither `--rules` nor `--rules-file` is given.
pub const DEFAULT_RULES_PROMPT: &str = "You are a helpful assistant for this business. \
Answer only from the data below. If the answer is not in the data, say you don't know.";

/// Retrieve grouped context for `query` from the configured database.
pub async fn retrieve_for(config: &Config, tenant: &TenantKey, query: &str) -> Result<Retrieval> {
    let store = SqliteStore::open(config).await?;
    let params = config.retrieval.params();
    let result = retrieve::retrieve(&store, tenant, query, &params).await;
    store.close().await;
    Ok(result?)
}

pub async fn run_retrieve(config: &Config, tenant: &TenantKey, query: &str, json: bool) -> Result<()> {
    let retrieval = retrieve_for(config, tenant, query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
        return Ok(());
    }

    if retrieval.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!(
        "{} chunks in pool ({})",
        retrieval.pool_size,
        source_label(&retrieval)
    );
    println!();
    for (section, texts) in &retrieval.groups {
        println!("{} ({})", section.header(), texts.len());
        for text in texts {
            println!("  - {}", preview(text, 120));
        }
        println!();
    }

    Ok(())
}

/// Build the two-message prompt for `user_text`.
pub async fn build_prompt(
    config: &Config,
    tenant: &TenantKey,
    rules_prompt: &str,
    user_text: &str,
) -> Result<Vec<ChatMessage>> {
    let retrieval = retrieve_for(config, tenant, user_text).await?;
    let order = prompt::sections_order_for(&tenant.bot_type);
    Ok(prompt::assemble(rules_prompt, &retrieval.groups, order, user_text))
}

pub async fn run_prompt(
    config: &Config,
    tenant: &TenantKey,
    user_text: &str,
    rules: Option<String>,
    rules_file: Option<&Path>,
) -> Result<()> {
    let rules_prompt = match (rules, rules_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?,
        (None, None) => DEFAULT_RULES_PROMPT.to_string(),
    };

    let messages = build_prompt(config, tenant, &rules_prompt, user_text).await?;
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

fn source_label(retrieval: &Retrieval) -> &'static str {
    match retrieval.source {
        retrieve::RetrievalSource::Search => "search",
        retrieve::RetrievalSource::RecentEmptyQuery => "recent, empty query",
        retrieve::RetrievalSource::RecentFallback => "recent, no matches",
    }
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else if text.contains('\n') {
        format!("{line} ...")
    } else {
        line.to_string()
    }
}
