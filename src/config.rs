//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/kh.sqlite"
//!
//! [retrieval]
//! search_limit = 50
//! recent_limit_empty_query = 10
//! recent_limit_fallback = 25
//!
//! [retrieval.caps]
//! listings = 10
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Only `db.path` is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use knowledge_harness_core::models::Section;
use knowledge_harness_core::retrieve::{RetrievalParams, SectionCaps};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_recent_limit_empty_query")]
    pub recent_limit_empty_query: usize,
    #[serde(default = "default_recent_limit_fallback")]
    pub recent_limit_fallback: usize,
    /// Per-section cap overrides, keyed by section wire name.
    #[serde(default)]
    pub caps: BTreeMap<String, usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            recent_limit_empty_query: default_recent_limit_empty_query(),
            recent_limit_fallback: default_recent_limit_fallback(),
            caps: BTreeMap::new(),
        }
    }
}

fn default_search_limit() -> usize {
    50
}
fn default_recent_limit_empty_query() -> usize {
    10
}
fn default_recent_limit_fallback() -> usize {
    25
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        // Keys were checked by `validate`.
        let caps = self
            .caps
            .iter()
            .filter_map(|(name, &cap)| name.parse::<Section>().ok().map(|s| (s, cap)))
            .fold(SectionCaps::default(), |caps, (section, cap)| {
                caps.with_override(section, cap)
            });
        RetrievalParams {
            search_limit: self.search_limit,
            recent_limit_empty_query: self.recent_limit_empty_query,
            recent_limit_fallback: self.recent_limit_fallback,
            caps,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let retrieval = &config.retrieval;
    if retrieval.search_limit < 1 {
        anyhow::bail!("retrieval.search_limit must be >= 1");
    }
    if retrieval.recent_limit_empty_query < 1 {
        anyhow::bail!("retrieval.recent_limit_empty_query must be >= 1");
    }
    if retrieval.recent_limit_fallback < 1 {
        anyhow::bail!("retrieval.recent_limit_fallback must be >= 1");
    }
    for (name, &cap) in &retrieval.caps {
        name.parse::<Section>()
            .with_context(|| format!("Invalid key in [retrieval.caps]: '{}'", name))?;
        if cap < 1 {
            anyhow::bail!("retrieval.caps.{} must be >= 1", name);
        }
    }
    Ok(())
}
