//! Core data models used throughout Knowledge Harness.
//!
//! These types represent the sections, chunks, datasets, and retrieval
//! groupings that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// Bot variant used when the caller does not name one.
pub const DEFAULT_BOT_TYPE: &str = "default";

/// A category of client knowledge.
///
/// The section decides both how raw text is chunked and how many chunks of
/// it survive retrieval. Wire names are camelCase (`paymentPlans`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Menu,
    Offers,
    Hours,
    Faqs,
    Listings,
    PaymentPlans,
    Policies,
    Other,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Menu,
        Section::Offers,
        Section::Hours,
        Section::Faqs,
        Section::Listings,
        Section::PaymentPlans,
        Section::Policies,
        Section::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Menu => "menu",
            Section::Offers => "offers",
            Section::Hours => "hours",
            Section::Faqs => "faqs",
            Section::Listings => "listings",
            Section::PaymentPlans => "paymentPlans",
            Section::Policies => "policies",
            Section::Other => "other",
        }
    }

    /// Maximum number of chunks of this section kept in one retrieval.
    ///
    /// `hours` is a singleton fact, so it is capped at one.
    pub fn default_cap(self) -> usize {
        match self {
            Section::Menu => 15,
            Section::Offers => 6,
            Section::Faqs => 6,
            Section::Listings => 8,
            Section::Hours => 1,
            Section::PaymentPlans => 4,
            Section::Policies => 4,
            Section::Other => 4,
        }
    }

    /// Header line used when rendering this section into a prompt.
    pub fn header(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KnowledgeError::validation(format!("unknown section: '{wanted}'")))
    }
}

/// The (clientId, botType) pair every chunk and dataset is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantKey {
    pub client_id: String,
    pub bot_type: String,
}

impl TenantKey {
    /// Validate and normalize a tenant key.
    ///
    /// Both parts are trimmed. An empty `client_id` is rejected; a missing or
    /// blank `bot_type` becomes [`DEFAULT_BOT_TYPE`].
    pub fn new(client_id: &str, bot_type: Option<&str>) -> Result<Self> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(KnowledgeError::validation("clientId is required"));
        }
        let bot_type = bot_type
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BOT_TYPE);
        Ok(Self {
            client_id: client_id.to_string(),
            bot_type: bot_type.to_string(),
        })
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.bot_type)
    }
}

/// The atomic retrievable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeChunk {
    pub id: String,
    pub client_id: String,
    pub bot_type: String,
    pub section: Section,
    /// Position within the ingestion batch that produced this chunk.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// Raw section text keyed by section, as uploaded by the client.
pub type RawSections = BTreeMap<Section, String>;

/// Pre-chunking source of truth for one tenant variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataset {
    pub client_id: String,
    pub bot_type: String,
    pub raw_sections: RawSections,
    pub updated_at: DateTime<Utc>,
}

/// Parse an untyped section-name → text mapping.
///
/// Unknown section names are a validation error; the error names the
/// offending key.
pub fn parse_raw_sections<I, K, V>(entries: I) -> Result<RawSections>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(name, text)| Ok((name.as_ref().parse::<Section>()?, text.into())))
        .collect()
}

/// Section → ordered chunk texts, produced fresh per query.
pub type GroupedChunks = BTreeMap<Section, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_wire_names() {
        assert_eq!(
            serde_json::to_string(&Section::PaymentPlans).unwrap(),
            "\"paymentPlans\""
        );
        let parsed: Section = serde_json::from_str("\"faqs\"").unwrap();
        assert_eq!(parsed, Section::Faqs);
    }

    #[test]
    fn test_section_from_str_case_insensitive() {
        assert_eq!("PaymentPlans".parse::<Section>().unwrap(), Section::PaymentPlans);
        assert_eq!(" menu ".parse::<Section>().unwrap(), Section::Menu);
        let err = "drinks".parse::<Section>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("drinks"));
    }

    #[test]
    fn test_tenant_key_defaults_bot_type() {
        let key = TenantKey::new(" acme ", None).unwrap();
        assert_eq!(key.client_id, "acme");
        assert_eq!(key.bot_type, DEFAULT_BOT_TYPE);

        let key = TenantKey::new("acme", Some("  ")).unwrap();
        assert_eq!(key.bot_type, DEFAULT_BOT_TYPE);

        let key = TenantKey::new("acme", Some("restaurant")).unwrap();
        assert_eq!(key.bot_type, "restaurant");
    }

    #[test]
    fn test_tenant_key_rejects_empty_client() {
        assert!(TenantKey::new("", None).unwrap_err().is_validation());
        assert!(TenantKey::new("   ", Some("default")).unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_raw_sections() {
        let raw = parse_raw_sections([("menu", "Pizza"), ("hours", "9-5")]).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[&Section::Menu], "Pizza");

        let err = parse_raw_sections([("menu", "Pizza"), ("wine", "Red")]).unwrap_err();
        assert!(err.to_string().contains("wine"));
    }

    #[test]
    fn test_raw_dataset_serializes_section_keys() {
        let mut raw = RawSections::new();
        raw.insert(Section::PaymentPlans, "10% down".to_string());
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["paymentPlans"], "10% down");
    }
}
