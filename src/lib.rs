//! # Knowledge Harness
//!
//! Per-tenant knowledge ingestion and retrieval for business chatbots.
//!
//! A business (client) supplies free-form text per section (menu, offers,
//! hours, FAQs, listings, payment plans, policies, other). Each section is
//! split with its own chunking policy, stored scoped to `(client_id,
//! bot_type)`, and retrieved per incoming message through a full-text
//! search with a recency fallback. The retrieved chunks are grouped per
//! section, capped, and rendered into a deterministic two-message prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Section file │──▶│   Chunker    │──▶│   SQLite    │
//! │  TOML/JSON   │   │ per section │   │ FTS5 + raw │
//! └──────────────┘   └─────────────┘   └─────┬──────┘
//!                                            │
//!                                            ▼
//!                  ┌──────────┐       ┌────────────┐
//!                  │  Prompt  │◀──────│ Retriever  │
//!                  │ assemble │       │ group+cap  │
//!                  └──────────┘       └────────────┘
//! ```
//!
//! The pure logic (chunking, retrieval, prompt assembly, the storage trait
//! and an in-memory store) lives in `knowledge-harness-core`; this crate
//! adds the SQLite store, configuration, logging and the `kh` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite + FTS5 [`KnowledgeStore`](knowledge_harness_core::store::KnowledgeStore) |
//! | [`ingest`] | Section file ingestion, re-chunking and purge |
//! | [`retrieve`] | Retrieval and prompt preview |
//! | [`chunks`] | Chunk listing |
//! | [`logging`] | `tracing` subscriber setup |

pub mod chunks;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod retrieve;
pub mod sqlite_store;

pub use knowledge_harness_core::{chunk, error, models, prompt, store};
pub use knowledge_harness_core::{KnowledgeError, Result};
