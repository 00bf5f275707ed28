//! # Knowledge Harness Core
//!
//! Storage-agnostic logic for a multi-tenant chatbot knowledge base:
//! section models, section-aware chunking, the store abstraction, query-time
//! retrieval, and prompt assembly.
//!
//! This crate contains no sqlx, filesystem I/O, or other backend-specific
//! dependencies. Backends implement [`store::KnowledgeStore`];
//! [`store::memory::InMemoryStore`] ships here for tests.
//!
//! ## Flow
//!
//! ```text
//! raw sections ─▶ chunk ─▶ KnowledgeStore::replace_chunks
//!                                   │
//! user text ─▶ retrieve ◀───────────┘
//!                 │
//!                 ▼
//!              prompt::assemble ─▶ [system, user] messages
//! ```

pub mod chunk;
pub mod error;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{KnowledgeError, Result};
pub use models::{GroupedChunks, KnowledgeChunk, RawDataset, Section, TenantKey};
