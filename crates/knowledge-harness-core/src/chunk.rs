//! Section-aware text chunker.
//!
//! Splits one section's raw text into chunk strings that can be retrieved
//! independently and inserted into a prompt as-is. The splitting policy is
//! chosen by [`Section`]:
//!
//! | Section | Policy |
//! |---------|--------|
//! | `listings` | blank-line blocks → heading split → sliding window → whole |
//! | `paymentPlans` | blank-line blocks bundled in threes |
//! | `faqs` | blank-line blocks bundled in eights |
//! | everything else | whole section as one chunk |
//!
//! # Listings Algorithm
//!
//! 1. Split on one or more blank lines. Two or more blocks → one listing
//!    per chunk.
//! 2. Otherwise split in front of inline headings (`Property 3:`, `Unit:`,
//!    `Listing 12:`, `Project:`, `Compound:`, case-insensitive). Two or more
//!    pieces → one piece per chunk.
//! 3. Otherwise, if the text is longer than 1500 characters, cut it into
//!    1200-character windows every 1000 characters (200 characters of
//!    overlap), covering the whole text.
//! 4. Otherwise the text is a single chunk.
//!
//! # Example
//!
//! ```rust
//! use knowledge_harness_core::chunk::chunk_section;
//! use knowledge_harness_core::models::Section;
//!
//! let chunks = chunk_section(Section::Listings, "Villa A, 3 bed\n\nVilla B, 4 bed");
//! assert_eq!(chunks, vec!["Villa A, 3 bed", "Villa B, 4 bed"]);
//! ```

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{KnowledgeChunk, RawSections, Section, TenantKey};

/// Listings longer than this (in characters) fall back to windowing.
pub const LISTINGS_WINDOW_THRESHOLD: usize = 1500;
/// Characters per listings window.
pub const LISTINGS_WINDOW_SIZE: usize = 1200;
/// Distance between consecutive window starts.
pub const LISTINGS_WINDOW_STRIDE: usize = 1000;

const PAYMENT_PLANS_PER_CHUNK: usize = 3;
const FAQS_PER_CHUNK: usize = 8;

fn blank_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid blank-line regex"))
}

fn listing_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:(?:property|unit|listing)\s*\d*|project|compound)\s*:")
            .expect("valid listing heading regex")
    })
}

/// Split one section's raw text into chunk strings.
///
/// Returns an empty vector for empty or whitespace-only input. Every
/// returned chunk is non-empty after trimming, and chunks follow the
/// top-to-bottom order of the source text.
pub fn chunk_section(section: Section, text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    match section {
        Section::Listings => chunk_listings(text),
        Section::PaymentPlans => bundle(split_blocks(text), PAYMENT_PLANS_PER_CHUNK),
        Section::Faqs => bundle(split_blocks(text), FAQS_PER_CHUNK),
        Section::Menu | Section::Offers | Section::Hours | Section::Policies | Section::Other => {
            vec![text.trim().to_string()]
        }
    }
}

/// Split on one or more blank lines, dropping blocks that are empty after
/// trimming.
pub fn split_blocks(text: &str) -> Vec<&str> {
    blank_line_re()
        .split(text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect()
}

fn chunk_listings(text: &str) -> Vec<String> {
    let blocks = split_blocks(text);
    if blocks.len() >= 2 {
        return blocks.into_iter().map(str::to_string).collect();
    }
    let Some(single) = blocks.first().copied() else {
        return Vec::new();
    };

    let pieces = split_at_headings(single);
    if pieces.len() >= 2 {
        return pieces.into_iter().map(str::to_string).collect();
    }

    if single.chars().count() > LISTINGS_WINDOW_THRESHOLD {
        return sliding_windows(single, LISTINGS_WINDOW_SIZE, LISTINGS_WINDOW_STRIDE);
    }

    vec![single.to_string()]
}

/// Cut `text` in front of every listing heading, keeping the heading with
/// the text that follows it.
fn split_at_headings(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = listing_heading_re()
        .find_iter(text)
        .map(|m| m.start())
        .filter(|&start| start > 0)
        .collect();
    starts.push(text.len());

    let mut pieces = Vec::with_capacity(starts.len());
    let mut from = 0;
    for to in starts {
        let piece = text[from..to].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        from = to;
    }
    pieces
}

/// Fixed-size character windows advancing by `stride`, covering all of
/// `text`. Windows are not trimmed so that overlaps stay exact.
fn sliding_windows(text: &str, size: usize, stride: usize) -> Vec<String> {
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(char_count);
        let window = &text[bounds[start]..bounds[end]];
        if !window.trim().is_empty() {
            windows.push(window.to_string());
        }
        if end == char_count {
            break;
        }
        start += stride;
    }
    windows
}

/// Join consecutive blocks in groups of `per_chunk`, separated by a blank
/// line.
fn bundle(blocks: Vec<&str>, per_chunk: usize) -> Vec<String> {
    blocks
        .chunks(per_chunk)
        .map(|group| group.join("\n\n"))
        .collect()
}

/// Chunk every section of a dataset into storable [`KnowledgeChunk`]s.
///
/// All chunks of one call share a `created_at` timestamp and receive
/// contiguous `chunk_index` values in section order, then source order.
pub fn build_chunks(
    tenant: &TenantKey,
    sections: &RawSections,
    created_at: DateTime<Utc>,
) -> Vec<KnowledgeChunk> {
    let mut chunks = Vec::new();
    for (&section, text) in sections {
        for piece in chunk_section(section, text) {
            let index = chunks.len() as i64;
            chunks.push(make_chunk(tenant, section, index, piece, created_at));
        }
    }
    chunks
}

fn make_chunk(
    tenant: &TenantKey,
    section: Section,
    index: i64,
    text: String,
    created_at: DateTime<Utc>,
) -> KnowledgeChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    KnowledgeChunk {
        id: Uuid::new_v4().to_string(),
        client_id: tenant.client_id.clone(),
        bot_type: tenant.bot_type.clone(),
        section,
        chunk_index: index,
        text,
        hash,
        created_at,
    }
}
