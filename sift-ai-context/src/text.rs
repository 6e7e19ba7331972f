//! Text normalization and paragraph-aware chunking for retrieval passages.
//!
//! Documents coming out of a crawler are long, loosely formatted runs of text.
//! Before they can be embedded they are cut into passages ("chunks") that
//! respect paragraph boundaries, stay close to a character budget, and overlap
//! slightly so that a sentence straddling a boundary is still retrievable from
//! either side.
//!
//! The module defines:
//! - [`normalize_text`]: whitespace collapsing and quotation-mark folding, the
//!   same normalization the retriever applies to queries.
//! - [`ParagraphChunker`]: the greedy paragraph accumulator.
//! - [`ChunkDraft`]: a chunk without an id. Ids are assigned by the caller,
//!   which knows the source file and the running ordinal.
//!
//! # Chunking rules
//!
//! 1. If the normalized text fits in `chunk_size` characters, it is returned as
//!    a single draft.
//! 2. Otherwise the *raw* text is split on blank lines first, and each
//!    paragraph is normalized on its own. Normalizing first would collapse the
//!    blank lines and lose the paragraph structure.
//! 3. Paragraphs are appended to a buffer, joined by `"\n\n"`. When the next
//!    paragraph would push the buffer's fresh content past `chunk_size`, the
//!    buffer is emitted and a new one is seeded with the trailing `overlap`
//!    characters of the emitted buffer.
//! 4. A paragraph longer than `chunk_size` is never split; it is emitted whole.
//!
//! All lengths are counted in `char`s, so Cyrillic or CJK text is measured the
//! same way as ASCII.
//!
//! # Example
//!
//! ```
//! use sift_ai_context::text::{Metadata, ParagraphChunker};
//!
//! let chunker = ParagraphChunker::new(40, 10);
//! let text = "First paragraph is here.\n\nSecond paragraph follows it.\n\nThird one.";
//! let drafts = chunker.chunk(text, &Metadata::new());
//!
//! assert_eq!(drafts.len(), 2);
//! assert!(drafts[1].text.starts_with("s is here."));
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Default character budget per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default number of trailing characters carried into the next chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Separator placed between paragraphs inside a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

const SEPARATOR_LEN: usize = 2;

/// Quotation mark variants folded into a plain `"`.
const QUOTE_VARIANTS: &[char] = &['«', '»', '„', '“', '”', '‟'];

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

/// String metadata attached to every chunk. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, String>;

/// A chunk of text that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDraft {
    /// The passage text.
    pub text: String,
    /// Metadata copied from the source document.
    pub metadata: Metadata,
}

impl ChunkDraft {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Length of the passage in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Collapse whitespace runs into single spaces, fold quotation mark variants
/// into `"`, and trim.
///
/// ```
/// use sift_ai_context::text::normalize_text;
///
/// assert_eq!(normalize_text("  «hello»\n\t world  "), "\"hello\" world");
/// assert_eq!(normalize_text(""), "");
/// ```
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.extend(word.chars().map(|c| {
            if QUOTE_VARIANTS.contains(&c) {
                '"'
            } else {
                c
            }
        }));
    }
    normalized
}

/// Split raw text on blank lines and normalize every paragraph.
///
/// Paragraphs that are empty after normalization are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(normalize_text)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Greedy paragraph accumulator with character overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParagraphChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl ParagraphChunker {
    /// Creates a chunker with the given character budget and overlap.
    ///
    /// Callers are expected to validate `overlap < chunk_size`; the chunker
    /// itself tolerates any combination.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping drafts, each carrying a copy of `metadata`.
    ///
    /// Empty input yields a single empty draft; callers decide whether to keep it.
    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<ChunkDraft> {
        let normalized = normalize_text(text);
        if normalized.chars().count() <= self.chunk_size {
            return vec![ChunkDraft::new(normalized, metadata.clone())];
        }

        let mut drafts = Vec::new();
        let mut buffer = String::new();
        // Characters added since the last emit, excluding the overlap seed.
        let mut fresh_len = 0usize;

        for paragraph in split_paragraphs(text) {
            let paragraph_len = paragraph.chars().count();
            let joined_len = if fresh_len == 0 {
                paragraph_len
            } else {
                fresh_len + SEPARATOR_LEN + paragraph_len
            };

            if joined_len > self.chunk_size && !buffer.is_empty() {
                let seed = tail_chars(&buffer, self.overlap);
                drafts.push(ChunkDraft::new(
                    std::mem::take(&mut buffer),
                    metadata.clone(),
                ));
                if !seed.is_empty() {
                    buffer.push_str(&seed);
                    buffer.push_str(PARAGRAPH_SEPARATOR);
                }
                buffer.push_str(&paragraph);
                fresh_len = paragraph_len;
            } else {
                if !buffer.is_empty() {
                    buffer.push_str(PARAGRAPH_SEPARATOR);
                }
                buffer.push_str(&paragraph);
                fresh_len = joined_len;
            }
        }

        if !buffer.is_empty() {
            drafts.push(ChunkDraft::new(buffer, metadata.clone()));
        }

        drafts
    }
}

/// The last `count` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}
