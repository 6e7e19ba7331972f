//! Text preparation for the sift retrieval pipeline.
//!
//! See [`text`] for normalization and paragraph chunking.
pub mod text;

pub use text::{
    ChunkDraft, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, Metadata, ParagraphChunker,
    normalize_text, split_paragraphs,
};
