//! Offline build: raw crawler files to a persisted, searchable corpus.

use super::documents::{build_chunks, load_raw_documents};
use super::retriever::Retriever;
use crate::config::SiftConfig;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;

/// Counts reported after a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub files: usize,
    pub documents: usize,
    pub chunks: usize,
    pub sources: usize,
}

/// Chunk every raw document, index the chunks with `retriever`, and save
/// both artifacts to the configured paths.
///
/// The previous artifacts are only overwritten once embedding has succeeded.
pub async fn prepare(config: &SiftConfig, retriever: &Retriever) -> Result<PrepareReport> {
    let files = load_raw_documents(&config.paths.raw_dir).await?;
    let documents = files.iter().map(|f| f.documents.len()).sum();

    let chunks = build_chunks(&files, &config.chunking.chunker());
    let sources = chunks
        .iter()
        .filter_map(|c| c.source_url())
        .collect::<BTreeSet<_>>()
        .len();
    let chunk_count = chunks.len();

    retriever.index_documents(chunks).await?;
    retriever
        .save(&config.paths.index_path, &config.paths.chunks_path)
        .await?;

    let report = PrepareReport {
        files: files.len(),
        documents,
        chunks: chunk_count,
        sources,
    };
    tracing::info!(?report, "Prepared corpus");
    Ok(report)
}
