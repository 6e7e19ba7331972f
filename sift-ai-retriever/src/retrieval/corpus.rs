//! The unit that is built, persisted and published as a whole: a vector index
//! together with the chunks it was built from.

use crate::error::{Result, RetrieverError};
use crate::storage::chunk_store::{load_chunks, to_json};
use crate::storage::{
    Chunk, FlatIndex, Metric, Precision, VectorIndex, commit_file, fingerprint, stage_file,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Vector index plus the positionally aligned chunk sequence.
#[derive(Debug)]
pub struct Corpus {
    index: Box<dyn VectorIndex>,
    chunks: Vec<Chunk>,
}

/// Summary of a corpus for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub chunks: usize,
    pub vectors: usize,
    pub dimension: usize,
    pub metric: Metric,
    pub precision: Precision,
    pub sources: usize,
}

impl Corpus {
    /// Pair an index with its chunks and stamp the index with their
    /// fingerprint. Fails when their lengths differ.
    pub fn new(mut index: Box<dyn VectorIndex>, chunks: Vec<Chunk>) -> Result<Self> {
        check_lengths(index.as_ref(), &chunks)?;
        index.set_fingerprint(fingerprint(&chunks));
        Ok(Self { index, chunks })
    }

    /// An unindexed corpus: no vectors, no chunks.
    pub fn empty(dimension: usize, metric: Metric, precision: Precision) -> Self {
        let mut index = FlatIndex::new(dimension, metric, precision);
        index.set_fingerprint(fingerprint(&[]));
        Self {
            index: Box::new(index),
            chunks: Vec::new(),
        }
    }

    /// Load both artifacts. Either one missing yields [`RetrieverError::NotFound`];
    /// artifacts from different builds yield [`RetrieverError::ArtifactMismatch`]
    /// or [`RetrieverError::StaleArtifacts`].
    pub async fn load(index_path: &Path, chunks_path: &Path) -> Result<Self> {
        let path = index_path.to_path_buf();
        let index = tokio::task::spawn_blocking(move || FlatIndex::open(&path)).await??;
        let chunks = load_chunks(chunks_path).await?;
        check_lengths(&index, &chunks)?;

        let expected = fingerprint(&chunks);
        if index.fingerprint() != expected {
            return Err(RetrieverError::StaleArtifacts {
                index: index.fingerprint().to_hex().to_string(),
                chunks: expected.to_hex().to_string(),
            });
        }

        Ok(Self {
            index: Box::new(index),
            chunks,
        })
    }

    /// Persist both artifacts. Both are staged beside their targets first, so
    /// a failed write leaves the previous pair in place.
    pub async fn save(&self, index_path: &Path, chunks_path: &Path) -> Result<()> {
        let index_bytes = self.index.to_bytes();
        let chunk_bytes = to_json(&self.chunks)?;
        let index_target = index_path.to_path_buf();
        let chunks_target = chunks_path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let staged_index = stage_file(&index_target, &index_bytes)?;
            let staged_chunks = stage_file(&chunks_target, &chunk_bytes)?;
            commit_file(staged_index, &index_target)?;
            commit_file(staged_chunks, &chunks_target)
        })
        .await??;

        tracing::info!(
            "Saved {} chunks to {} and {}",
            self.chunks.len(),
            index_path.display(),
            chunks_path.display()
        );
        Ok(())
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> CorpusStats {
        let sources: BTreeSet<&str> = self.chunks.iter().filter_map(Chunk::source_url).collect();
        CorpusStats {
            chunks: self.chunks.len(),
            vectors: self.index.len(),
            dimension: self.index.dimension(),
            metric: self.index.metric(),
            precision: self.index.precision(),
            sources: sources.len(),
        }
    }
}

fn check_lengths(index: &dyn VectorIndex, chunks: &[Chunk]) -> Result<()> {
    if index.len() != chunks.len() {
        return Err(RetrieverError::ArtifactMismatch {
            vectors: index.len(),
            chunks: chunks.len(),
        });
    }
    Ok(())
}
