//! Query-time retrieval over a published [`Corpus`].

use super::corpus::Corpus;
use super::rerank::{IdentityReranker, Reranker, renumber};
use crate::error::{Result, RetrieverError};
use crate::storage::{Chunk, FlatIndex, Metric, Precision, VectorIndex};
use serde::Serialize;
use sift_ai_context::{Metadata, normalize_text};
use sift_ai_embed::{EmbeddingProvider, l2_normalize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Knobs fixed when a [`Retriever`] is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    /// Metric for newly built indexes. A loaded index keeps its own.
    pub metric: Metric,
    pub precision: Precision,
    /// L2-normalize document and query vectors when the metric is inner product
    pub normalize_vectors: bool,
    pub top_k: usize,
    pub score_threshold: f32,
    pub rerank: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            metric: Metric::InnerProduct,
            precision: Precision::F32,
            normalize_vectors: true,
            top_k: 3,
            score_threshold: 0.35,
            rerank: false,
        }
    }
}

/// A chunk that passed the threshold, with its score and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
    pub rank: usize,
}

/// What the answer generator consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResult {
    pub text: String,
    pub source_url: String,
    pub title: String,
    pub score: f32,
}

impl From<&SearchResult> for FormattedResult {
    fn from(result: &SearchResult) -> Self {
        Self {
            text: result.text.clone(),
            source_url: result.metadata.get("source_url").cloned().unwrap_or_default(),
            title: result
                .metadata
                .get("title")
                .cloned()
                .unwrap_or_else(|| "info".to_string()),
            score: result.score,
        }
    }
}

/// Embeds queries and answers them from the current corpus.
///
/// The corpus is swapped as a whole by [`Retriever::index_documents`], so a
/// search always sees an index and a chunk sequence from the same build.
/// Searches hold the read lock only long enough to clone the `Arc`.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Arc<dyn Reranker>,
    options: RetrievalOptions,
    corpus: RwLock<Arc<Corpus>>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.provider_name())
            .field("reranker", &self.reranker.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Retriever {
    /// An unindexed retriever.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, options: RetrievalOptions) -> Self {
        let corpus = Corpus::empty(
            embedder.embedding_dimension(),
            options.metric,
            options.precision,
        );
        Self {
            embedder,
            reranker: Arc::new(IdentityReranker),
            options,
            corpus: RwLock::new(Arc::new(corpus)),
        }
    }

    /// Load a persisted corpus. Missing artifacts leave the retriever unindexed.
    pub async fn open(
        embedder: Arc<dyn EmbeddingProvider>,
        options: RetrievalOptions,
        index_path: &Path,
        chunks_path: &Path,
    ) -> Result<Self> {
        let retriever = Self::new(embedder, options);

        match Corpus::load(index_path, chunks_path).await {
            Ok(corpus) => {
                let expected = retriever.embedder.embedding_dimension();
                let actual = corpus.index().dimension();
                if expected != actual {
                    return Err(RetrieverError::DimensionMismatch { expected, actual });
                }
                tracing::info!(
                    "Loaded corpus with {} chunks from {}",
                    corpus.len(),
                    chunks_path.display()
                );
                *retriever.corpus.write().await = Arc::new(corpus);
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("{e}; starting without an index");
            }
            Err(e) => return Err(e),
        }

        Ok(retriever)
    }

    /// Replace the reranker used when reranking is requested.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// The currently published corpus.
    pub async fn corpus(&self) -> Arc<Corpus> {
        Arc::clone(&*self.corpus.read().await)
    }

    pub async fn is_indexed(&self) -> bool {
        !self.corpus().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.corpus().await.len()
    }

    fn normalizes(&self, metric: Metric) -> bool {
        self.options.normalize_vectors && metric == Metric::InnerProduct
    }

    /// Embed `chunks`, build a fresh index and publish it with the chunks.
    pub async fn index_documents(&self, chunks: Vec<Chunk>) -> Result<()> {
        let dimension = self.embedder.embedding_dimension();
        let mut index = FlatIndex::new(dimension, self.options.metric, self.options.precision);

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            tracing::info!(
                "Embedding {} chunks with {}",
                texts.len(),
                self.embedder.provider_name()
            );
            let mut embeddings = self.embedder.embed_texts(&texts).await?.embeddings;

            if self.normalizes(self.options.metric) {
                embeddings.iter_mut().for_each(|v| l2_normalize(v));
            }
            index.add(&embeddings)?;
        }

        let corpus = Corpus::new(Box::new(index), chunks)?;
        let count = corpus.len();
        *self.corpus.write().await = Arc::new(corpus);

        tracing::info!("Published index with {count} chunks");
        Ok(())
    }

    /// Persist the current corpus.
    pub async fn save(&self, index_path: &Path, chunks_path: &Path) -> Result<()> {
        self.corpus().await.save(index_path, chunks_path).await
    }

    /// Chunks scoring past `threshold`, best first, at most `top_k`.
    pub async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        let query = normalize_text(query);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let corpus = self.corpus().await;
        if corpus.is_empty() {
            tracing::debug!("Search on an unindexed retriever");
            return Ok(Vec::new());
        }

        let index = corpus.index();
        let metric = index.metric();

        let mut vector = self.embedder.embed_text(&query).await?;
        if self.normalizes(metric) {
            l2_normalize(&mut vector);
        }

        // Padding past the corpus size never yields a result.
        let neighbors = index.search(&vector, top_k.min(corpus.len()))?;
        let chunks = corpus.chunks();

        let mut results: Vec<SearchResult> = neighbors
            .into_iter()
            .filter_map(|neighbor| {
                let chunk = chunks.get(neighbor.position?)?;
                metric
                    .passes(neighbor.score, threshold)
                    .then(|| SearchResult {
                        chunk_id: chunk.id.clone(),
                        text: chunk.text.clone(),
                        metadata: chunk.metadata.clone(),
                        score: neighbor.score,
                        rank: 0,
                    })
            })
            .collect();

        results.sort_by(|a, b| metric.compare(a.score, b.score));
        renumber(&mut results);

        tracing::debug!(
            "Query matched {} chunks above threshold {threshold}",
            results.len()
        );
        Ok(results)
    }

    /// Search, optionally rerank, and project into [`FormattedResult`]s.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
        rerank: bool,
    ) -> Result<Vec<FormattedResult>> {
        let candidates = if rerank { top_k.saturating_mul(2) } else { top_k };
        let mut results = self.search(query, candidates, threshold).await?;

        if rerank && !results.is_empty() {
            results = self.reranker.rerank(query, results, top_k);
        }

        Ok(results.iter().map(FormattedResult::from).collect())
    }

    /// [`Retriever::retrieve`] with the configured defaults.
    pub async fn retrieve_with_defaults(&self, query: &str) -> Result<Vec<FormattedResult>> {
        self.retrieve(
            query,
            self.options.top_k,
            self.options.score_threshold,
            self.options.rerank,
        )
        .await
    }
}
