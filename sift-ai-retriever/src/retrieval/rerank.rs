//! Reranking seam applied after threshold filtering.

use super::SearchResult;

/// Reorders retrieved candidates. Implementations receive up to twice the
/// requested number of results and return at most `top_k`.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult>;

    fn name(&self) -> &str;
}

/// Keeps the similarity order and truncates.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReranker;

impl Reranker for IdentityReranker {
    fn rerank(&self, _query: &str, mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
        results.truncate(top_k);
        renumber(&mut results);
        results
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Assign 1-based ranks in the current order.
pub fn renumber(results: &mut [SearchResult]) {
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}
