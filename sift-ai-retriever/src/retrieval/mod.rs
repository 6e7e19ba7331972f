//! Building and querying the passage corpus.
//!
//! ```text
//! raw JSON ── documents ── Chunker ── Retriever::index_documents ── Corpus (index + chunks)
//!                                                                      │
//! query ── normalize ── embed ── VectorIndex::search ── threshold ── rank ── rerank ── FormattedResult
//! ```

pub mod corpus;
pub mod documents;
pub mod generation;
pub mod pipeline;
pub mod rerank;
pub mod retriever;

pub use corpus::{Corpus, CorpusStats};
pub use generation::{
    AnswerGenerator, ExtractiveGenerator, Prompt, append_source_link, build_prompt, format_context,
};
pub use pipeline::{PrepareReport, prepare};
pub use rerank::{IdentityReranker, Reranker};
pub use retriever::{FormattedResult, RetrievalOptions, Retriever, SearchResult};
