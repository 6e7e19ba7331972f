//! sift-ai-retriever: passage retrieval over a crawled document collection
//!
//! This crate turns crawler output into a searchable corpus and answers
//! natural-language queries with the most relevant passages, ready to be
//! handed to an answer generator.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: document loading, the [`retrieval::Retriever`], reranking and generation seams
//! - **[`storage`]**: the vector index and the chunk store
//! - **[`config`]**: `sift.toml` configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sift_ai_embed::FastEmbedProvider;
//! use sift_ai_retriever::{config::SiftConfig, retrieval::Retriever};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SiftConfig::load("sift.toml".as_ref())?;
//! let embedder = Arc::new(FastEmbedProvider::create(config.embedding.clone()).await?);
//! let retriever = Retriever::open(
//!     embedder,
//!     config.retrieval_options(),
//!     &config.paths.index_path,
//!     &config.paths.chunks_path,
//! )
//! .await?;
//!
//! for result in retriever.retrieve_with_defaults("How do I change my tariff?").await? {
//!     println!("{:.3} {} {}", result.score, result.title, result.source_url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrieverError};
