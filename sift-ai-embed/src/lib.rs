//! # sift-ai-embed
//!
//! Text embeddings for the sift retrieval pipeline, generated locally with
//! ONNX models through FastEmbed.
//!
//! ## Features
//!
//! - **Local ONNX Models**: no external API calls once the model is cached
//! - **Async-First Design**: inference runs on tokio's blocking pool
//! - **Multilingual Default**: `paraphrase-multilingual-MiniLM-L12-v2`, 384 dimensions
//! - **Normalized Output**: vectors are L2-normalized unless disabled, so an
//!   inner product is a cosine similarity
//!
//! ## Quick Start
//!
//! ```no_run
//! use sift_ai_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "Привет, мир".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: model selection and batching settings
//! - [`provider`]: the [`EmbeddingProvider`] trait and the FastEmbed implementation
//! - [`error`]: error types and result handling
//!
//! Other crates depend on [`EmbeddingProvider`] rather than on
//! [`FastEmbedProvider`], so tests can substitute a deterministic in-memory
//! provider without downloading a model.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_MODEL, EmbedConfig, KNOWN_MODELS, known_dimension};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, l2_normalize};
