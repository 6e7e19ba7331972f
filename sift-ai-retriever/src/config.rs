//! Application configuration loaded from `sift.toml`.
//!
//! Every section and every key is optional; a missing file means defaults.
//!
//! ```
//! use sift_ai_retriever::config::SiftConfig;
//!
//! let config = SiftConfig::from_toml(r#"
//! [retrieval]
//! top_k = 5
//!
//! [index]
//! metric = "IndexFlatL2"
//! "#).unwrap();
//!
//! assert_eq!(config.retrieval.top_k, 5);
//! assert_eq!(config.chunking.chunk_size, 512);
//! ```

use crate::error::{Result, RetrieverError};
use crate::retrieval::RetrievalOptions;
use crate::storage::{Metric, Precision};
use serde::{Deserialize, Serialize};
use sift_ai_context::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, ParagraphChunker};
use sift_ai_embed::EmbedConfig;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sift.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiftConfig {
    #[serde(default)]
    pub embedding: EmbedConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl SiftConfig {
    /// Load and validate the configuration at `path`, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No configuration at {}, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<()> {
        self.embedding
            .validate()
            .map_err(|e| RetrieverError::Config(e.to_string()))?;
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(RetrieverError::Config(
                "retrieval.top_k must be greater than zero".to_string(),
            ));
        }
        if !self.retrieval.score_threshold.is_finite() {
            return Err(RetrieverError::Config(
                "retrieval.score_threshold must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Options the retriever is built with.
    pub fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            metric: self.index.metric,
            precision: self.index.precision,
            normalize_vectors: self.retrieval.normalize_vectors,
            top_k: self.retrieval.top_k,
            score_threshold: self.retrieval.score_threshold,
            rerank: self.retrieval.rerank,
        }
    }
}

/// `[index]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub precision: Precision,
}

/// `[chunking]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RetrieverError::Config(
                "chunking.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RetrieverError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn chunker(&self) -> ParagraphChunker {
        ParagraphChunker::new(self.chunk_size, self.overlap)
    }
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Cosine floor for inner product, maximum distance for L2.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_true")]
    pub normalize_vectors: bool,
    #[serde(default)]
    pub rerank: bool,
}

fn default_top_k() -> usize {
    3
}

fn default_score_threshold() -> f32 {
    0.35
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            normalize_vectors: true,
            rerank: false,
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_chunks_path")]
    pub chunks_path: PathBuf,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_chunks_path() -> PathBuf {
    PathBuf::from("data/processed/documents.json")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index.sift")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            chunks_path: default_chunks_path(),
            index_path: default_index_path(),
        }
    }
}

/// `[messages]` section: fixed texts shown by the interactive front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Printed when nothing scores above the threshold.
    #[serde(default = "default_miss")]
    pub miss: String,
    #[serde(default = "default_bye")]
    pub bye: String,
    /// Label placed before the source link appended to answers.
    #[serde(default = "default_source_label")]
    pub source_label: String,
}

fn default_prompt() -> String {
    "Question: ".into()
}

fn default_miss() -> String {
    "Sorry, there is no reliable information on this question. Please contact the support team."
        .into()
}

fn default_bye() -> String {
    "Thank you for choosing us! See you soon!".into()
}

fn default_source_label() -> String {
    "Read more at:".into()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            miss: default_miss(),
            bye: default_bye(),
            source_label: default_source_label(),
        }
    }
}

/// `[generation]` section: how prompts for an answer model are assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    "You are a virtual assistant answering customer questions. Answer briefly, in a \
     friendly and professional tone, using only the information provided from the \
     website. Do not use formatting, emoji or markdown. If the answer is not in the \
     provided information, say so and suggest contacting support."
        .into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SiftConfig::default();
        assert_eq!(config.embedding.model, "paraphrase-multilingual-MiniLM-L12-v2");
        assert_eq!(config.index.metric, Metric::InnerProduct);
        assert_eq!(config.index.precision, Precision::F32);
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.score_threshold, 0.35);
        assert!(config.retrieval.normalize_vectors);
        assert!(!config.retrieval.rerank);
        assert_eq!(config.paths.index_path, PathBuf::from("data/index.sift"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(SiftConfig::from_toml("").unwrap(), SiftConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let config = SiftConfig::from_toml(
            r#"
            [embedding]
            model = "all-MiniLM-L6-v2"
            batch_size = 8

            [index]
            metric = "l2"
            precision = "f16"

            [chunking]
            chunk_size = 300
            overlap = 30

            [retrieval]
            top_k = 4
            score_threshold = 1.5
            rerank = true

            [paths]
            raw_dir = "crawl/out"

            [messages]
            miss = "Nothing found."

            [generation]
            system_prompt = "Answer in one sentence."
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.batch_size, 8);
        assert_eq!(config.index.metric, Metric::L2);
        assert_eq!(config.index.precision, Precision::F16);
        assert_eq!(config.chunking.chunker().chunk_size(), 300);
        assert_eq!(config.paths.raw_dir, PathBuf::from("crawl/out"));
        assert_eq!(config.paths.chunks_path, default_chunks_path());
        assert_eq!(config.messages.miss, "Nothing found.");
        assert_eq!(config.messages.bye, default_bye());
        assert_eq!(config.generation.system_prompt, "Answer in one sentence.");

        let options = config.retrieval_options();
        assert_eq!(options.top_k, 4);
        assert_eq!(options.score_threshold, 1.5);
        assert!(options.rerank);
        assert_eq!(options.metric, Metric::L2);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[chunking]\nchunk_size = 0",
            "[chunking]\nchunk_size = 100\noverlap = 100",
            "[retrieval]\ntop_k = 0",
            "[embedding]\nbatch_size = 0",
        ];
        for case in cases {
            let err = SiftConfig::from_toml(case).unwrap_err();
            assert!(matches!(err, RetrieverError::Config(_)), "{case}: {err}");
        }
    }

    #[test]
    fn test_invalid_metric_is_toml_error() {
        let err = SiftConfig::from_toml("[index]\nmetric = \"cosine\"").unwrap_err();
        assert!(matches!(err, RetrieverError::Toml(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = SiftConfig::load(&dir.path().join("sift.toml")).unwrap();
        assert_eq!(config, SiftConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sift.toml");
        std::fs::write(&path, "[retrieval]\nscore_threshold = 0.5\n").unwrap();
        let config = SiftConfig::load(&path).unwrap();
        assert_eq!(config.retrieval.score_threshold, 0.5);
    }
}
