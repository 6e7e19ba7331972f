//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// Models the fastembed provider knows how to load, with their output dimension.
pub const KNOWN_MODELS: &[(&str, usize)] = &[
    ("paraphrase-multilingual-MiniLM-L12-v2", 384),
    ("all-MiniLM-L6-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("multilingual-e5-small", 384),
];

/// Configuration for embedding models.
///
/// Deserializes from the `[embedding]` table of the application config; every
/// field has a default so a partial table is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use. A `sentence-transformers/` or
    /// other organisation prefix is accepted and ignored.
    pub model: String,
    /// Expected output dimension. Checked against the loaded model when set.
    pub dimension: Option<usize>,
    /// Directory where downloaded model files are cached
    pub cache_dir: PathBuf,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Whether fastembed prints download progress
    pub show_download_progress: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            dimension: Some(384),
            cache_dir: PathBuf::from(".fastembed_cache"),
            batch_size: 32,
            normalize: true,
            show_download_progress: false,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for `model` with default settings otherwise.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = known_dimension(&model);
        Self {
            model,
            dimension,
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir(self, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..self
        }
    }

    /// Model name without any organisation prefix.
    pub fn model_name(&self) -> &str {
        short_model_name(&self.model)
    }

    /// Validate settings that do not require loading the model.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "batch_size must be greater than zero",
            ));
        }
        if self.dimension == Some(0) {
            return Err(EmbedError::invalid_config(
                "dimension must be greater than zero",
            ));
        }
        if let (Some(expected), Some(known)) = (self.dimension, known_dimension(&self.model)) {
            if expected != known {
                return Err(EmbedError::invalid_config(format!(
                    "model '{}' produces {known}-dimensional vectors, config expects {expected}",
                    self.model_name()
                )));
            }
        }
        Ok(())
    }
}

/// Strip an organisation prefix such as `sentence-transformers/`.
pub fn short_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Dimension of a known model, matched case-insensitively.
pub fn known_dimension(model: &str) -> Option<usize> {
    let name = short_model_name(model);
    KNOWN_MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, dimension)| *dimension)
}
