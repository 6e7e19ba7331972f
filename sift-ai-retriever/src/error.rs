//! Error types for the retriever crate

use std::path::PathBuf;

/// Result type for retriever operations.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Errors raised while building, persisting or querying a corpus.
///
/// An empty search result is not an error; it simply means nothing scored
/// above the threshold.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// A persisted artifact (index or chunk store) does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A vector's length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration values that cannot work together
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// The index file exists but cannot be decoded
    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    /// Index and chunk store were built from different corpora
    #[error("Index holds {vectors} vectors but the chunk store holds {chunks} chunks")]
    ArtifactMismatch { vectors: usize, chunks: usize },

    /// Same length, but the index was built from a different chunk sequence
    #[error("Index fingerprint {index} does not match the chunk store fingerprint {chunks}")]
    StaleArtifacts { index: String, chunks: String },

    /// `k` above what an index will materialize in one answer
    #[error("Requested {requested} neighbors, at most {max} are supported")]
    SearchLimit { requested: usize, max: usize },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Embed(#[from] sift_ai_embed::EmbedError),
}

impl RetrieverError {
    /// Whether this error means a persisted artifact is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Map an IO error on `path` into [`RetrieverError::NotFound`] when the file is missing.
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io(error)
        }
    }
}
