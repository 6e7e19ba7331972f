//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// The variants separate failures that happen once, while the model is being
/// resolved and loaded, from failures that happen per input while texts are
/// being encoded. Callers that keep a long-lived provider usually only ever see
/// [`EmbedError::Encoding`].
///
/// # Error Categories
///
/// - **Configuration Errors**: unknown model names, zero batch sizes
/// - **Load Errors**: the model could not be downloaded or initialized
/// - **Runtime Errors**: tokenization or inference failed for an input
/// - **IO Errors**: the model cache directory could not be prepared
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model could not be resolved or loaded
    #[error("Embedding model '{model}' is unavailable: {source}")]
    ModelUnavailable {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Tokenization or inference failed for an input batch
    #[error("Embedding generation failed: {source}")]
    Encoding {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error when model configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// IO errors when preparing the model cache
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Wrap a load failure for `model`.
    pub fn model_unavailable<E>(model: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelUnavailable {
            model: model.into(),
            source: source.into(),
        }
    }

    /// Wrap a tokenization or inference failure.
    ///
    /// Accepts anything convertible into a boxed error, which includes the
    /// `anyhow::Error` values returned by fastembed.
    pub fn encoding<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Encoding {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
