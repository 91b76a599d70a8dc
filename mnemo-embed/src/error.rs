//! Error types for the embedding system

/// Result type for embedding operations.
///
/// Convenience alias using [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type covering everything that can go wrong between "give me a
/// vector for this text" and actually producing one.
///
/// Every variant here is non-fatal from the store's point of view: a failed
/// embedding degrades the record or the query to keyword behavior, it never
/// aborts an operation.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type, including
    /// the opaque errors fastembed surfaces.
    pub fn model_init(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::EmbeddingGeneration {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_init_wraps_opaque_errors() {
        let err = EmbedError::model_init(anyhow::anyhow!("onnx runtime missing"));
        assert!(matches!(err, EmbedError::ModelInitialization { .. }));
        assert!(err.to_string().contains("Model initialization failed"));
        assert!(err.to_string().contains("onnx runtime missing"));
    }

    #[test]
    fn test_embedding_gen_wraps_messages_and_errors() {
        let err = EmbedError::embedding_gen("empty batch output");
        assert!(matches!(err, EmbedError::EmbeddingGeneration { .. }));
        assert!(err.to_string().contains("Embedding generation failed"));

        let io = std::io::Error::other("disk gone");
        let err = EmbedError::embedding_gen(io);
        assert!(err.to_string().contains("disk gone"));
    }
}
