//! Configuration for embedding models

use serde::{Deserialize, Serialize};

/// Built-in model used when no explicit model is requested.
pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

/// Configuration for an embedding provider.
///
/// mnemo only drives the built-in fastembed models, so the configuration is
/// just the model selector. It is kept as a struct (and kept serializable)
/// so it can double as the provider cache key and travel through config
/// files later without an interface change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedConfig {
    model_name: String,
}

impl EmbedConfig {
    /// Create a configuration for a named model.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Cache key for the process-wide model cache.
    pub fn cache_key(&self) -> String {
        format!("v1:{}", self.model_name)
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}
