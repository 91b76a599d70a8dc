//! mnemo-embed: the embedding capability boundary for mnemo.
//!
//! The rest of the system consumes embeddings only through the
//! [`EmbeddingProvider`] trait: text in, fixed-dimension `f32` vector out.
//! Whether a working model is available is a construction-time question:
//! callers hold an `Option<Arc<dyn EmbeddingProvider>>` and degrade to
//! keyword-only behavior when construction fails.
//!
//! [`FastEmbedProvider`] is the concrete implementation, backed by the
//! `fastembed` ONNX models. Model loading happens on a blocking task and
//! loaded models are cached process-wide, so constructing several providers
//! with the same configuration pays the load cost once.

pub mod config;
pub mod error;
pub mod provider;

pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
