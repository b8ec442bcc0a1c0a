//! Batch text-to-vector embedding (spec §4.5): an adapter-over-class
//! capability trait, an HTTP-backed default implementation, an optional
//! local ONNX implementation behind the `onnx` feature, and a deterministic
//! test double.

mod hash;
mod http;
#[cfg(feature = "onnx")]
mod onnx;

pub use hash::HashEmbeddingProvider;
pub use http::HttpEmbeddingProvider;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbeddingProvider;

use async_trait::async_trait;
use chunk_model::ErrorCategory;
use thiserror::Error;

/// Errors an [`EmbeddingProvider`] implementation can produce.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding input must not be empty")]
    EmptyInput,

    #[error("rate limited by embedding provider")]
    RateLimited,

    #[error("network error talking to embedding provider: {0}")]
    Network(String),

    #[error("embedding provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("malformed response from embedding provider: {0}")]
    Malformed(String),
}

impl EmbedError {
    /// Maps to the shared retry taxonomy `sync-engine`'s `ErrorClassifier`
    /// consumes (spec §4.7): rate-limit/network/5xx are transient,
    /// authentication and contract violations are permanent.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EmbedError::EmptyInput => ErrorCategory::PermanentClient,
            EmbedError::RateLimited => ErrorCategory::TransientRateLimit,
            EmbedError::Network(_) => ErrorCategory::TransientNetwork,
            EmbedError::Unauthorized(_) => ErrorCategory::PermanentClient,
            EmbedError::CountMismatch { .. } => ErrorCategory::PermanentData,
            EmbedError::Malformed(_) => ErrorCategory::PermanentData,
        }
    }
}

/// Batch text → fixed-dimension vector embedding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The fixed dimension every returned vector has.
    fn dimension(&self) -> usize;

    /// Embeds `texts` in implementation-chosen batches. Empty strings are
    /// rejected; the output vector count always equals the input count or
    /// the call fails with [`EmbedError::CountMismatch`].
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Validates the shared precondition every implementation enforces before
/// doing any provider-specific work.
pub(crate) fn reject_empty(texts: &[String]) -> Result<(), EmbedError> {
    if texts.iter().any(|t| t.is_empty()) {
        return Err(EmbedError::EmptyInput);
    }
    Ok(())
}
