use metadata_store::StoreError;
use vector_store::VectorStoreError;
use thiserror::Error;

/// Errors `HybridSearch` can surface. Embedding failure is intentionally
/// absent: it's handled as a best-effort fallback to keyword-only results
/// (spec §4.9), never an error.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vector(#[from] VectorStoreError),
}
