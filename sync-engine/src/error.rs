use chunk_model::ErrorCategory;
use embedding_provider::EmbedError;
use metadata_store::StoreError;
use thiserror::Error;
use vector_store::VectorStoreError;

use crate::source::SourceStoreError;

/// Every failure a sync step can produce, tagged with enough information
/// for [`SyncError::category`] to feed the retry policy (spec §4.7).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vector(#[from] VectorStoreError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Source(#[from] SourceStoreError),

    #[error("document content is not valid: {0}")]
    InvalidDocument(String),

    #[error("invariant violated: {0}")]
    InvalidState(String),
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Store(e) => match e {
                StoreError::NotFound(_) => ErrorCategory::PermanentData,
                StoreError::Conflict(_) | StoreError::Validation(_) => ErrorCategory::PermanentClient,
                StoreError::Sqlite(_) | StoreError::Pool(_) => ErrorCategory::TransientStore,
            },
            SyncError::Vector(e) => match e {
                VectorStoreError::Validation(_) => ErrorCategory::PermanentClient,
                VectorStoreError::NotFound(_) => ErrorCategory::PermanentData,
                VectorStoreError::Backend(_) => ErrorCategory::TransientStore,
            },
            SyncError::Embed(e) => e.category(),
            SyncError::Source(e) => match e {
                SourceStoreError::NotFound(_) => ErrorCategory::PermanentData,
                SourceStoreError::Io(_) => ErrorCategory::TransientStore,
            },
            SyncError::InvalidDocument(_) => ErrorCategory::PermanentData,
            SyncError::InvalidState(_) => ErrorCategory::PermanentData,
        }
    }
}
