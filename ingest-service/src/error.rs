use metadata_store::StoreError;
use sync_engine::{SourceStoreError, SyncError};
use thiserror::Error;

/// Errors `ImportService` surfaces across the API boundary (spec §4.8,
/// §7). Unlike `SyncError` these are user-facing and map directly onto
/// the HTTP status codes in §6.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceStoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
