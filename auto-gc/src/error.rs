use metadata_store::StoreError;
use thiserror::Error;
use vector_store::VectorStoreError;

#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vector(#[from] VectorStoreError),
}
