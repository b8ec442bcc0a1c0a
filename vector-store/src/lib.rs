//! The vector half of the dual-store (spec §4.4): an adapter-over-class
//! capability trait plus one in-process implementation and a test double.
//!
//! The core never specifies *how* nearest-neighbor search works, only the
//! contract: idempotent collection creation, atomic-per-call upserts,
//! deletes by id or by filter, full enumeration for reconciliation, and
//! ranked search. [`HnswVectorStore`] is the default/demo backend; a
//! networked backend can implement the same trait without touching
//! `sync-engine`.

mod hnsw;
mod null;

pub use hnsw::HnswVectorStore;
pub use null::NullVectorStore;

use async_trait::async_trait;
use chunk_model::{CollectionId, DocId, PointId, VectorPoint};
use thiserror::Error;

/// Errors a [`VectorStore`] implementation can produce.
///
/// The split between `Validation`/`NotFound` (client-like) and `Backend`
/// (server-like) mirrors the "adapter distinguishes 4xx-like from 5xx-like"
/// requirement in spec §4.4, so `sync-engine`'s `ErrorClassifier` can map
/// these onto retry categories without inspecting backend-specific detail.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("collection not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl VectorStoreError {
    /// Whether a retry is plausibly useful, as opposed to a caller bug.
    pub fn is_transient(&self) -> bool {
        matches!(self, VectorStoreError::Backend(_))
    }
}

/// A filter for bulk deletion, scoped to a single collection (spec §4.4).
#[derive(Debug, Clone)]
pub enum PointFilter {
    /// Every point belonging to one document.
    Doc(DocId),
    /// Every point in the collection.
    Collection,
}

/// A single search hit: higher `score` is a better match.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub point_id: PointId,
    pub score: f32,
}

/// The vector store's full contract (spec §4.4).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent: creating a collection that already exists with the same
    /// `dim` is a no-op; a `dim` mismatch is a validation error.
    async fn ensure_collection(&self, collection: &CollectionId, dim: usize) -> Result<(), VectorStoreError>;

    /// Atomic per call: either every point is durably stored or none are.
    /// Order-independent; re-upserting an existing `pointId` replaces it.
    async fn upsert_points(&self, collection: &CollectionId, points: Vec<VectorPoint>) -> Result<(), VectorStoreError>;

    async fn delete_points(&self, collection: &CollectionId, point_ids: &[PointId]) -> Result<(), VectorStoreError>;

    async fn delete_points_by_filter(&self, collection: &CollectionId, filter: PointFilter) -> Result<u64, VectorStoreError>;

    /// Enumerates every live point id in the collection, for AutoGC's
    /// reconciliation diff against `MetadataStore::list_point_ids_by_collection`.
    async fn list_all_point_ids(&self, collection: &CollectionId) -> Result<Vec<PointId>, VectorStoreError>;

    /// Ordered best-to-worst; `filter` narrows candidates before ranking.
    async fn search(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;
}
