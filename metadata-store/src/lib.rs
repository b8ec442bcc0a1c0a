//! The relational half of the dual-store: collections, documents, chunks,
//! full-text search, and the sync-job table.
//!
//! The capability is expressed as a trait (spec §9 "adapter-over-class")
//! so `sync-engine`, `ingest-service`, and `hybrid-search` depend only on
//! `MetadataStore`, never on `rusqlite` directly. [`SqliteMetadataStore`]
//! is the one production implementation, backed by a pooled SQLite
//! connection and an FTS5 virtual table kept consistent by triggers.

mod schema;
mod sqlite_store;

pub use sqlite_store::SqliteMetadataStore;

use async_trait::async_trait;
use chunk_model::{Chunk, Collection, DocId, DocStatus, Document, ErrorCategory, PointId, SyncJob};
use thiserror::Error;

/// Errors a [`MetadataStore`] implementation can produce.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// A full-text search hit, ranked 1-based best-to-worst.
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub point_id: PointId,
    pub rank: usize,
}

/// A single chunk row to insert, produced by the splitter and stamped
/// with its content hash by the caller (`sync-engine`).
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: u32,
    pub title_chain: Vec<String>,
    pub content_hash: String,
    pub content: String,
}

/// Fields needed to update a [`SyncJob`] after an attempt.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub status: DocStatus,
    pub retries: u32,
    pub last_error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub next_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Aggregate counts used by `job-monitor`.
#[derive(Debug, Clone, Default)]
pub struct StatusCounts {
    pub new: u64,
    pub split_ok: u64,
    pub embed_ok: u64,
    pub synced: u64,
    pub failed: u64,
    pub retrying: u64,
    pub dead: u64,
}

/// The relational store's full contract (spec §4.3).
///
/// Every write here that touches more than one table commits as a single
/// transaction; callers never observe a partial write.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // -- collections --------------------------------------------------

    async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, StoreError>;

    async fn get_collection(
        &self,
        collection_id: &chunk_model::CollectionId,
    ) -> Result<Option<Collection>, StoreError>;

    async fn list_collections(&self) -> Result<Vec<Collection>, StoreError>;

    /// Cascades to every document, chunk, and FTS row owned by the
    /// collection (spec invariant I5: atomic from the caller's view).
    async fn delete_collection(&self, collection_id: &chunk_model::CollectionId) -> Result<(), StoreError>;

    // -- documents ------------------------------------------------------

    /// Inserts a new document row, or returns the existing one unchanged
    /// if a non-deleted document with the same `doc_id` already exists in
    /// the collection (upsert-by-content, spec P2).
    #[allow(clippy::too_many_arguments)]
    async fn create_document(
        &self,
        doc_id: &DocId,
        collection_id: &chunk_model::CollectionId,
        source_key: &str,
        name: &str,
        mime: &str,
        size_bytes: u64,
        content_hash: &str,
    ) -> Result<Document, StoreError>;

    async fn get_document(&self, doc_id: &DocId) -> Result<Option<Document>, StoreError>;

    async fn set_document_status(&self, doc_id: &DocId, status: DocStatus) -> Result<(), StoreError>;

    async fn mark_synced(&self, doc_id: &DocId, synced_at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError>;

    /// Soft-delete: `isDeleted = true`. Does not remove any row.
    async fn mark_doc_deleted(&self, doc_id: &DocId) -> Result<(), StoreError>;

    /// Hard-delete: removes the document row and cascades to its chunks,
    /// FTS rows, and sync job. Used by AutoGC and collection-delete.
    async fn hard_delete_document(&self, doc_id: &DocId) -> Result<(), StoreError>;

    async fn list_deleted_documents(&self, collection_id: &chunk_model::CollectionId) -> Result<Vec<Document>, StoreError>;

    // -- chunks -----------------------------------------------------------

    /// Replaces the document's full chunk set atomically: deletes any
    /// existing chunks/FTS rows for `doc_id`, then inserts `chunks`, in a
    /// single transaction.
    async fn replace_chunks(
        &self,
        doc_id: &DocId,
        collection_id: &chunk_model::CollectionId,
        chunks: Vec<NewChunk>,
    ) -> Result<Vec<Chunk>, StoreError>;

    async fn list_chunks_by_doc(&self, doc_id: &DocId) -> Result<Vec<Chunk>, StoreError>;

    async fn get_chunks(&self, point_ids: &[PointId], collection_id: &chunk_model::CollectionId) -> Result<Vec<Chunk>, StoreError>;

    async fn delete_chunks_by_doc(&self, doc_id: &DocId) -> Result<(), StoreError>;

    async fn delete_chunks_by_point_ids(&self, point_ids: &[PointId]) -> Result<u64, StoreError>;

    async fn list_point_ids_by_collection(&self, collection_id: &chunk_model::CollectionId) -> Result<Vec<PointId>, StoreError>;

    async fn list_point_ids_by_doc(&self, doc_id: &DocId) -> Result<Vec<PointId>, StoreError>;

    // -- search -------------------------------------------------------------

    /// Full-text search, ordered best-to-worst, excluding soft-deleted
    /// documents. `query` must be non-empty.
    async fn fts_search(
        &self,
        query: &str,
        collection_id: &chunk_model::CollectionId,
        limit: usize,
    ) -> Result<Vec<FtsHit>, StoreError>;

    // -- sync jobs ------------------------------------------------------------

    async fn create_sync_job(&self, doc_id: &DocId) -> Result<SyncJob, StoreError>;

    async fn get_sync_job(&self, doc_id: &DocId) -> Result<Option<SyncJob>, StoreError>;

    async fn update_sync_job(&self, doc_id: &DocId, update: JobUpdate) -> Result<SyncJob, StoreError>;

    async fn reset_sync_job(&self, doc_id: &DocId) -> Result<SyncJob, StoreError>;

    /// Jobs not yet in a terminal state, used by `Initialize()` on
    /// restart (spec §4.7 crash recovery).
    async fn list_non_terminal_jobs(&self) -> Result<Vec<SyncJob>, StoreError>;

    async fn list_jobs_by_status(&self, status: DocStatus) -> Result<Vec<SyncJob>, StoreError>;

    async fn status_counts(&self) -> Result<StatusCounts, StoreError>;

    async fn recent_failures(&self, limit: usize) -> Result<Vec<SyncJob>, StoreError>;
}
