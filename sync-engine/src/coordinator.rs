use std::sync::Arc;

use chunk_model::{Chunk, CollectionId, DocId, VectorPoint};
use metadata_store::{MetadataStore, NewChunk};
use vector_store::{PointFilter, VectorStore};

use crate::error::SyncError;

/// Keeps the relational store and the vector store in agreement without
/// a shared transaction (spec §4.6). `MetadataStore`'s trait methods each
/// commit on return, so a relational transaction can't be held open across
/// the vector upsert, an external-adapter call and therefore a suspension
/// point under §5. The write-ordered compensation protocol is adapted
/// accordingly: chunk rows commit first (during the split step, see
/// `SyncEngine::step_split`), the vector upsert happens later (during the
/// embed+upsert step), and a failed upsert compensates by deleting the
/// chunk rows it would have indexed. The resulting window — chunk rows
/// present, no matching vector points — is exactly the orphaned-metadata
/// case AutoGC's reconciliation sweep (§4.10 step 1) already closes.
pub struct TransactionCoordinator {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorStore>,
}

impl TransactionCoordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { metadata, vectors }
    }

    /// Commits a document's full chunk set relationally. The vector side
    /// is pushed separately by [`Self::commit_vectors`].
    pub async fn commit_chunks(
        &self,
        doc_id: &DocId,
        collection_id: &CollectionId,
        chunks: Vec<NewChunk>,
    ) -> Result<Vec<Chunk>, SyncError> {
        self.metadata
            .replace_chunks(doc_id, collection_id, chunks)
            .await
            .map_err(Into::into)
    }

    /// Upserts vector points for chunks already committed relationally.
    /// On failure, deletes those chunk rows so the document falls back to
    /// `SPLIT_OK` rather than leaving a half-indexed `EMBED_OK` document.
    pub async fn commit_vectors(
        &self,
        doc_id: &DocId,
        collection_id: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), SyncError> {
        match self.vectors.upsert_points(collection_id, points).await {
            Ok(()) => Ok(()),
            Err(upsert_err) => {
                if let Err(compensate_err) = self.metadata.delete_chunks_by_doc(doc_id).await {
                    tracing::error!(
                        doc_id = %doc_id,
                        upsert_error = %upsert_err,
                        compensate_error = %compensate_err,
                        "failed to compensate chunk rows after vector upsert failure"
                    );
                } else {
                    tracing::warn!(doc_id = %doc_id, error = %upsert_err, "vector upsert failed, compensated chunk rows");
                }
                Err(upsert_err.into())
            }
        }
    }

    /// Idempotent collection setup on the vector side, delegated straight
    /// through so `SyncEngine` never needs its own handle to the store.
    pub async fn vectors_ensure_collection(&self, collection_id: &CollectionId, dim: usize) -> Result<(), SyncError> {
        self.vectors.ensure_collection(collection_id, dim).await.map_err(Into::into)
    }

    /// Delete path (spec §4.6.2): vector side first, then the relational
    /// side in a single transaction. A relational failure after a
    /// successful vector delete is benign — AutoGC removes the now-orphaned
    /// metadata rows on its next sweep.
    pub async fn delete_doc(&self, doc_id: &DocId, collection_id: &CollectionId) -> Result<(), SyncError> {
        self.vectors
            .delete_points_by_filter(collection_id, PointFilter::Doc(doc_id.clone()))
            .await?;
        self.metadata.hard_delete_document(doc_id).await?;
        Ok(())
    }

    /// Purges every vector point in a collection, used by
    /// `ImportService::delete_collection` before the relational cascade
    /// delete (spec §4.8).
    pub async fn vectors_delete_collection(&self, collection_id: &CollectionId) -> Result<u64, SyncError> {
        self.vectors
            .delete_points_by_filter(collection_id, PointFilter::Collection)
            .await
            .map_err(Into::into)
    }

    /// Same ordering as [`Self::delete_doc`] but keeps the document row
    /// itself, for `resync` (spec §4.8): the document is re-ingested under
    /// the same `docId`, not recreated.
    pub async fn reset_doc(&self, doc_id: &DocId, collection_id: &CollectionId) -> Result<(), SyncError> {
        self.vectors
            .delete_points_by_filter(collection_id, PointFilter::Doc(doc_id.clone()))
            .await?;
        self.metadata.delete_chunks_by_doc(doc_id).await?;
        Ok(())
    }
}
