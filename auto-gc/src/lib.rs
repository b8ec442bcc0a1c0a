//! Scheduled reconciliation sweep (spec §4.10): heals divergence between
//! the relational and vector stores and hard-deletes soft-deleted
//! documents. Pure library function so both the `server` scheduling loop
//! and `tools/syncctl` (on-demand runs) can call it.

mod error;

pub use error::GcError;

use std::collections::HashSet;

use chunk_model::{CollectionId, PointId};
use metadata_store::MetadataStore;
use serde::Serialize;
use vector_store::{PointFilter, VectorStore, VectorStoreError};

/// Outcome of one collection's sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionGcReport {
    pub collection_id: CollectionId,
    pub orphaned_vectors_deleted: u64,
    pub orphaned_metadata_deleted: u64,
    pub soft_deleted_purged: u64,
    /// Set if this collection's sweep failed partway; other collections
    /// are still swept (spec §4.10: "failure of GC for one collection
    /// must not prevent other collections from being swept").
    pub error: Option<String>,
}

/// Outcome of a full run across every collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GcReport {
    pub per_collection: Vec<CollectionGcReport>,
}

/// Runs one GC sweep across every collection. Idempotent: a second run on
/// a healthy system finds nothing to delete.
pub async fn run_once(metadata: &dyn MetadataStore, vectors: &dyn VectorStore) -> GcReport {
    let collections = match metadata.list_collections().await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "gc: failed to list collections, skipping run");
            return GcReport::default();
        }
    };

    let mut per_collection = Vec::with_capacity(collections.len());
    for collection in collections {
        let report = sweep_collection(metadata, vectors, collection.collection_id).await;
        per_collection.push(report);
    }
    GcReport { per_collection }
}

async fn sweep_collection(metadata: &dyn MetadataStore, vectors: &dyn VectorStore, collection_id: CollectionId) -> CollectionGcReport {
    match sweep_collection_inner(metadata, vectors, &collection_id).await {
        Ok(mut report) => {
            report.collection_id = collection_id;
            report
        }
        Err(err) => {
            tracing::error!(collection_id = %collection_id, error = %err, "gc sweep failed for collection");
            CollectionGcReport {
                collection_id,
                orphaned_vectors_deleted: 0,
                orphaned_metadata_deleted: 0,
                soft_deleted_purged: 0,
                error: Some(err.to_string()),
            }
        }
    }
}

async fn sweep_collection_inner(
    metadata: &dyn MetadataStore,
    vectors: &dyn VectorStore,
    collection_id: &CollectionId,
) -> Result<CollectionGcReport, GcError> {
    let metadata_points: HashSet<PointId> = metadata.list_point_ids_by_collection(collection_id).await?.into_iter().collect();
    let vector_points: HashSet<PointId> = match vectors.list_all_point_ids(collection_id).await {
        Ok(points) => points.into_iter().collect(),
        Err(VectorStoreError::NotFound(_)) => HashSet::new(),
        Err(other) => return Err(other.into()),
    };

    let orphaned_vectors: Vec<PointId> = vector_points.difference(&metadata_points).cloned().collect();
    let orphaned_vectors_deleted = orphaned_vectors.len() as u64;
    if !orphaned_vectors.is_empty() {
        vectors.delete_points(collection_id, &orphaned_vectors).await?;
    }

    let orphaned_metadata: Vec<PointId> = metadata_points.difference(&vector_points).cloned().collect();
    let orphaned_metadata_deleted = if orphaned_metadata.is_empty() {
        0
    } else {
        metadata.delete_chunks_by_point_ids(&orphaned_metadata).await?
    };

    let deleted_documents = metadata.list_deleted_documents(collection_id).await?;
    let mut soft_deleted_purged = 0u64;
    for doc in deleted_documents {
        match vectors.delete_points_by_filter(collection_id, PointFilter::Doc(doc.doc_id.clone())).await {
            Ok(_) | Err(VectorStoreError::NotFound(_)) => {}
            Err(other) => return Err(other.into()),
        }
        metadata.hard_delete_document(&doc.doc_id).await?;
        soft_deleted_purged += 1;
    }

    Ok(CollectionGcReport {
        collection_id: collection_id.clone(),
        orphaned_vectors_deleted,
        orphaned_metadata_deleted,
        soft_deleted_purged,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunk_model::{DocId, VectorPayload, VectorPoint};
    use metadata_store::{NewChunk, SqliteMetadataStore};
    use vector_store::NullVectorStore;

    use super::*;

    #[tokio::test]
    async fn deletes_orphaned_vector_points() {
        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let vectors = NullVectorStore::new();
        let collection = metadata.create_collection("c1", None).await.unwrap();
        vectors.ensure_collection(&collection.collection_id, 2).await.unwrap();

        // A vector point with no matching chunk row: simulates a crash
        // between vector upsert and... actually simulates any divergence.
        let orphan_id = chunk_model::PointId("ghost#0".into());
        vectors
            .upsert_points(
                &collection.collection_id,
                vec![VectorPoint {
                    point_id: orphan_id.clone(),
                    vector: vec![1.0, 0.0],
                    payload: VectorPayload {
                        doc_id: DocId("ghost".into()),
                        collection_id: collection.collection_id.clone(),
                        chunk_index: 0,
                        title_chain: vec![],
                        content_hash: "h".into(),
                    },
                }],
            )
            .await
            .unwrap();

        let report = run_once(&metadata, &vectors).await;
        assert_eq!(report.per_collection.len(), 1);
        assert_eq!(report.per_collection[0].orphaned_vectors_deleted, 1);
        assert!(vectors.list_all_point_ids(&collection.collection_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletes_orphaned_metadata_rows() {
        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let vectors = NullVectorStore::new();
        let collection = metadata.create_collection("c1", None).await.unwrap();
        vectors.ensure_collection(&collection.collection_id, 2).await.unwrap();

        let doc = metadata
            .create_document(&DocId("d1".into()), &collection.collection_id, "d1", "f.md", "text/markdown", 4, "h")
            .await
            .unwrap();
        metadata
            .replace_chunks(
                &doc.doc_id,
                &collection.collection_id,
                vec![NewChunk { chunk_index: 0, title_chain: vec![], content_hash: "h0".into(), content: "body".into() }],
            )
            .await
            .unwrap();

        let report = run_once(&metadata, &vectors).await;
        assert_eq!(report.per_collection[0].orphaned_metadata_deleted, 1);
        assert!(metadata.list_point_ids_by_collection(&collection.collection_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purges_soft_deleted_documents() {
        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let vectors = NullVectorStore::new();
        let collection = metadata.create_collection("c1", None).await.unwrap();
        vectors.ensure_collection(&collection.collection_id, 2).await.unwrap();

        let doc = metadata
            .create_document(&DocId("d1".into()), &collection.collection_id, "d1", "f.md", "text/markdown", 4, "h")
            .await
            .unwrap();
        metadata.mark_doc_deleted(&doc.doc_id).await.unwrap();

        let report = run_once(&metadata, &vectors).await;
        assert_eq!(report.per_collection[0].soft_deleted_purged, 1);
        assert!(metadata.get_document(&doc.doc_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_run_on_healthy_system_is_a_no_op() {
        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let vectors = NullVectorStore::new();
        metadata.create_collection("c1", None).await.unwrap();

        run_once(&metadata, &vectors).await;
        let report = run_once(&metadata, &vectors).await;
        assert_eq!(report.per_collection[0].orphaned_vectors_deleted, 0);
        assert_eq!(report.per_collection[0].orphaned_metadata_deleted, 0);
        assert_eq!(report.per_collection[0].soft_deleted_purged, 0);
        assert!(report.per_collection[0].error.is_none());
    }
}
