//! Upload/create/delete/resync document lifecycle (spec §4.8): the single
//! entry point that turns an uploaded file into a triggered sync job.

mod error;
mod service;

pub use error::ImportError;
pub use service::{ImportService, ALLOWED_MIME_TYPES, DEFAULT_MAX_UPLOAD_SIZE};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunk_model::DocStatus;
    use embedding_provider::HashEmbeddingProvider;
    use metadata_store::{MetadataStore, SqliteMetadataStore};
    use sync_engine::{FsSourceStore, RetryPolicy, SyncEngine};
    use vector_store::NullVectorStore;

    use super::*;

    async fn new_service() -> (ImportService, Arc<SqliteMetadataStore>, chunk_model::CollectionId) {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let collection = metadata.create_collection("docs", None).await.unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FsSourceStore::new(source_dir.path()));
        let vectors = Arc::new(NullVectorStore::new());
        let embedder = Arc::new(HashEmbeddingProvider::new(8));
        let engine = SyncEngine::new(
            metadata.clone() as Arc<dyn MetadataStore>,
            vectors,
            embedder,
            source.clone(),
            RetryPolicy::default(),
        );
        let service = ImportService::new(metadata.clone() as Arc<dyn MetadataStore>, source, engine);
        (service, metadata, collection.collection_id)
    }

    #[tokio::test]
    async fn upload_triggers_sync_to_completion() {
        let (service, metadata, collection_id) = new_service().await;
        let document = service
            .upload_file(b"# Title\nbody text\n".to_vec(), "f.md", "text/markdown", &collection_id)
            .await
            .unwrap();

        // Give the background sync job a moment to finish.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let synced = metadata.get_document(&document.doc_id).await.unwrap().unwrap();
        assert_eq!(synced.status, DocStatus::Synced);
    }

    #[tokio::test]
    async fn reupload_same_bytes_is_idempotent() {
        let (service, metadata, collection_id) = new_service().await;
        let bytes = b"# Title\nbody text\n".to_vec();
        let first = service.upload_file(bytes.clone(), "f.md", "text/markdown", &collection_id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let second = service.upload_file(bytes, "f.md", "text/markdown", &collection_id).await.unwrap();
        assert_eq!(first.doc_id, second.doc_id);
        let docs = metadata.list_chunks_by_doc(&first.doc_id).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (service, _metadata, collection_id) = new_service().await;
        let service = service.with_max_upload_size(4);
        let err = service
            .upload_file(b"too big".to_vec(), "f.md", "text/markdown", &collection_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }

    #[tokio::test]
    async fn unsupported_mime_is_rejected() {
        let (service, _metadata, collection_id) = new_service().await;
        let err = service
            .upload_file(b"data".to_vec(), "f.bin", "application/octet-stream", &collection_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_doc_soft_deletes() {
        let (service, metadata, collection_id) = new_service().await;
        let document = service
            .upload_file(b"# Title\nbody\n".to_vec(), "f.md", "text/markdown", &collection_id)
            .await
            .unwrap();
        service.delete_doc(&document.doc_id).await.unwrap();
        let fetched = metadata.get_document(&document.doc_id).await.unwrap().unwrap();
        assert!(fetched.is_deleted);
    }

    #[tokio::test]
    async fn resync_unknown_document_not_found() {
        let (service, _metadata, _collection_id) = new_service().await;
        let missing = chunk_model::DocId("does-not-exist".to_string());
        let err = service.resync(&missing).await.unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
    }
}
