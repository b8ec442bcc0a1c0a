use std::sync::Arc;

use chunk_model::{CollectionId, DocId, Document};
use id_codec::doc_id as compute_doc_id;
use metadata_store::MetadataStore;
use sync_engine::{SourceStore, SyncEngine};

use crate::error::ImportError;

/// MIME types `MarkdownSplitter` can handle (spec §4.8 "reject unsupported
/// MIME types"). Out of scope per §1: parsing any other file format.
pub const ALLOWED_MIME_TYPES: &[&str] = &["text/markdown", "text/x-markdown", "text/plain"];

/// Default `MAX_UPLOAD_SIZE`, in bytes (spec §6 environment variables).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 20 * 1024 * 1024;

/// Upload/create/delete/resync document lifecycle; the one thing callers
/// (the `server` HTTP handlers, `tools/syncctl`) use to mutate documents.
/// Every state transition is handed off to [`SyncEngine`] — this type
/// never touches the relational or vector stores' write paths directly
/// except through `MetadataStore` reads and `SourceStore`.
pub struct ImportService {
    metadata: Arc<dyn MetadataStore>,
    source: Arc<dyn SourceStore>,
    engine: Arc<SyncEngine>,
    max_upload_size: u64,
}

impl ImportService {
    pub fn new(metadata: Arc<dyn MetadataStore>, source: Arc<dyn SourceStore>, engine: Arc<SyncEngine>) -> Self {
        Self {
            metadata,
            source,
            engine,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    /// Validates, stores the bytes, and inserts (or returns the existing)
    /// document row before handing off to the state machine. Returns
    /// before synchronization completes — progress is observed via
    /// `job-monitor`.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        name: &str,
        mime: &str,
        collection_id: &CollectionId,
    ) -> Result<Document, ImportError> {
        if bytes.len() as u64 > self.max_upload_size {
            return Err(ImportError::Validation(format!(
                "file is {} bytes, exceeds limit of {} bytes",
                bytes.len(),
                self.max_upload_size
            )));
        }
        if !ALLOWED_MIME_TYPES.contains(&mime) {
            return Err(ImportError::Validation(format!("unsupported mime type: {mime}")));
        }

        self.metadata
            .get_collection(collection_id)
            .await?
            .ok_or_else(|| ImportError::NotFound(format!("collection {collection_id} not found")))?;

        let id = compute_doc_id(&bytes);
        let content_hash = id_codec::content_hash(&String::from_utf8_lossy(&bytes));
        let source_key = id.0.clone();

        self.source.put(&source_key, &bytes).await?;

        let document = self
            .metadata
            .create_document(&id, collection_id, &source_key, name, mime, bytes.len() as u64, &content_hash)
            .await?;

        // create_document is idempotent by content (spec P2); only a
        // freshly-created NEW document needs a job and a trigger.
        if document.status == chunk_model::DocStatus::New && self.metadata.get_sync_job(&document.doc_id).await?.is_none() {
            self.metadata.create_sync_job(&document.doc_id).await?;
            self.engine.trigger(document.doc_id.clone());
        }

        Ok(document)
    }

    /// Re-ingests a document under its existing `docId`: drops its chunks
    /// and vector points, resets the sync job to `NEW`, and re-triggers
    /// the state machine. The source bytes are re-read from the original
    /// source key by the engine's split step.
    pub async fn resync(&self, doc_id: &DocId) -> Result<Document, ImportError> {
        let document = self
            .metadata
            .get_document(doc_id)
            .await?
            .ok_or_else(|| ImportError::NotFound(format!("document {doc_id} not found")))?;
        if document.is_deleted {
            return Err(ImportError::NotFound(format!("document {doc_id} not found")));
        }

        self.engine.reset_doc(doc_id, &document.collection_id).await?;
        self.metadata.set_document_status(doc_id, chunk_model::DocStatus::New).await?;
        self.metadata.reset_sync_job(doc_id).await?;
        self.engine.trigger(doc_id.clone());

        self.metadata
            .get_document(doc_id)
            .await?
            .ok_or_else(|| ImportError::NotFound(format!("document {doc_id} not found")))
    }

    /// Soft-delete (spec §4.8): AutoGC performs the hard delete and vector
    /// purge later.
    pub async fn delete_doc(&self, doc_id: &DocId) -> Result<(), ImportError> {
        self.metadata
            .get_document(doc_id)
            .await?
            .ok_or_else(|| ImportError::NotFound(format!("document {doc_id} not found")))?;
        self.metadata.mark_doc_deleted(doc_id).await?;
        Ok(())
    }

    /// Hard-deletes every document in the collection (cascading to chunks
    /// and vector points) and then the collection row, atomically from
    /// the caller's perspective.
    pub async fn delete_collection(&self, collection_id: &CollectionId) -> Result<(), ImportError> {
        self.metadata
            .get_collection(collection_id)
            .await?
            .ok_or_else(|| ImportError::NotFound(format!("collection {collection_id} not found")))?;

        let point_ids = self.metadata.list_point_ids_by_collection(collection_id).await?;
        if !point_ids.is_empty() {
            // delete_collection below removes the relational rows in one
            // transaction; purge the matching vector points first so no
            // collection-scoped vector points outlive their metadata rows.
            self.engine.vectors_delete_collection(collection_id).await?;
        }
        self.metadata.delete_collection(collection_id).await?;
        Ok(())
    }

    /// Used by `resync`/`upload_file` tests and `job-monitor` to observe
    /// whether a sync attempt has even started.
    pub async fn document(&self, doc_id: &DocId) -> Result<Option<Document>, ImportError> {
        Ok(self.metadata.get_document(doc_id).await?)
    }
}
