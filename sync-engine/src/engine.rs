use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chunk_model::{CollectionId, DocId, DocStatus, Document, VectorPayload, VectorPoint};
use dashmap::DashMap;
use embedding_provider::EmbeddingProvider;
use id_codec::{content_hash, point_id};
use metadata_store::{JobUpdate, MetadataStore, NewChunk};
use tokio::sync::Mutex as AsyncMutex;

use crate::coordinator::TransactionCoordinator;
use crate::error::SyncError;
use crate::retry::RetryPolicy;
use crate::source::SourceStore;

/// Drives each document through `NEW -> SPLIT_OK -> EMBED_OK -> SYNCED`
/// (spec §4.7), one step per [`Self::dispatch`] call, serialized per
/// `docId` by an advisory async lock so concurrent triggers for the same
/// document never race (spec §5).
pub struct SyncEngine {
    metadata: Arc<dyn MetadataStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    source: Arc<dyn SourceStore>,
    coordinator: TransactionCoordinator,
    retry_policy: RetryPolicy,
    locks: DashMap<DocId, Arc<AsyncMutex<()>>>,
}

impl SyncEngine {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        vectors: Arc<dyn vector_store::VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        source: Arc<dyn SourceStore>,
        retry_policy: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator: TransactionCoordinator::new(Arc::clone(&metadata), vectors),
            metadata,
            embedder,
            source,
            retry_policy,
            locks: DashMap::new(),
        })
    }

    /// Fire-and-forget: runs the job on a background task. Used by
    /// `ImportService::uploadFile`/`resync` to hand work to the engine
    /// without blocking the request.
    pub fn trigger(self: &Arc<Self>, doc_id: DocId) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.run_job(&doc_id).await {
                tracing::error!(doc_id = %doc_id, error = %err, "sync job failed");
            }
        });
    }

    /// Re-reads every non-terminal job on process start (spec §4.7
    /// "Initialize()"): `NEW`/`SPLIT_OK`/`EMBED_OK` documents resume
    /// immediately; `FAILED`/`RETRYING` documents are re-scheduled
    /// honoring their recorded `nextAttemptAt`, not restarted from scratch.
    pub async fn recover(self: &Arc<Self>) -> Result<(), SyncError> {
        let jobs = self.metadata.list_non_terminal_jobs().await?;
        for job in jobs {
            match job.status {
                DocStatus::New | DocStatus::SplitOk | DocStatus::EmbedOk => {
                    self.trigger(job.doc_id);
                }
                DocStatus::Failed | DocStatus::Retrying => {
                    let delay = job
                        .next_attempt_at
                        .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                        .unwrap_or(Duration::ZERO);
                    self.spawn_retry(job.doc_id, delay);
                }
                DocStatus::Synced | DocStatus::Dead => {}
            }
        }
        Ok(())
    }

    /// Advances `doc_id` through steps until it reaches `SYNCED`, a
    /// terminal job failure, or an in-progress retry has been scheduled.
    pub async fn run_job(self: &Arc<Self>, doc_id: &DocId) -> Result<(), SyncError> {
        let lock = self.lock_for(doc_id);
        let _guard = lock.lock().await;

        loop {
            let doc = self
                .metadata
                .get_document(doc_id)
                .await?
                .ok_or_else(|| SyncError::InvalidState(format!("document {doc_id} not found")))?;

            if doc.is_deleted {
                return Ok(());
            }

            match doc.status {
                DocStatus::Synced | DocStatus::Dead => return Ok(()),
                DocStatus::Failed | DocStatus::Retrying => {
                    return Err(SyncError::InvalidState(format!(
                        "document {doc_id} has status {} but dispatch only runs on durable progress markers",
                        doc.status
                    )))
                }
                DocStatus::New | DocStatus::SplitOk | DocStatus::EmbedOk => {}
            }

            match self.dispatch(&doc).await {
                Ok(DocStatus::Synced) => {
                    self.on_success(doc_id).await?;
                    return Ok(());
                }
                Ok(_) => continue,
                Err(err) => {
                    self.on_failure(doc_id, &err).await?;
                    return Err(err);
                }
            }
        }
    }

    /// Runs exactly one step for `doc`, returning the status it reached.
    async fn dispatch(&self, doc: &Document) -> Result<DocStatus, SyncError> {
        match doc.status {
            DocStatus::New => self.step_split(doc).await,
            // Vectors are never persisted between the embed and upsert
            // steps (they live only in memory for the duration of a
            // single sync attempt), so recovering at EMBED_OK re-embeds
            // rather than resuming from a cached vector set.
            DocStatus::SplitOk | DocStatus::EmbedOk => self.step_embed_and_upsert(doc).await,
            DocStatus::Synced => Ok(DocStatus::Synced),
            other => Err(SyncError::InvalidState(format!("cannot dispatch from status {other}"))),
        }
    }

    async fn step_split(&self, doc: &Document) -> Result<DocStatus, SyncError> {
        let bytes = self.source.get(&doc.source_key).await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| SyncError::InvalidDocument(format!("not valid utf-8: {e}")))?;

        let split = md_splitter::split(&text, Some(&doc.name));
        let new_chunks: Vec<NewChunk> = split
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| NewChunk {
                chunk_index: index as u32,
                title_chain: chunk.title_chain,
                content_hash: content_hash(&chunk.content),
                content: chunk.content,
            })
            .collect();

        self.coordinator
            .commit_chunks(&doc.doc_id, &doc.collection_id, new_chunks)
            .await?;
        self.metadata.set_document_status(&doc.doc_id, DocStatus::SplitOk).await?;
        Ok(DocStatus::SplitOk)
    }

    async fn step_embed_and_upsert(&self, doc: &Document) -> Result<DocStatus, SyncError> {
        let chunks = self.metadata.list_chunks_by_doc(&doc.doc_id).await?;
        if chunks.is_empty() {
            self.metadata.mark_synced(&doc.doc_id, Utc::now()).await?;
            self.metadata.set_document_status(&doc.doc_id, DocStatus::Synced).await?;
            return Ok(DocStatus::Synced);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        self.metadata.set_document_status(&doc.doc_id, DocStatus::EmbedOk).await?;

        self.coordinator
            .vectors_ensure_collection(&doc.collection_id, self.embedder.dimension())
            .await?;

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| VectorPoint {
                point_id: point_id(&doc.doc_id, chunk.chunk_index),
                vector,
                payload: VectorPayload {
                    doc_id: doc.doc_id.clone(),
                    collection_id: doc.collection_id.clone(),
                    chunk_index: chunk.chunk_index,
                    title_chain: chunk.title_chain.clone(),
                    content_hash: chunk.content_hash.clone(),
                },
            })
            .collect();

        self.coordinator
            .commit_vectors(&doc.doc_id, &doc.collection_id, points)
            .await?;
        self.metadata.mark_synced(&doc.doc_id, Utc::now()).await?;
        self.metadata.set_document_status(&doc.doc_id, DocStatus::Synced).await?;
        Ok(DocStatus::Synced)
    }

    async fn on_success(&self, doc_id: &DocId) -> Result<(), SyncError> {
        let job = self
            .metadata
            .get_sync_job(doc_id)
            .await?
            .ok_or_else(|| SyncError::InvalidState(format!("sync job for {doc_id} not found")))?;
        self.metadata
            .update_sync_job(
                doc_id,
                JobUpdate {
                    status: DocStatus::Synced,
                    retries: job.retries,
                    last_error: None,
                    error_category: None,
                    next_attempt_at: None,
                },
            )
            .await?;
        Ok(())
    }

    async fn on_failure(self: &Arc<Self>, doc_id: &DocId, err: &SyncError) -> Result<(), SyncError> {
        let category = err.category();
        let job = self
            .metadata
            .get_sync_job(doc_id)
            .await?
            .ok_or_else(|| SyncError::InvalidState(format!("sync job for {doc_id} not found")))?;
        let retries = job.retries + 1;

        if category.is_permanent() || retries > self.retry_policy.max_retries {
            self.metadata
                .update_sync_job(
                    doc_id,
                    JobUpdate {
                        status: DocStatus::Dead,
                        retries,
                        last_error: Some(err.to_string()),
                        error_category: Some(category),
                        next_attempt_at: None,
                    },
                )
                .await?;
            tracing::warn!(doc_id = %doc_id, %retries, "sync job dead-lettered");
            return Ok(());
        }

        self.metadata
            .update_sync_job(
                doc_id,
                JobUpdate {
                    status: DocStatus::Failed,
                    retries,
                    last_error: Some(err.to_string()),
                    error_category: Some(category),
                    next_attempt_at: None,
                },
            )
            .await?;

        let delay = self.retry_policy.delay_for(retries);
        let next_attempt_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self.metadata
            .update_sync_job(
                doc_id,
                JobUpdate {
                    status: DocStatus::Retrying,
                    retries,
                    last_error: Some(err.to_string()),
                    error_category: Some(category),
                    next_attempt_at: Some(next_attempt_at),
                },
            )
            .await?;

        self.spawn_retry(doc_id.clone(), delay);
        Ok(())
    }

    fn spawn_retry(self: &Arc<Self>, doc_id: DocId, delay: Duration) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = engine.run_job(&doc_id).await {
                tracing::error!(doc_id = %doc_id, error = %err, "retry attempt failed");
            }
        });
    }

    fn lock_for(&self, doc_id: &DocId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .entry(doc_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Exposes the coordinator's delete path for `ImportService`/`AutoGC`.
    pub async fn delete_doc(&self, doc_id: &DocId, collection_id: &CollectionId) -> Result<(), SyncError> {
        self.coordinator.delete_doc(doc_id, collection_id).await
    }

    /// Exposes the coordinator's reset path for `ImportService::resync`.
    pub async fn reset_doc(&self, doc_id: &DocId, collection_id: &CollectionId) -> Result<(), SyncError> {
        self.coordinator.reset_doc(doc_id, collection_id).await
    }

    /// Exposes the coordinator's collection-wide vector purge for
    /// `ImportService::delete_collection`.
    pub async fn vectors_delete_collection(&self, collection_id: &CollectionId) -> Result<u64, SyncError> {
        self.coordinator.vectors_delete_collection(collection_id).await
    }
}
