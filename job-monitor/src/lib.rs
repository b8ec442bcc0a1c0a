//! Read-only introspection for operators (spec §4.11): per-document
//! status, aggregate counts, active retries, average sync duration, and
//! recent failures. Every value is derived from the sync-job table —
//! `JobMonitor` never mutates state.

use std::sync::Arc;

use chunk_model::{DocId, DocStatus, SyncJob};
use metadata_store::{MetadataStore, StatusCounts, StoreError};

pub struct JobMonitor {
    metadata: Arc<dyn MetadataStore>,
}

impl JobMonitor {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn document_status(&self, doc_id: &DocId) -> Result<Option<SyncJob>, StoreError> {
        self.metadata.get_sync_job(doc_id).await
    }

    pub async fn aggregate_counts(&self) -> Result<StatusCounts, StoreError> {
        self.metadata.status_counts().await
    }

    pub async fn active_retries(&self) -> Result<u64, StoreError> {
        Ok(self.metadata.status_counts().await?.retrying)
    }

    pub async fn recent_failures(&self, limit: usize) -> Result<Vec<SyncJob>, StoreError> {
        self.metadata.recent_failures(limit).await
    }

    /// Mean wall-clock time between job creation and its most recent
    /// update for every currently `SYNCED` job, in seconds. `None` if no
    /// job has ever synced.
    pub async fn average_sync_duration_seconds(&self) -> Result<Option<f64>, StoreError> {
        let synced = self.metadata.list_jobs_by_status(DocStatus::Synced).await?;
        if synced.is_empty() {
            return Ok(None);
        }
        let total: i64 = synced
            .iter()
            .map(|job| (job.updated_at - job.created_at).num_milliseconds())
            .sum();
        Ok(Some(total as f64 / synced.len() as f64 / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunk_model::{DocId, DocStatus, ErrorCategory};
    use metadata_store::{JobUpdate, SqliteMetadataStore};

    use super::*;

    #[tokio::test]
    async fn aggregate_counts_reflect_job_states() {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let collection = metadata.create_collection("c1", None).await.unwrap();
        let doc = metadata
            .create_document(&DocId("d1".into()), &collection.collection_id, "d1", "f.md", "text/markdown", 4, "h")
            .await
            .unwrap();
        metadata.create_sync_job(&doc.doc_id).await.unwrap();

        let monitor = JobMonitor::new(metadata.clone() as Arc<dyn MetadataStore>);
        let counts = monitor.aggregate_counts().await.unwrap();
        assert_eq!(counts.new, 1);
        assert_eq!(monitor.active_retries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_failures_surfaces_failed_jobs() {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let collection = metadata.create_collection("c1", None).await.unwrap();
        let doc = metadata
            .create_document(&DocId("d1".into()), &collection.collection_id, "d1", "f.md", "text/markdown", 4, "h")
            .await
            .unwrap();
        metadata.create_sync_job(&doc.doc_id).await.unwrap();
        metadata
            .update_sync_job(
                &doc.doc_id,
                JobUpdate {
                    status: DocStatus::Failed,
                    retries: 1,
                    last_error: Some("boom".into()),
                    error_category: Some(ErrorCategory::TransientNetwork),
                    next_attempt_at: None,
                },
            )
            .await
            .unwrap();

        let monitor = JobMonitor::new(metadata.clone() as Arc<dyn MetadataStore>);
        let failures = monitor.recent_failures(10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn average_sync_duration_is_none_without_synced_jobs() {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let monitor = JobMonitor::new(metadata as Arc<dyn MetadataStore>);
        assert_eq!(monitor.average_sync_duration_seconds().await.unwrap(), None);
    }
}
