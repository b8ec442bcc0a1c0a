use std::sync::Arc;

use auto_gc::GcReport;
use embedding_provider::EmbeddingProvider;
use hybrid_search::HybridSearch;
use ingest_service::ImportService;
use job_monitor::JobMonitor;
use metadata_store::MetadataStore;
use sync_engine::SyncEngine;
use vector_store::VectorStore;

use crate::config::Config;

/// Everything a handler needs, cloned cheaply per request (every field is
/// an `Arc`). Built once in `main` and threaded through `axum::Router::with_state`.
#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn MetadataStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub engine: Arc<SyncEngine>,
    pub import: Arc<ImportService>,
    pub search: Arc<HybridSearch>,
    pub jobs: Arc<JobMonitor>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Runs one AutoGC sweep. Called by the scheduling loop and by the
    /// operator CLI's on-demand `gc` subcommand.
    pub async fn run_gc(&self) -> GcReport {
        auto_gc::run_once(self.metadata.as_ref(), self.vectors.as_ref()).await
    }
}
