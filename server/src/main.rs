mod config;
mod error;
mod gc_loop;
mod routes;
mod state;

use std::sync::Arc;

use embedding_provider::{EmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider};
use hybrid_search::HybridSearch;
use ingest_service::ImportService;
use job_monitor::JobMonitor;
use metadata_store::{MetadataStore, SqliteMetadataStore};
use sync_engine::{FsSourceStore, RetryPolicy, SyncEngine};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use vector_store::{HnswVectorStore, NullVectorStore, VectorStore};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open(&config.relational_db_connection_string)?);

    let vectors: Arc<dyn VectorStore> = if config.vector_db_url == "null" {
        Arc::new(NullVectorStore::new())
    } else {
        Arc::new(HnswVectorStore::new())
    };

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(HttpEmbeddingConfig {
        endpoint: config.embedding_endpoint_url.clone(),
        api_key: config.embedding_api_key.clone(),
        model: config.embedding_model_name.clone(),
        dimension: config.vector_dimension,
        batch_size: config.embedding_batch_size,
        timeout: std::time::Duration::from_secs(30),
    })?);

    let source = Arc::new(FsSourceStore::new("data/sources"));

    let engine = SyncEngine::new(
        Arc::clone(&metadata),
        Arc::clone(&vectors),
        Arc::clone(&embedder),
        source.clone(),
        RetryPolicy::default(),
    );
    engine.recover().await?;

    let import = Arc::new(
        ImportService::new(Arc::clone(&metadata), source, Arc::clone(&engine)).with_max_upload_size(config.max_upload_bytes),
    );
    let search = Arc::new(HybridSearch::new(Arc::clone(&metadata), Arc::clone(&vectors), Arc::clone(&embedder)));
    let jobs = Arc::new(JobMonitor::new(Arc::clone(&metadata)));

    let gc_interval_hours = config.gc_interval_hours;
    let api_port = config.api_port;

    let state = Arc::new(AppState {
        metadata,
        vectors,
        embedder,
        engine,
        import,
        search,
        jobs,
        config: Arc::new(config),
    });

    tokio::spawn(gc_loop::run(Arc::clone(&state), gc_interval_hours));

    let app = routes::router(Arc::clone(&state)).layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], api_port));
    tracing::info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
