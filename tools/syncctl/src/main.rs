//! Operator CLI for the ingestion/sync pipeline (spec §2 "Operator CLI").
//! Talks to the same library crates the `server` binary wires up, against
//! the same relational/vector/embedding backends, so an operator can
//! inspect and repair state without going through HTTP.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunk_model::{CollectionId, DocId};
use clap::{Parser, Subcommand};
use embedding_provider::{EmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider};
use hybrid_search::HybridSearch;
use ingest_service::ImportService;
use job_monitor::JobMonitor;
use metadata_store::{MetadataStore, SqliteMetadataStore};
use sync_engine::{FsSourceStore, RetryPolicy, SyncEngine};
use vector_store::{HnswVectorStore, NullVectorStore, VectorStore};

#[derive(Parser)]
#[command(name = "syncctl")]
#[command(about = "Operator CLI for the hybrid retrieval ingestion pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a collection.
    CreateCollection { name: String, #[arg(long)] description: Option<String> },
    /// List every collection.
    ListCollections,
    /// Cascade-delete a collection and everything in it.
    DeleteCollection { collection_id: String },
    /// Upload a file into a collection and trigger synchronization.
    Upload { collection_id: String, file: PathBuf },
    /// Print a document's current state.
    GetDoc { doc_id: String },
    /// Re-ingest a document under its existing docId.
    Resync { doc_id: String },
    /// Soft-delete a document.
    DeleteDoc { doc_id: String },
    /// Print the sync job for a document.
    JobStatus { doc_id: String },
    /// Print aggregate job counts across every document.
    JobCounts,
    /// Print the most recent failed jobs.
    RecentFailures { #[arg(long, default_value_t = 20)] limit: usize },
    /// Run a hybrid search query against a collection.
    Search { collection_id: String, query: String, #[arg(long, default_value_t = 10)] limit: usize },
    /// Run one AutoGC sweep across every collection immediately.
    Gc,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

struct Wiring {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorStore>,
    import: ImportService,
    search: HybridSearch,
}

fn wire_up() -> Result<Wiring> {
    let db_path = env_or("RELATIONAL_DB_CONNECTION_STRING", "data/metadata.db");
    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open(&db_path).context("opening relational store")?);

    let vector_db_url = env_or("VECTOR_DB_URL", "memory");
    let vectors: Arc<dyn VectorStore> = if vector_db_url == "null" {
        Arc::new(NullVectorStore::new())
    } else {
        Arc::new(HnswVectorStore::new())
    };

    let dimension: usize = env_or("VECTOR_DIMENSION", "384").parse().context("parsing VECTOR_DIMENSION")?;
    let batch_size: usize = env_or("EMBEDDING_BATCH_SIZE", "200").parse().context("parsing EMBEDDING_BATCH_SIZE")?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(HttpEmbeddingConfig {
        endpoint: env_or("EMBEDDING_ENDPOINT_URL", ""),
        api_key: env_or("EMBEDDING_API_KEY", ""),
        model: env_or("EMBEDDING_MODEL_NAME", ""),
        dimension,
        batch_size,
        timeout: std::time::Duration::from_secs(30),
    })?);

    let source = Arc::new(FsSourceStore::new(env_or("SOURCE_STORE_DIR", "data/sources")));

    let engine = SyncEngine::new(
        Arc::clone(&metadata),
        Arc::clone(&vectors),
        Arc::clone(&embedder),
        source.clone(),
        RetryPolicy::default(),
    );

    let import = ImportService::new(Arc::clone(&metadata), source, engine);
    let search = HybridSearch::new(Arc::clone(&metadata), Arc::clone(&vectors), embedder);

    Ok(Wiring { metadata, vectors, import, search })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_or("LOG_LEVEL", "info")).init();

    let cli = Cli::parse();
    let wiring = wire_up()?;

    match cli.command {
        Command::CreateCollection { name, description } => {
            let collection = wiring.metadata.create_collection(&name, description.as_deref()).await?;
            print_json(&collection);
        }
        Command::ListCollections => {
            let collections = wiring.metadata.list_collections().await?;
            print_json(&collections);
        }
        Command::DeleteCollection { collection_id } => {
            wiring.import.delete_collection(&CollectionId(collection_id.clone())).await?;
            println!("deleted collection {collection_id}");
        }
        Command::Upload { collection_id, file } => {
            let bytes = tokio::fs::read(&file).await.with_context(|| format!("reading {}", file.display()))?;
            let name = file.file_name().and_then(|n| n.to_str()).unwrap_or("upload.md").to_string();
            let document = wiring
                .import
                .upload_file(bytes, &name, "text/markdown", &CollectionId(collection_id))
                .await?;
            print_json(&document);
        }
        Command::GetDoc { doc_id } => {
            let document = wiring
                .metadata
                .get_document(&DocId(doc_id.clone()))
                .await?
                .with_context(|| format!("document {doc_id} not found"))?;
            print_json(&document);
        }
        Command::Resync { doc_id } => {
            let document = wiring.import.resync(&DocId(doc_id)).await?;
            print_json(&document);
        }
        Command::DeleteDoc { doc_id } => {
            wiring.import.delete_doc(&DocId(doc_id.clone())).await?;
            println!("soft-deleted document {doc_id}");
        }
        Command::JobStatus { doc_id } => {
            let monitor = JobMonitor::new(Arc::clone(&wiring.metadata));
            let job = monitor
                .document_status(&DocId(doc_id.clone()))
                .await?
                .with_context(|| format!("no sync job for document {doc_id}"))?;
            print_json(&job);
        }
        Command::JobCounts => {
            let monitor = JobMonitor::new(Arc::clone(&wiring.metadata));
            let counts = monitor.aggregate_counts().await?;
            println!(
                "new={} split_ok={} embed_ok={} synced={} failed={} retrying={} dead={}",
                counts.new, counts.split_ok, counts.embed_ok, counts.synced, counts.failed, counts.retrying, counts.dead
            );
        }
        Command::RecentFailures { limit } => {
            let monitor = JobMonitor::new(Arc::clone(&wiring.metadata));
            let failures = monitor.recent_failures(limit).await?;
            print_json(&failures);
        }
        Command::Search { collection_id, query, limit } => {
            let hits = wiring.search.search(&query, &CollectionId(collection_id), limit).await?;
            for hit in hits {
                println!("{:.4}\t{}#{}\t{}", hit.score, hit.doc_id, hit.chunk_index, first_line(&hit.content));
            }
        }
        Command::Gc => {
            let report = auto_gc::run_once(wiring.metadata.as_ref(), wiring.vectors.as_ref()).await;
            print_json(&report.per_collection);
        }
    }

    Ok(())
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("").trim()
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}
