//! Environment-backed configuration (spec §6). Library crates never read
//! the environment themselves; this is the one place that does, and
//! everything downstream takes a typed struct (spec §9 adapter-over-class).

use serde::Deserialize;

fn default_embedding_batch_size() -> usize {
    200
}

fn default_api_port() -> u16 {
    3000
}

fn default_gc_interval_hours() -> u64 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_vector_dimension() -> usize {
    384
}

fn default_max_upload_bytes() -> u64 {
    ingest_service::DEFAULT_MAX_UPLOAD_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub embedding_endpoint_url: String,
    pub embedding_api_key: String,
    pub embedding_model_name: String,
    pub relational_db_connection_string: String,
    pub vector_db_url: String,
    pub vector_collection_name: String,
    #[serde(default = "default_vector_dimension")]
    pub vector_dimension: usize,
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_gc_interval_hours")]
    pub gc_interval_hours: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl Config {
    /// Loads every documented environment variable, applying the
    /// defaults named in spec §6 when absent. Variable names are
    /// upper-snake-case of the field names above (e.g.
    /// `EMBEDDING_ENDPOINT_URL`, `API_PORT`).
    pub fn load() -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;
        Ok(raw.try_deserialize()?)
    }
}
