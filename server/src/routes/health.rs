use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chunk_model::CollectionId;
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    components: BTreeMap<String, bool>,
}

/// Liveness/readiness (spec §6): exercises each store adapter with a
/// cheap, idempotent call rather than just checking the process is up.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let metadata_ok = state.metadata.list_collections().await.is_ok();

    let collection = CollectionId(state.config.vector_collection_name.clone());
    let vectors_ok = state
        .vectors
        .ensure_collection(&collection, state.config.vector_dimension)
        .await
        .is_ok();

    let mut components = BTreeMap::new();
    components.insert("metadataStore".to_string(), metadata_ok);
    components.insert("vectorStore".to_string(), vectors_ok);

    Json(HealthResponse { ok: metadata_ok && vectors_ok, components })
}
