use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chunk_model::CollectionId;
use hybrid_search::HitSource;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search))
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(rename = "collectionId")]
    collection_id: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
struct SearchHitResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    score: f32,
    content: String,
    metadata: SearchHitMetadata,
}

#[derive(Debug, Serialize)]
struct SearchHitMetadata {
    #[serde(rename = "docId")]
    doc_id: String,
    #[serde(rename = "pointId")]
    point_id: String,
    #[serde(rename = "chunkIndex")]
    chunk_index: u32,
    #[serde(rename = "titleChain")]
    title_chain: Vec<String>,
}

fn hit_kind(source: HitSource) -> &'static str {
    match source {
        HitSource::Keyword => "keyword",
        HitSource::Semantic => "semantic",
        HitSource::Fused => "fused",
    }
}

async fn search(State(state): State<Arc<AppState>>, Query(query): Query<SearchQuery>) -> Result<Json<Vec<SearchHitResponse>>, ApiError> {
    let hits = state
        .search
        .search(&query.q, &CollectionId(query.collection_id), query.limit)
        .await?;

    let response = hits
        .into_iter()
        .map(|h| SearchHitResponse {
            kind: hit_kind(h.source),
            score: h.score,
            content: h.content,
            metadata: SearchHitMetadata {
                doc_id: h.doc_id.0,
                point_id: h.point_id.0,
                chunk_index: h.chunk_index,
                title_chain: h.title_chain,
            },
        })
        .collect();

    Ok(Json(response))
}
