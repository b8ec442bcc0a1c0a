use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chunk_model::{Chunk, DocId, Document};

use crate::error::ApiError;
use crate::routes::pagination::{paginate, PageQuery, Paginated};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs/:id", get(get_doc).delete(delete_doc))
        .route("/docs/:id/chunks", get(list_chunks))
        .route("/docs/:id/resync", post(resync_doc))
}

async fn get_doc(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    let doc = state
        .metadata
        .get_document(&DocId(id.clone()))
        .await?
        .filter(|d| !d.is_deleted)
        .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;
    Ok(Json(doc))
}

async fn list_chunks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Chunk>>, ApiError> {
    let doc_id = DocId(id.clone());
    state
        .metadata
        .get_document(&doc_id)
        .await?
        .filter(|d| !d.is_deleted)
        .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;

    let chunks = state.metadata.list_chunks_by_doc(&doc_id).await?;
    Ok(Json(paginate(chunks, page)))
}

async fn delete_doc(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.import.delete_doc(&DocId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resync_doc(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    let doc = state.import.resync(&DocId(id)).await?;
    Ok(Json(doc))
}
