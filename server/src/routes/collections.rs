use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chunk_model::{Collection, CollectionId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::pagination::{paginate, PageQuery, Paginated};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections", post(create_collection).get(list_collections))
        .route("/collections/:id", delete(delete_collection))
        .route("/collections/:id/docs", post(upload_doc))
}

#[derive(Debug, Deserialize)]
struct CreateCollectionRequest {
    name: String,
    description: Option<String>,
}

async fn create_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<Json<Collection>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    let collection = state
        .metadata
        .create_collection(&req.name, req.description.as_deref())
        .await?;
    Ok(Json(collection))
}

async fn list_collections(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Collection>>, ApiError> {
    let collections = state.metadata.list_collections().await?;
    Ok(Json(paginate(collections, page)))
}

async fn delete_collection(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.import.delete_collection(&CollectionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    #[serde(rename = "docId")]
    doc_id: String,
}

/// Accepts a single multipart `file` field (spec §6 "multipart file").
async fn upload_doc(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let collection_id = CollectionId(id);

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "upload.md".to_string();
    let mut mime = "text/markdown".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Validation(e.to_string()))? {
        if field.name() == Some("file") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            if let Some(ct) = field.content_type() {
                mime = ct.to_string();
            }
            let bytes = field.bytes().await.map_err(|e| ApiError::Validation(e.to_string()))?;
            file_bytes = Some(bytes.to_vec());
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::Validation("missing multipart field `file`".into()))?;

    if bytes.len() as u64 > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {} bytes, exceeds limit of {} bytes",
            bytes.len(),
            state.config.max_upload_bytes
        )));
    }
    if !ingest_service::ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(ApiError::UnsupportedMediaType(mime));
    }

    let document = state.import.upload_file(bytes, &file_name, &mime, &collection_id).await?;
    Ok(Json(UploadResponse { doc_id: document.doc_id.0 }))
}
