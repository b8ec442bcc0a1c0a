//! Converts every leaf error produced by the library crates into the
//! `{error:{code,message,details}}` envelope of spec §6, following the
//! status-code taxonomy of spec §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chunk_model::ErrorCategory;
use hybrid_search::SearchError;
use ingest_service::ImportError;
use metadata_store::StoreError;
use serde::Serialize;
use sync_engine::{SourceStoreError, SyncError};
use vector_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::UnsupportedMediaType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE"),
            ApiError::DependencyUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "DEPENDENCY_UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();
        tracing::warn!(status = %status, code, %message, "request failed");
        let body = ErrorBody {
            error: ErrorDetail { code, message, details: None },
        };
        (status, Json(body)).into_response()
    }
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(msg) => ApiError::NotFound(msg),
        StoreError::Conflict(msg) => ApiError::Conflict(msg),
        StoreError::Validation(msg) => ApiError::Validation(msg),
        StoreError::Sqlite(e) => ApiError::Internal(e.to_string()),
        StoreError::Pool(e) => ApiError::DependencyUnavailable(e.to_string()),
    }
}

fn vector_error(err: VectorStoreError) -> ApiError {
    match err {
        VectorStoreError::Validation(msg) => ApiError::Validation(msg),
        VectorStoreError::NotFound(msg) => ApiError::NotFound(msg),
        VectorStoreError::Backend(msg) => ApiError::DependencyUnavailable(msg),
    }
}

fn source_error(err: SourceStoreError) -> ApiError {
    match err {
        // A missing source key at the API boundary means an inconsistency
        // between the document row and the blob store, not a client error.
        SourceStoreError::NotFound(msg) => ApiError::Internal(format!("source bytes missing: {msg}")),
        SourceStoreError::Io(msg) => ApiError::DependencyUnavailable(msg),
    }
}

/// `SyncError` only reaches the API boundary from the synchronous part of
/// `resync` (the reset step); everything after `trigger()` runs in the
/// background and is retried or dead-lettered there instead (spec §7).
fn sync_error(err: SyncError) -> ApiError {
    let category = err.category();
    let message = err.to_string();
    match category {
        ErrorCategory::PermanentClient | ErrorCategory::PermanentData => ApiError::Validation(message),
        ErrorCategory::TransientNetwork | ErrorCategory::TransientRateLimit | ErrorCategory::TransientStore => {
            ApiError::DependencyUnavailable(message)
        }
        ErrorCategory::Unknown => ApiError::Internal(message),
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Validation(msg) => ApiError::Validation(msg),
            ImportError::NotFound(msg) => ApiError::NotFound(msg),
            ImportError::Store(e) => store_error(e),
            ImportError::Source(e) => source_error(e),
            ImportError::Sync(e) => sync_error(e),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) => ApiError::Validation(msg),
            SearchError::Store(e) => store_error(e),
            SearchError::Vector(e) => vector_error(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        store_error(err)
    }
}
