//! Shared domain types for the ingestion and retrieval pipeline.
//!
//! These are plain, serde-derived value types. Storage concerns (which
//! columns, which tables) live in `metadata-store`; this crate only
//! defines the semantic shape every other crate agrees on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque collection identifier (a UUID string, assigned on creation).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId(pub String);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed document identifier: the hex SHA-256 of the original
/// file bytes. See `id-codec` for the derivation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub String);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `docId#chunkIndex`, globally unique, shared by a relational chunk row
/// and its vector-store point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(pub String);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named collection of documents. Scopes every document, chunk, and
/// vector point beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub collection_id: CollectionId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a document as tracked by its [`SyncJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocStatus {
    New,
    SplitOk,
    EmbedOk,
    Synced,
    Failed,
    Retrying,
    Dead,
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocStatus::New => "NEW",
            DocStatus::SplitOk => "SPLIT_OK",
            DocStatus::EmbedOk => "EMBED_OK",
            DocStatus::Synced => "SYNCED",
            DocStatus::Failed => "FAILED",
            DocStatus::Retrying => "RETRYING",
            DocStatus::Dead => "DEAD",
        };
        f.write_str(s)
    }
}

/// A document uploaded into a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    pub collection_id: CollectionId,
    pub source_key: String,
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub status: DocStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

/// An immutable chunk of a document's text, produced by the splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub point_id: PointId,
    pub doc_id: DocId,
    pub collection_id: CollectionId,
    pub chunk_index: u32,
    pub title_chain: Vec<String>,
    pub content_hash: String,
    pub content: String,
}

/// Classification of a sync failure, used by the retry policy in
/// `sync-engine` to decide between backoff and dead-lettering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    TransientNetwork,
    TransientRateLimit,
    TransientStore,
    PermanentClient,
    PermanentData,
    Unknown,
}

impl ErrorCategory {
    /// Permanent categories bypass retry and dead-letter immediately.
    pub fn is_permanent(self) -> bool {
        matches!(self, ErrorCategory::PermanentClient | ErrorCategory::PermanentData)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::TransientNetwork => "TRANSIENT_NETWORK",
            ErrorCategory::TransientRateLimit => "TRANSIENT_RATE_LIMIT",
            ErrorCategory::TransientStore => "TRANSIENT_STORE",
            ErrorCategory::PermanentClient => "PERMANENT_CLIENT",
            ErrorCategory::PermanentData => "PERMANENT_DATA",
            ErrorCategory::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// The persistent per-document sync job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: String,
    pub doc_id: DocId,
    pub status: DocStatus,
    pub retries: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// Terminal states never transition further without operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DocStatus::Synced | DocStatus::Dead)
    }
}

/// A point stored in the external vector store, one-to-one with a [`Chunk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub point_id: PointId,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

/// Routing metadata carried alongside a vector. The relational store
/// remains the source of truth for chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    pub doc_id: DocId,
    pub collection_id: CollectionId,
    pub chunk_index: u32,
    pub title_chain: Vec<String>,
    pub content_hash: String,
}

/// A single hit from a keyword or vector search, before RRF fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub point_id: PointId,
    /// 1-based rank within its source list.
    pub rank: usize,
    pub raw_score: f32,
}

/// Arbitrary chunk-level metadata (reserved for future enrichment;
/// currently only populated by callers that need it, e.g. tests).
pub type ChunkMeta = BTreeMap<String, serde_json::Value>;
