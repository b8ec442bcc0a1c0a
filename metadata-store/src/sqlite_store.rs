use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chunk_model::{
    Chunk, Collection, CollectionId, DocId, DocStatus, Document, ErrorCategory, PointId, SyncJob,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{FtsHit, JobUpdate, MetadataStore, NewChunk, StatusCounts, StoreError};

/// SQLite-backed [`MetadataStore`]. Connections are pooled with `r2d2` so
/// each sync worker can hold its own connection without serializing on a
/// single `Mutex<Connection>`; SQLite's own file locking still serializes
/// actual writes.
pub struct SqliteMetadataStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteMetadataStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder().max_size(8).build(manager)?;
        {
            let conn = pool.get()?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            crate::schema::migrate(&conn)?;
        }
        Ok(Self { pool })
    }

    /// A single-connection in-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let conn = pool.get()?;
            crate::schema::migrate(&conn)?;
        }
        Ok(Self { pool })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .expect("metadata-store blocking task panicked")
    }
}

fn now_str() -> String {
    Utc::now().to_rfc3339()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("stored timestamp is always rfc3339")
        .with_timezone(&Utc)
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

fn parse_status(s: &str) -> DocStatus {
    match s {
        "NEW" => DocStatus::New,
        "SPLIT_OK" => DocStatus::SplitOk,
        "EMBED_OK" => DocStatus::EmbedOk,
        "SYNCED" => DocStatus::Synced,
        "FAILED" => DocStatus::Failed,
        "RETRYING" => DocStatus::Retrying,
        "DEAD" => DocStatus::Dead,
        other => panic!("unknown status in database: {other}"),
    }
}

fn parse_error_category(s: Option<String>) -> Option<ErrorCategory> {
    s.map(|s| match s.as_str() {
        "TRANSIENT_NETWORK" => ErrorCategory::TransientNetwork,
        "TRANSIENT_RATE_LIMIT" => ErrorCategory::TransientRateLimit,
        "TRANSIENT_STORE" => ErrorCategory::TransientStore,
        "PERMANENT_CLIENT" => ErrorCategory::PermanentClient,
        "PERMANENT_DATA" => ErrorCategory::PermanentData,
        "UNKNOWN" => ErrorCategory::Unknown,
        other => panic!("unknown error category in database: {other}"),
    })
}

fn row_to_collection(row: &rusqlite::Row) -> rusqlite::Result<Collection> {
    Ok(Collection {
        collection_id: CollectionId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_ts(&row.get::<_, String>(3)?),
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        doc_id: DocId(row.get(0)?),
        collection_id: CollectionId(row.get(1)?),
        source_key: row.get(2)?,
        name: row.get(3)?,
        mime: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        content_hash: row.get(6)?,
        status: parse_status(&row.get::<_, String>(7)?),
        created_at: parse_ts(&row.get::<_, String>(8)?),
        updated_at: parse_ts(&row.get::<_, String>(9)?),
        is_deleted: row.get::<_, i64>(10)? != 0,
        synced_at: parse_ts_opt(row.get(11)?),
    })
}

const DOCUMENT_COLUMNS: &str = "doc_id, collection_id, source_key, name, mime, size_bytes, \
     content_hash, status, created_at, updated_at, is_deleted, synced_at";

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let title_chain_json: String = row.get(4)?;
    Ok(Chunk {
        point_id: PointId(row.get(0)?),
        doc_id: DocId(row.get(1)?),
        collection_id: CollectionId(row.get(2)?),
        chunk_index: row.get::<_, i64>(3)? as u32,
        title_chain: serde_json::from_str(&title_chain_json).unwrap_or_default(),
        content_hash: row.get(5)?,
        content: row.get(6)?,
    })
}

const CHUNK_COLUMNS: &str = "point_id, doc_id, collection_id, chunk_index, title_chain, content_hash, content";

fn row_to_sync_job(row: &rusqlite::Row) -> rusqlite::Result<SyncJob> {
    Ok(SyncJob {
        job_id: row.get(0)?,
        doc_id: DocId(row.get(1)?),
        status: parse_status(&row.get::<_, String>(2)?),
        retries: row.get::<_, i64>(3)? as u32,
        last_attempt_at: parse_ts_opt(row.get(4)?),
        last_error: row.get(5)?,
        error_category: parse_error_category(row.get(6)?),
        next_attempt_at: parse_ts_opt(row.get(7)?),
        created_at: parse_ts(&row.get::<_, String>(8)?),
        updated_at: parse_ts(&row.get::<_, String>(9)?),
    })
}

const SYNC_JOB_COLUMNS: &str = "job_id, doc_id, status, retries, last_attempt_at, last_error, \
     error_category, next_attempt_at, created_at, updated_at";

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Validation("collection name must not be empty".into()));
        }
        let name = name.to_string();
        let description = description.map(|d| d.to_string());
        self.with_conn(move |conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let created_at = now_str();
            let result = conn.execute(
                "INSERT INTO collections (collection_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, description, created_at],
            );
            match result {
                Ok(_) => Ok(Collection {
                    collection_id: CollectionId(id),
                    name,
                    description,
                    created_at: parse_ts(&created_at),
                }),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                    Err(StoreError::Conflict(format!("collection name '{name}' already exists")))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_collection(&self, collection_id: &CollectionId) -> Result<Option<Collection>, StoreError> {
        let id = collection_id.0.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT collection_id, name, description, created_at FROM collections WHERE collection_id = ?1",
                params![id],
                row_to_collection,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT collection_id, name, description, created_at FROM collections ORDER BY created_at",
            )?;
            let rows = stmt.query_map([], row_to_collection)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn delete_collection(&self, collection_id: &CollectionId) -> Result<(), StoreError> {
        let id = collection_id.0.clone();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM chunks WHERE collection_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM sync_jobs WHERE doc_id IN (SELECT doc_id FROM documents WHERE collection_id = ?1)",
                params![id],
            )?;
            tx.execute("DELETE FROM documents WHERE collection_id = ?1", params![id])?;
            let changed = tx.execute("DELETE FROM collections WHERE collection_id = ?1", params![id])?;
            tx.commit()?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("collection {id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn create_document(
        &self,
        doc_id: &DocId,
        collection_id: &CollectionId,
        source_key: &str,
        name: &str,
        mime: &str,
        size_bytes: u64,
        content_hash: &str,
    ) -> Result<Document, StoreError> {
        let doc_id = doc_id.clone();
        let collection_id = collection_id.clone();
        let source_key = source_key.to_string();
        let name = name.to_string();
        let mime = mime.to_string();
        let content_hash = content_hash.to_string();
        self.with_conn(move |conn| {
            if let Some(existing) = conn
                .query_row(
                    &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_id = ?1"),
                    params![doc_id.0],
                    row_to_document,
                )
                .optional()?
            {
                if existing.collection_id != collection_id {
                    return Err(StoreError::Conflict(format!(
                        "doc_id {} already exists in a different collection",
                        doc_id.0
                    )));
                }
                return Ok(existing);
            }

            let now = now_str();
            conn.execute(
                "INSERT INTO documents (doc_id, collection_id, source_key, name, mime, size_bytes, \
                 content_hash, status, created_at, updated_at, is_deleted, synced_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'NEW', ?8, ?8, 0, NULL)",
                params![
                    doc_id.0,
                    collection_id.0,
                    source_key,
                    name,
                    mime,
                    size_bytes as i64,
                    content_hash,
                    now,
                ],
            )?;
            Ok(Document {
                doc_id,
                collection_id,
                source_key,
                name,
                mime,
                size_bytes,
                content_hash,
                status: DocStatus::New,
                created_at: parse_ts(&now),
                updated_at: parse_ts(&now),
                is_deleted: false,
                synced_at: None,
            })
        })
        .await
    }

    async fn get_document(&self, doc_id: &DocId) -> Result<Option<Document>, StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_id = ?1"),
                params![doc_id],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_document_status(&self, doc_id: &DocId, status: DocStatus) -> Result<(), StoreError> {
        let doc_id = doc_id.0.clone();
        let status = status.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET status = ?1, updated_at = ?2 WHERE doc_id = ?3",
                params![status, now_str(), doc_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {doc_id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn mark_synced(&self, doc_id: &DocId, synced_at: DateTime<Utc>) -> Result<(), StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET status = 'SYNCED', synced_at = ?1, updated_at = ?2 WHERE doc_id = ?3",
                params![synced_at.to_rfc3339(), now_str(), doc_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {doc_id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn mark_doc_deleted(&self, doc_id: &DocId) -> Result<(), StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET is_deleted = 1, updated_at = ?1 WHERE doc_id = ?2",
                params![now_str(), doc_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {doc_id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn hard_delete_document(&self, doc_id: &DocId) -> Result<(), StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?;
            tx.execute("DELETE FROM sync_jobs WHERE doc_id = ?1", params![doc_id])?;
            let changed = tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;
            tx.commit()?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {doc_id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn list_deleted_documents(&self, collection_id: &CollectionId) -> Result<Vec<Document>, StoreError> {
        let id = collection_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection_id = ?1 AND is_deleted = 1"
            ))?;
            let rows = stmt.query_map(params![id], row_to_document)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn replace_chunks(
        &self,
        doc_id: &DocId,
        collection_id: &CollectionId,
        chunks: Vec<NewChunk>,
    ) -> Result<Vec<Chunk>, StoreError> {
        let doc_id = doc_id.clone();
        let collection_id = collection_id.clone();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id.0])?;

            let mut inserted = Vec::with_capacity(chunks.len());
            for new_chunk in chunks {
                let point_id = id_codec::point_id(&doc_id, new_chunk.chunk_index);
                let title_chain_json = serde_json::to_string(&new_chunk.title_chain)
                    .expect("title chain is always serializable");
                tx.execute(
                    &format!("INSERT INTO chunks ({CHUNK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                    params![
                        point_id.0,
                        doc_id.0,
                        collection_id.0,
                        new_chunk.chunk_index,
                        title_chain_json,
                        new_chunk.content_hash,
                        new_chunk.content,
                    ],
                )?;
                inserted.push(Chunk {
                    point_id,
                    doc_id: doc_id.clone(),
                    collection_id: collection_id.clone(),
                    chunk_index: new_chunk.chunk_index,
                    title_chain: new_chunk.title_chain,
                    content_hash: new_chunk.content_hash,
                    content: new_chunk.content,
                });
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn list_chunks_by_doc(&self, doc_id: &DocId) -> Result<Vec<Chunk>, StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index"
            ))?;
            let rows = stmt.query_map(params![doc_id], row_to_chunk)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn get_chunks(&self, point_ids: &[PointId], collection_id: &CollectionId) -> Result<Vec<Chunk>, StoreError> {
        if point_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = point_ids.iter().map(|p| p.0.clone()).collect();
        let collection_id = collection_id.0.clone();
        self.with_conn(move |conn| {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE collection_id = ? AND point_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut query_params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
            query_params.push(&collection_id);
            for id in &ids {
                query_params.push(id);
            }
            let rows = stmt.query_map(query_params.as_slice(), row_to_chunk)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn delete_chunks_by_doc(&self, doc_id: &DocId) -> Result<(), StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?;
            Ok(())
        })
        .await
    }

    async fn delete_chunks_by_point_ids(&self, point_ids: &[PointId]) -> Result<u64, StoreError> {
        if point_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = point_ids.iter().map(|p| p.0.clone()).collect();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let mut deleted = 0u64;
            for id in &ids {
                deleted += tx.execute("DELETE FROM chunks WHERE point_id = ?1", params![id])? as u64;
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    async fn list_point_ids_by_collection(&self, collection_id: &CollectionId) -> Result<Vec<PointId>, StoreError> {
        let id = collection_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT point_id FROM chunks WHERE collection_id = ?1")?;
            let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
            rows.map(|r| r.map(PointId).map_err(StoreError::from))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    async fn list_point_ids_by_doc(&self, doc_id: &DocId) -> Result<Vec<PointId>, StoreError> {
        let id = doc_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT point_id FROM chunks WHERE doc_id = ?1")?;
            let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
            rows.map(|r| r.map(PointId).map_err(StoreError::from))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    async fn fts_search(
        &self,
        query: &str,
        collection_id: &CollectionId,
        limit: usize,
    ) -> Result<Vec<FtsHit>, StoreError> {
        if query.trim().is_empty() {
            return Err(StoreError::Validation("search query must not be empty".into()));
        }
        let query = query.to_string();
        let collection_id = collection_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.point_id \
                 FROM chunks_fts \
                 JOIN chunks c ON c.rowid = chunks_fts.rowid \
                 JOIN documents d ON d.doc_id = c.doc_id \
                 WHERE chunks_fts MATCH ?1 AND c.collection_id = ?2 AND d.is_deleted = 0 \
                 ORDER BY bm25(chunks_fts) ASC \
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![query, collection_id, limit as i64], |row| {
                row.get::<_, String>(0)
            })?;
            let mut hits = Vec::new();
            for (rank, row) in rows.enumerate() {
                hits.push(FtsHit {
                    point_id: PointId(row?),
                    rank: rank + 1,
                });
            }
            Ok(hits)
        })
        .await
    }

    async fn create_sync_job(&self, doc_id: &DocId) -> Result<SyncJob, StoreError> {
        let doc_id = doc_id.clone();
        self.with_conn(move |conn| {
            let job_id = uuid::Uuid::new_v4().to_string();
            let now = now_str();
            conn.execute(
                "INSERT INTO sync_jobs (job_id, doc_id, status, retries, created_at, updated_at) \
                 VALUES (?1, ?2, 'NEW', 0, ?3, ?3)",
                params![job_id, doc_id.0, now],
            )?;
            Ok(SyncJob {
                job_id,
                doc_id,
                status: DocStatus::New,
                retries: 0,
                last_attempt_at: None,
                last_error: None,
                error_category: None,
                next_attempt_at: None,
                created_at: parse_ts(&now),
                updated_at: parse_ts(&now),
            })
        })
        .await
    }

    async fn get_sync_job(&self, doc_id: &DocId) -> Result<Option<SyncJob>, StoreError> {
        let doc_id = doc_id.0.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE doc_id = ?1"),
                params![doc_id],
                row_to_sync_job,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn update_sync_job(&self, doc_id: &DocId, update: JobUpdate) -> Result<SyncJob, StoreError> {
        let doc_id = doc_id.clone();
        self.with_conn(move |conn| {
            let now = now_str();
            let category = update.error_category.map(|c| c.to_string());
            let next_attempt = update.next_attempt_at.map(|t| t.to_rfc3339());
            let changed = conn.execute(
                "UPDATE sync_jobs SET status = ?1, retries = ?2, last_attempt_at = ?3, last_error = ?4, \
                 error_category = ?5, next_attempt_at = ?6, updated_at = ?3 WHERE doc_id = ?7",
                params![
                    update.status.to_string(),
                    update.retries,
                    now,
                    update.last_error,
                    category,
                    next_attempt,
                    doc_id.0,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("sync job for {} not found", doc_id.0)));
            }
            conn.query_row(
                &format!("SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE doc_id = ?1"),
                params![doc_id.0],
                row_to_sync_job,
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn reset_sync_job(&self, doc_id: &DocId) -> Result<SyncJob, StoreError> {
        let doc_id = doc_id.clone();
        self.with_conn(move |conn| {
            let now = now_str();
            let changed = conn.execute(
                "UPDATE sync_jobs SET status = 'NEW', retries = 0, last_error = NULL, \
                 error_category = NULL, next_attempt_at = NULL, updated_at = ?1 WHERE doc_id = ?2",
                params![now, doc_id.0],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("sync job for {} not found", doc_id.0)));
            }
            conn.query_row(
                &format!("SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE doc_id = ?1"),
                params![doc_id.0],
                row_to_sync_job,
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_non_terminal_jobs(&self) -> Result<Vec<SyncJob>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE status NOT IN ('SYNCED', 'DEAD')"
            ))?;
            let rows = stmt.query_map([], row_to_sync_job)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn list_jobs_by_status(&self, status: DocStatus) -> Result<Vec<SyncJob>, StoreError> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE status = ?1"
            ))?;
            let rows = stmt.query_map(params![status], row_to_sync_job)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        self.with_conn(move |conn| {
            let mut counts = StatusCounts::default();
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM sync_jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (status, count) = row?;
                match status.as_str() {
                    "NEW" => counts.new = count,
                    "SPLIT_OK" => counts.split_ok = count,
                    "EMBED_OK" => counts.embed_ok = count,
                    "SYNCED" => counts.synced = count,
                    "FAILED" => counts.failed = count,
                    "RETRYING" => counts.retrying = count,
                    "DEAD" => counts.dead = count,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
    }

    async fn recent_failures(&self, limit: usize) -> Result<Vec<SyncJob>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE status IN ('FAILED', 'DEAD') \
                 ORDER BY updated_at DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit as i64], row_to_sync_job)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteMetadataStore {
        SqliteMetadataStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn create_collection_rejects_duplicate_name() {
        let s = store().await;
        s.create_collection("c1", None).await.unwrap();
        let err = s.create_collection("c1", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_document_is_idempotent_by_content() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let doc_id = DocId("abc123".into());
        let d1 = s
            .create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();
        let d2 = s
            .create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();
        assert_eq!(d1.doc_id, d2.doc_id);
        assert_eq!(d1.created_at, d2.created_at);
    }

    #[tokio::test]
    async fn replace_chunks_is_transactional_and_fts_searchable() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let doc_id = DocId("abc123".into());
        s.create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();

        let chunks = vec![
            NewChunk {
                chunk_index: 0,
                title_chain: vec!["Intro".into()],
                content_hash: "h0".into(),
                content: "the quick brown fox".into(),
            },
            NewChunk {
                chunk_index: 1,
                title_chain: vec!["Body".into()],
                content_hash: "h1".into(),
                content: "jumps over the lazy dog".into(),
            },
        ];
        let inserted = s.replace_chunks(&doc_id, &c.collection_id, chunks).await.unwrap();
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0].point_id.0, "abc123#0");

        let hits = s.fts_search("fox", &c.collection_id, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].point_id.0, "abc123#0");
    }

    #[tokio::test]
    async fn soft_deleted_documents_excluded_from_fts() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let doc_id = DocId("abc123".into());
        s.create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();
        s.replace_chunks(
            &doc_id,
            &c.collection_id,
            vec![NewChunk {
                chunk_index: 0,
                title_chain: vec![],
                content_hash: "h0".into(),
                content: "searchable text".into(),
            }],
        )
        .await
        .unwrap();

        s.mark_doc_deleted(&doc_id).await.unwrap();
        let hits = s.fts_search("searchable", &c.collection_id, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_collection_cascades() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let doc_id = DocId("abc123".into());
        s.create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();
        s.create_sync_job(&doc_id).await.unwrap();
        s.replace_chunks(
            &doc_id,
            &c.collection_id,
            vec![NewChunk {
                chunk_index: 0,
                title_chain: vec![],
                content_hash: "h0".into(),
                content: "x".into(),
            }],
        )
        .await
        .unwrap();

        s.delete_collection(&c.collection_id).await.unwrap();
        assert!(s.get_document(&doc_id).await.unwrap().is_none());
        assert!(s.list_point_ids_by_doc(&doc_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fts_search_rejects_empty_query() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let err = s.fts_search("", &c.collection_id, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn sync_job_lifecycle() {
        let s = store().await;
        let c = s.create_collection("c1", None).await.unwrap();
        let doc_id = DocId("abc123".into());
        s.create_document(&doc_id, &c.collection_id, "file.md", "file.md", "text/markdown", 10, "h1")
            .await
            .unwrap();
        s.create_sync_job(&doc_id).await.unwrap();

        let updated = s
            .update_sync_job(
                &doc_id,
                JobUpdate {
                    status: DocStatus::Failed,
                    retries: 1,
                    last_error: Some("boom".into()),
                    error_category: Some(ErrorCategory::TransientNetwork),
                    next_attempt_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, DocStatus::Failed);
        assert_eq!(updated.retries, 1);

        let non_terminal = s.list_non_terminal_jobs().await.unwrap();
        assert_eq!(non_terminal.len(), 1);

        let reset = s.reset_sync_job(&doc_id).await.unwrap();
        assert_eq!(reset.status, DocStatus::New);
        assert_eq!(reset.retries, 0);
    }
}
