//! SQL schema and FTS5 trigger wiring.

use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS collections (
            collection_id TEXT PRIMARY KEY,
            name          TEXT NOT NULL UNIQUE,
            description   TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            doc_id         TEXT PRIMARY KEY,
            collection_id  TEXT NOT NULL REFERENCES collections(collection_id),
            source_key     TEXT NOT NULL,
            name           TEXT NOT NULL,
            mime           TEXT NOT NULL,
            size_bytes     INTEGER NOT NULL,
            content_hash   TEXT NOT NULL,
            status         TEXT NOT NULL,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL,
            is_deleted     INTEGER NOT NULL DEFAULT 0,
            synced_at      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection_id);

        CREATE TABLE IF NOT EXISTS chunks (
            point_id       TEXT PRIMARY KEY,
            doc_id         TEXT NOT NULL REFERENCES documents(doc_id),
            collection_id  TEXT NOT NULL REFERENCES collections(collection_id),
            chunk_index    INTEGER NOT NULL,
            title_chain    TEXT NOT NULL,
            content_hash   TEXT NOT NULL,
            content        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
            point_id UNINDEXED,
            content,
            content='chunks',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, point_id, content)
            VALUES (new.rowid, new.point_id, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, point_id, content)
            VALUES ('delete', old.rowid, old.point_id, old.content);
        END;

        CREATE TABLE IF NOT EXISTS sync_jobs (
            job_id           TEXT PRIMARY KEY,
            doc_id           TEXT NOT NULL UNIQUE REFERENCES documents(doc_id),
            status           TEXT NOT NULL,
            retries          INTEGER NOT NULL DEFAULT 0,
            last_attempt_at  TEXT,
            last_error       TEXT,
            error_category   TEXT,
            next_attempt_at  TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sync_jobs_status ON sync_jobs(status);
        "#,
    )
}
