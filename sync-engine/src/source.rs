use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Errors reading or writing original document bytes.
#[derive(Debug, Error)]
pub enum SourceStoreError {
    #[error("source key not found: {0}")]
    NotFound(String),

    #[error("source store io error: {0}")]
    Io(String),
}

/// Where `ImportService` stashes uploaded bytes and `SyncEngine` reads them
/// back for splitting (and re-reads them on resync, spec §4.8). The wire
/// format/backend isn't part of the core contract; this is the concrete
/// default so the binary has somewhere to put files.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SourceStoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, SourceStoreError>;
    async fn delete(&self, key: &str) -> Result<(), SourceStoreError>;
}

/// Plain-filesystem backed `SourceStore`, grounded in the teacher's
/// file-path-based ingestion (`file_chunker::chunk_file_with_file_record`).
pub struct FsSourceStore {
    root: PathBuf,
}

impl FsSourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl SourceStore for FsSourceStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SourceStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SourceStoreError::Io(e.to_string()))?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| SourceStoreError::Io(e.to_string()))?;
        file.write_all(bytes)
            .await
            .map_err(|e| SourceStoreError::Io(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, SourceStoreError> {
        let path = self.path_for(key);
        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceStoreError::NotFound(key.to_string())
            } else {
                SourceStoreError::Io(e.to_string())
            }
        })?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| SourceStoreError::Io(e.to_string()))?;
        Ok(buf)
    }

    async fn delete(&self, key: &str) -> Result<(), SourceStoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SourceStoreError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSourceStore::new(dir.path());
        store.put("a/b.md", b"hello").await.unwrap();
        assert_eq!(store.get("a/b.md").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSourceStore::new(dir.path());
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, SourceStoreError::NotFound(_)));
    }
}
