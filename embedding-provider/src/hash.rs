use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::{reject_empty, EmbedError, EmbeddingProvider};

/// Deterministic pseudo-embedder: same text always hashes to the same
/// vector, with no network or model dependency. Grounded in the teacher's
/// `DeterministicEmbedderCore` (used there to stand in for an HTTP-backed
/// ONNX provider in tests).
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        for index in 0..self.dimension {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            index.hash(&mut hasher);
            out.push(normalize_hash(hasher.finish()));
        }
        out
    }
}

fn normalize_hash(value: u64) -> f32 {
    let normalized = (value as f64) / (u64::MAX as f64);
    (normalized * 2.0 - 1.0) as f32
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        reject_empty(texts)?;
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let p = HashEmbeddingProvider::new(8);
        let a = p.embed(&["hello".to_string()]).await.unwrap();
        let b = p.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 8);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let p = HashEmbeddingProvider::new(8);
        let a = p.embed(&["hello".to_string()]).await.unwrap();
        let b = p.embed(&["world".to_string()]).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn rejects_empty_string() {
        let p = HashEmbeddingProvider::new(4);
        let err = p.embed(&["".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::EmptyInput));
    }

    #[tokio::test]
    async fn preserves_input_count() {
        let p = HashEmbeddingProvider::new(4);
        let texts: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let out = p.embed(&texts).await.unwrap();
        assert_eq!(out.len(), texts.len());
    }
}
