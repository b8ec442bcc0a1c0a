use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chunk_model::{Chunk, CollectionId, DocId, PointId};
use embedding_provider::EmbeddingProvider;
use metadata_store::{MetadataStore, StoreError};
use vector_store::VectorStore;

use crate::error::SearchError;
use crate::rrf::{self, RRF_K};

/// Which list(s) contributed to a [`SearchHit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Keyword,
    Semantic,
    Fused,
}

/// A single ranked search result (spec §4.9 output shape).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub point_id: PointId,
    pub doc_id: DocId,
    pub chunk_index: u32,
    pub title_chain: Vec<String>,
    pub content: String,
    pub score: f32,
    pub source: HitSource,
}

/// Keyword (full-text) + vector search fused with RRF, scoped to a
/// collection and filtered to non-deleted documents (spec §4.9).
pub struct HybridSearch {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl HybridSearch {
    pub fn new(metadata: Arc<dyn MetadataStore>, vectors: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { metadata, vectors, embedder }
    }

    pub async fn search(&self, query: &str, collection_id: &CollectionId, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Validation("query must not be empty".into()));
        }
        if !(1..=100).contains(&limit) {
            return Err(SearchError::Validation(format!("limit must be in [1, 100], got {limit}")));
        }

        let keyword_hits = self.metadata.fts_search(query, collection_id, limit).await.map_err(|e| match e {
            StoreError::Validation(msg) => SearchError::Validation(msg),
            other => SearchError::Store(other),
        })?;
        let keyword_order: Vec<PointId> = keyword_hits.into_iter().map(|h| h.point_id).collect();

        // Semantic search is best-effort: an embedding failure degrades to
        // keyword-only results rather than failing the whole query.
        let vector_order: Vec<PointId> = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut vectors) => {
                let query_vector = vectors.pop().unwrap_or_default();
                match self.vectors.search(collection_id, &query_vector, limit, None).await {
                    Ok(hits) => hits.into_iter().map(|h| h.point_id).collect(),
                    Err(err) => {
                        tracing::warn!(error = %err, "vector search failed, falling back to keyword-only");
                        Vec::new()
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "embedding failed, falling back to keyword-only results");
                Vec::new()
            }
        };

        let fused = rrf::fuse(&keyword_order, &vector_order, RRF_K);
        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = fused.iter().map(|f| f.point_id.clone()).collect();
        let chunks = self.metadata.get_chunks(&point_ids, collection_id).await?;
        let chunk_by_point: HashMap<PointId, Chunk> = chunks.into_iter().map(|c| (c.point_id.clone(), c)).collect();

        let keyword_set: HashSet<&PointId> = keyword_order.iter().collect();
        let vector_set: HashSet<&PointId> = vector_order.iter().collect();
        let mut deleted_cache: HashMap<DocId, bool> = HashMap::new();

        let mut out = Vec::with_capacity(limit.min(fused.len()));
        for f in fused {
            let Some(chunk) = chunk_by_point.get(&f.point_id) else {
                continue; // chunk missing: AutoGC hasn't caught up with a deleted/orphaned point yet
            };

            let is_deleted = match deleted_cache.get(&chunk.doc_id) {
                Some(v) => *v,
                None => {
                    let deleted = self
                        .metadata
                        .get_document(&chunk.doc_id)
                        .await?
                        .map(|d| d.is_deleted)
                        .unwrap_or(true);
                    deleted_cache.insert(chunk.doc_id.clone(), deleted);
                    deleted
                }
            };
            if is_deleted {
                continue;
            }

            let source = match (keyword_set.contains(&f.point_id), vector_set.contains(&f.point_id)) {
                (true, true) => HitSource::Fused,
                (true, false) => HitSource::Keyword,
                (false, true) => HitSource::Semantic,
                (false, false) => continue, // point only existed due to a score of 0; unreachable in practice
            };

            out.push(SearchHit {
                point_id: f.point_id.clone(),
                doc_id: chunk.doc_id.clone(),
                chunk_index: chunk.chunk_index,
                title_chain: chunk.title_chain.clone(),
                content: chunk.content.clone(),
                score: f.score,
                source,
            });

            if out.len() >= limit {
                break;
            }
        }

        Ok(out)
    }
}
