//! Keyword + semantic search fused with Reciprocal Rank Fusion (spec
//! §4.9): the read path sitting alongside the ingestion pipeline.

mod error;
mod rrf;
mod search;

pub use error::SearchError;
pub use rrf::{fuse, FusedPoint, RRF_K};
pub use search::{HitSource, HybridSearch, SearchHit};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use embedding_provider::HashEmbeddingProvider;
    use metadata_store::{MetadataStore, NewChunk, SqliteMetadataStore};
    use vector_store::{NullVectorStore, VectorStore};

    use super::*;

    async fn seeded() -> (HybridSearch, Arc<SqliteMetadataStore>, chunk_model::CollectionId) {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let collection = metadata.create_collection("docs", None).await.unwrap();
        let doc = metadata
            .create_document(
                &chunk_model::DocId("doc1".into()),
                &collection.collection_id,
                "doc1",
                "f.md",
                "text/markdown",
                10,
                "hash1",
            )
            .await
            .unwrap();
        let chunks = metadata
            .replace_chunks(
                &doc.doc_id,
                &collection.collection_id,
                vec![
                    NewChunk {
                        chunk_index: 0,
                        title_chain: vec!["Intro".into()],
                        content_hash: "h0".into(),
                        content: "rust systems programming".into(),
                    },
                    NewChunk {
                        chunk_index: 1,
                        title_chain: vec!["Details".into()],
                        content_hash: "h1".into(),
                        content: "garbage collection strategies".into(),
                    },
                ],
            )
            .await
            .unwrap();

        let embedder = Arc::new(HashEmbeddingProvider::new(8));
        let vectors = Arc::new(NullVectorStore::new());
        vectors.ensure_collection(&collection.collection_id, 8).await.unwrap();
        let mut points = Vec::new();
        for chunk in &chunks {
            let vector = embedder.embed(&[chunk.content.clone()]).await.unwrap().remove(0);
            points.push(chunk_model::VectorPoint {
                point_id: chunk.point_id.clone(),
                vector,
                payload: chunk_model::VectorPayload {
                    doc_id: doc.doc_id.clone(),
                    collection_id: collection.collection_id.clone(),
                    chunk_index: chunk.chunk_index,
                    title_chain: chunk.title_chain.clone(),
                    content_hash: chunk.content_hash.clone(),
                },
            });
        }
        vectors.upsert_points(&collection.collection_id, points).await.unwrap();

        let search = HybridSearch::new(metadata.clone() as Arc<dyn MetadataStore>, vectors, embedder);
        (search, metadata, collection.collection_id)
    }

    #[tokio::test]
    async fn finds_keyword_match() {
        let (search, _metadata, collection_id) = seeded().await;
        let hits = search.search("rust", &collection_id, 10).await.unwrap();
        assert!(hits.iter().any(|h| h.content.contains("rust")));
    }

    #[tokio::test]
    async fn rejects_empty_query() {
        let (search, _metadata, collection_id) = seeded().await;
        let err = search.search("", &collection_id, 10).await.unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_out_of_range_limit() {
        let (search, _metadata, collection_id) = seeded().await;
        let err = search.search("rust", &collection_id, 0).await.unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
        let err = search.search("rust", &collection_id, 101).await.unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    #[tokio::test]
    async fn excludes_soft_deleted_documents() {
        let (search, metadata, collection_id) = seeded().await;
        metadata.mark_doc_deleted(&chunk_model::DocId("doc1".into())).await.unwrap();
        let hits = search.search("rust", &collection_id, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_collection_yields_empty_results() {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let collection = metadata.create_collection("empty", None).await.unwrap();
        let vectors = Arc::new(NullVectorStore::new());
        let embedder = Arc::new(HashEmbeddingProvider::new(8));
        let search = HybridSearch::new(metadata.clone() as Arc<dyn MetadataStore>, vectors, embedder);
        let hits = search.search("anything", &collection.collection_id, 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
