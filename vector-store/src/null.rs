use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chunk_model::{CollectionId, DocId, PointId, VectorPoint};

use crate::{PointFilter, VectorHit, VectorStore, VectorStoreError};

/// In-memory `Vec`-backed test double: no graph, no approximation, linear
/// search. Mirrors the teacher's pattern of a trivial stub behind the same
/// trait the real adapter implements, for deterministic unit tests.
#[derive(Default)]
pub struct NullVectorStore {
    collections: Mutex<HashMap<String, (usize, Vec<VectorPoint>)>>,
}

impl NullVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_score(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for NullVectorStore {
    async fn ensure_collection(&self, collection: &CollectionId, dim: usize) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        match collections.get(&collection.0) {
            Some((existing_dim, _)) if *existing_dim != dim => Err(VectorStoreError::Validation(format!(
                "collection {collection} already exists with dim {existing_dim}, requested {dim}"
            ))),
            Some(_) => Ok(()),
            None => {
                collections.insert(collection.0.clone(), (dim, Vec::new()));
                Ok(())
            }
        }
    }

    async fn upsert_points(&self, collection: &CollectionId, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        let (dim, existing) = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        for point in &points {
            if point.vector.len() != *dim {
                return Err(VectorStoreError::Validation(format!(
                    "point {} has dimension {}, collection expects {dim}",
                    point.point_id,
                    point.vector.len()
                )));
            }
        }
        for point in points {
            existing.retain(|p| p.point_id != point.point_id);
            existing.push(point);
        }
        Ok(())
    }

    async fn delete_points(&self, collection: &CollectionId, point_ids: &[PointId]) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        let (_, existing) = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        existing.retain(|p| !point_ids.contains(&p.point_id));
        Ok(())
    }

    async fn delete_points_by_filter(&self, collection: &CollectionId, filter: PointFilter) -> Result<u64, VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        let (_, existing) = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        let before = existing.len();
        match filter {
            PointFilter::Collection => existing.clear(),
            PointFilter::Doc(doc_id) => existing.retain(|p| p.payload.doc_id != doc_id),
        }
        Ok((before - existing.len()) as u64)
    }

    async fn list_all_point_ids(&self, collection: &CollectionId) -> Result<Vec<PointId>, VectorStoreError> {
        let collections = self.collections.lock().unwrap();
        let (_, existing) = collections
            .get(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        Ok(existing.iter().map(|p| p.point_id.clone()).collect())
    }

    async fn search(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let collections = self.collections.lock().unwrap();
        let (dim, existing) = collections
            .get(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        if vector.len() != *dim {
            return Err(VectorStoreError::Validation(format!(
                "query vector has dimension {}, collection expects {dim}",
                vector.len()
            )));
        }
        let doc_filter = match filter {
            Some(PointFilter::Doc(doc_id)) => Some(doc_id),
            Some(PointFilter::Collection) | None => None,
        };
        let mut scored: Vec<VectorHit> = existing
            .iter()
            .filter(|p| match &doc_filter {
                Some(d) => &p.payload.doc_id == d,
                None => true,
            })
            .map(|p| VectorHit {
                point_id: p.point_id.clone(),
                score: cosine_score(vector, &p.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_model::VectorPayload;

    fn point(id: &str, doc: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            point_id: PointId(id.into()),
            vector,
            payload: VectorPayload {
                doc_id: DocId(doc.into()),
                collection_id: CollectionId("c1".into()),
                chunk_index: 0,
                title_chain: vec![],
                content_hash: "h".into(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point() {
        let store = NullVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 2).await.unwrap();
        store.upsert_points(&c, vec![point("d1#0", "d1", vec![1.0, 0.0])]).await.unwrap();
        store.upsert_points(&c, vec![point("d1#0", "d1", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.list_all_point_ids(&c).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = NullVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 2).await.unwrap();
        store
            .upsert_points(
                &c,
                vec![point("d1#0", "d1", vec![1.0, 0.0]), point("d2#0", "d2", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        let hits = store.search(&c, &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].point_id.0, "d1#0");
    }
}
