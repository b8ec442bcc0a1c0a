use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chunk_model::{CollectionId, DocId, PointId, VectorPoint};
use hnsw_rs::dist::DistCosine;
use hnsw_rs::hnsw::Hnsw;

use crate::{PointFilter, VectorHit, VectorStore, VectorStoreError};

const MAX_NB_CONNECTION: usize = 16;
const MAX_ELEMENTS: usize = 200_000;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;
/// Extra candidates pulled per requested hit, to cover tombstoned points
/// the graph itself has no way to physically remove.
const OVERSAMPLE: usize = 4;

struct CollectionState {
    dim: usize,
    index: Hnsw<'static, f32, DistCosine>,
    next_internal_id: usize,
    id_to_point: HashMap<usize, PointId>,
    point_to_id: HashMap<PointId, usize>,
    doc_of_point: HashMap<PointId, DocId>,
    deleted: HashSet<usize>,
}

impl CollectionState {
    fn new(dim: usize) -> Self {
        Self {
            dim,
            index: Hnsw::new(MAX_NB_CONNECTION, MAX_ELEMENTS, MAX_LAYER, EF_CONSTRUCTION, DistCosine {}),
            next_internal_id: 0,
            id_to_point: HashMap::new(),
            point_to_id: HashMap::new(),
            doc_of_point: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    /// Tombstones any existing entry for `point_id`; the graph keeps the
    /// stale vector around but [`search`]/[`list_all_point_ids`] hide it.
    fn remove_point(&mut self, point_id: &PointId) {
        if let Some(internal) = self.point_to_id.remove(point_id) {
            self.id_to_point.remove(&internal);
            self.doc_of_point.remove(point_id);
            self.deleted.insert(internal);
        }
    }

    fn insert_point(&mut self, point: VectorPoint) {
        self.remove_point(&point.point_id);
        let internal = self.next_internal_id;
        self.next_internal_id += 1;
        self.index.insert((point.vector.as_slice(), internal));
        self.id_to_point.insert(internal, point.point_id.clone());
        self.doc_of_point.insert(point.point_id.clone(), point.payload.doc_id.clone());
        self.point_to_id.insert(point.point_id, internal);
    }
}

/// In-process, single-node vector store backed by one HNSW graph per
/// collection (grounded in the `hnsw_rs` dependency). Usable as the
/// default backend for a demo deployment; a networked backend can
/// implement [`VectorStore`] the same way without touching `sync-engine`.
pub struct HnswVectorStore {
    collections: Mutex<HashMap<String, CollectionState>>,
}

impl Default for HnswVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HnswVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for HnswVectorStore {
    async fn ensure_collection(&self, collection: &CollectionId, dim: usize) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        match collections.get(&collection.0) {
            Some(existing) if existing.dim != dim => Err(VectorStoreError::Validation(format!(
                "collection {collection} already exists with dim {}, requested {dim}",
                existing.dim
            ))),
            Some(_) => Ok(()),
            None => {
                collections.insert(collection.0.clone(), CollectionState::new(dim));
                Ok(())
            }
        }
    }

    async fn upsert_points(&self, collection: &CollectionId, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut collections = self.collections.lock().unwrap();
        let state = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;

        for point in &points {
            if point.vector.len() != state.dim {
                return Err(VectorStoreError::Validation(format!(
                    "point {} has dimension {}, collection expects {}",
                    point.point_id,
                    point.vector.len(),
                    state.dim
                )));
            }
        }
        for point in points {
            state.insert_point(point);
        }
        Ok(())
    }

    async fn delete_points(&self, collection: &CollectionId, point_ids: &[PointId]) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        let state = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        for point_id in point_ids {
            state.remove_point(point_id);
        }
        Ok(())
    }

    async fn delete_points_by_filter(&self, collection: &CollectionId, filter: PointFilter) -> Result<u64, VectorStoreError> {
        let mut collections = self.collections.lock().unwrap();
        let state = collections
            .get_mut(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        let targets: Vec<PointId> = match filter {
            PointFilter::Collection => state.point_to_id.keys().cloned().collect(),
            PointFilter::Doc(doc_id) => state
                .doc_of_point
                .iter()
                .filter(|(_, d)| **d == doc_id)
                .map(|(p, _)| p.clone())
                .collect(),
        };
        let count = targets.len() as u64;
        for point_id in targets {
            state.remove_point(&point_id);
        }
        Ok(count)
    }

    async fn list_all_point_ids(&self, collection: &CollectionId) -> Result<Vec<PointId>, VectorStoreError> {
        let collections = self.collections.lock().unwrap();
        let state = collections
            .get(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        Ok(state.point_to_id.keys().cloned().collect())
    }

    async fn search(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let collections = self.collections.lock().unwrap();
        let state = collections
            .get(&collection.0)
            .ok_or_else(|| VectorStoreError::NotFound(format!("collection {collection} not found")))?;
        if vector.len() != state.dim {
            return Err(VectorStoreError::Validation(format!(
                "query vector has dimension {}, collection expects {}",
                vector.len(),
                state.dim
            )));
        }

        let doc_filter = match filter {
            Some(PointFilter::Doc(doc_id)) => Some(doc_id),
            Some(PointFilter::Collection) | None => None,
        };

        let knbn = (limit * OVERSAMPLE).max(limit);
        let neighbours = state.index.search(vector, knbn, EF_SEARCH);

        let mut hits = Vec::with_capacity(limit);
        for neighbour in neighbours {
            if state.deleted.contains(&neighbour.d_id) {
                continue;
            }
            let Some(point_id) = state.id_to_point.get(&neighbour.d_id) else {
                continue;
            };
            if let Some(doc_id) = &doc_filter {
                if state.doc_of_point.get(point_id) != Some(doc_id) {
                    continue;
                }
            }
            hits.push(VectorHit {
                point_id: point_id.clone(),
                score: -neighbour.distance,
            });
            if hits.len() == limit {
                break;
            }
        }
        Ok(hits)
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
    async fn ensure_collection_is_idempotent() {
        let store = HnswVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 4).await.unwrap();
        store.ensure_collection(&c, 4).await.unwrap();
        assert!(store.ensure_collection(&c, 8).await.is_err());
    }

    #[tokio::test]
    async fn search_finds_nearest_neighbour() {
        let store = HnswVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 3).await.unwrap();
        store
            .upsert_points(
                &c,
                vec![
                    point("d1#0", "d1", vec![1.0, 0.0, 0.0]),
                    point("d2#0", "d2", vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search(&c, &[1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].point_id.0, "d1#0");
    }

    #[tokio::test]
    async fn deleted_points_are_excluded_from_search_and_enumeration() {
        let store = HnswVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 3).await.unwrap();
        store
            .upsert_points(&c, vec![point("d1#0", "d1", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        store.delete_points(&c, &[PointId("d1#0".into())]).await.unwrap();

        assert!(store.list_all_point_ids(&c).await.unwrap().is_empty());
        let hits = store.search(&c, &[1.0, 0.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_by_doc_filter_only_removes_that_documents_points() {
        let store = HnswVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 3).await.unwrap();
        store
            .upsert_points(
                &c,
                vec![
                    point("d1#0", "d1", vec![1.0, 0.0, 0.0]),
                    point("d2#0", "d2", vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let deleted = store
            .delete_points_by_filter(&c, PointFilter::Doc(DocId("d1".into())))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.list_all_point_ids(&c).await.unwrap();
        assert_eq!(remaining, vec![PointId("d2#0".into())]);
    }

    #[tokio::test]
    async fn upsert_rejects_whole_batch_on_dimension_mismatch() {
        let store = HnswVectorStore::new();
        let c = CollectionId("c1".into());
        store.ensure_collection(&c, 3).await.unwrap();
        let bad = vec![
            point("d1#0", "d1", vec![1.0, 0.0, 0.0]),
            point("d2#0", "d2", vec![0.0, 1.0]),
        ];
        assert!(store.upsert_points(&c, bad).await.is_err());
        assert!(store.list_all_point_ids(&c).await.unwrap().is_empty());
    }
}
