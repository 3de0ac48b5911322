// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process vector store with exact cosine search.
//! Used for tests, demos and small memories that fit in RAM.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::StoreError;
use crate::infrastructure::repository::{Payload, ScoredPayload, SearchFilter, VectorStore};

struct StoredPoint {
    vector: Vec<f32>,
    payload: Payload,
}

#[derive(Default)]
struct Points {
    // Insertion order is the tie-break order for equal similarities
    ordered: Vec<StoredPoint>,
    index: HashMap<String, usize>,
}

pub struct InMemoryVectorStore {
    dimension: usize,
    points: Arc<RwLock<Points>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: Arc::new(RwLock::new(Points::default())),
        }
    }

    /// Calculate cosine similarity between two vectors
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
        let magnitude_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        let magnitude_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

        if magnitude_a == 0.0 || magnitude_b == 0.0 {
            return 0.0;
        }

        dot_product / (magnitude_a * magnitude_b)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, id: &str, vector: &[f32], payload: Payload) -> Result<(), StoreError> {
        self.check_dimension(vector)?;

        let mut points = self.points.write().await;
        let point = StoredPoint {
            vector: vector.to_vec(),
            payload,
        };

        match points.index.get(id).copied() {
            Some(position) => points.ordered[position] = point,
            None => {
                let position = points.ordered.len();
                points.ordered.push(point);
                points.index.insert(id.to_string(), position);
            }
        }

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPayload>, StoreError> {
        self.check_dimension(vector)?;

        let points = self.points.read().await;

        let mut results: Vec<ScoredPayload> = points
            .ordered
            .iter()
            .filter(|point| filter.is_none_or(|f| f.matches(&point.payload)))
            .map(|point| ScoredPayload {
                payload: point.payload.clone(),
                similarity: Self::cosine_similarity(vector, &point.vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.points.read().await.ordered.len() as u64)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn supports_native_filter(&self) -> bool {
        true
    }
}

/// Delegates to the in-memory store but refuses native filters, forcing
/// callers onto their over-fetch path.
#[cfg(test)]
pub(crate) struct UnfilteredStore(pub InMemoryVectorStore);

#[cfg(test)]
#[async_trait]
impl VectorStore for UnfilteredStore {
    async fn upsert(&self, id: &str, vector: &[f32], payload: Payload) -> Result<(), StoreError> {
        self.0.upsert(id, vector, payload).await
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPayload>, StoreError> {
        if filter.is_some() {
            return Err(StoreError::Unavailable("filters unsupported".to_string()));
        }
        self.0.search(vector, k, None).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.0.count().await
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn supports_native_filter(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(id: &str, labels: &[&str]) -> Payload {
        json!({ "id": id, "labels": labels }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_vector_search() {
        let store = InMemoryVectorStore::new(3);

        store.upsert("a", &[1.0, 0.0, 0.0], payload("a", &[])).await.unwrap();
        store.upsert("b", &[0.0, 1.0, 0.0], payload("b", &[])).await.unwrap();

        let results = store.search(&[0.9, 0.1, 0.0], 1, None).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["id"], "a");
        assert!(results[0].similarity > 0.9);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id() {
        let store = InMemoryVectorStore::new(2);

        store.upsert("a", &[1.0, 0.0], payload("a", &[])).await.unwrap();
        store.upsert("a", &[0.0, 1.0], payload("a", &["fraud"])).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[0.0, 1.0], 5, None).await.unwrap();
        assert!(results[0].similarity > 0.999);
        assert_eq!(results[0].payload["labels"][0], "fraud");
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new(2);

        for id in ["first", "second", "third"] {
            store.upsert(id, &[1.0, 1.0], payload(id, &[])).await.unwrap();
        }

        let results = store.search(&[1.0, 1.0], 3, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.payload["id"].clone()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let store = InMemoryVectorStore::new(2);

        store.upsert("close", &[1.0, 0.0], payload("close", &[])).await.unwrap();
        store.upsert("far", &[0.0, 1.0], payload("far", &["fraud"])).await.unwrap();

        let filter = SearchFilter::LabelContains("fraud".to_string());
        let results = store.search(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["id"], "far");
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = InMemoryVectorStore::new(3);

        let err = store.upsert("a", &[1.0], payload("a", &[])).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, actual: 1 }));

        let err = store.search(&[1.0, 0.0], 1, None).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryVectorStore::new(2);

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 5, None).await.unwrap().is_empty());
    }
}
