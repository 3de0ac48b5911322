// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Qdrant-backed vector store for case memory
//!
//! Cases are stored as points in a cosine-distance collection. The case itself
//! travels as a JSON string in the `case` payload field; `labels` is duplicated
//! as a keyword list so label filtering runs natively inside Qdrant.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Adapter behind the `VectorStore` port

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, vectors_config, CollectionInfo, Condition, CountPointsBuilder,
        CreateCollectionBuilder, Distance, Filter, ListValue, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, Value, VectorParams, VectorParamsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::StoreError;
use crate::infrastructure::repository::{Payload, ScoredPayload, SearchFilter, VectorStore};

pub const DEFAULT_COLLECTION: &str = "credit_memory";

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    /// Create a new Qdrant-backed store. Call [`initialize`](Self::initialize) before use.
    pub fn new(url: &str, collection: &str, dimension: usize) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Create the collection with cosine distance if it does not exist yet.
    /// An existing collection must already use cosine distance and this
    /// store's dimension.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to check collection existence: {}", e)))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| StoreError::Unavailable(format!("Failed to create Qdrant collection: {}", e)))?;

            tracing::info!(collection = %self.collection, dimension = self.dimension, "Created Qdrant collection");
            return Ok(());
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to read collection info: {}", e)))?
            .result
            .ok_or_else(|| StoreError::IncompatibleCollection("collection info missing".to_string()))?;

        let params = vector_params(&info).ok_or_else(|| {
            StoreError::IncompatibleCollection(format!(
                "collection '{}' does not have a single unnamed vector",
                self.collection
            ))
        })?;
        check_vector_params(params, self.dimension)?;

        tracing::info!(collection = %self.collection, dimension = self.dimension, "Using existing Qdrant collection");
        Ok(())
    }

    /// Qdrant point ids must be UUIDs or integers; case ids are arbitrary strings.
    fn point_id(case_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, case_id.as_bytes()).to_string()
    }

    fn to_qdrant_payload(payload: &Payload) -> Result<HashMap<String, Value>, StoreError> {
        let case_json = serde_json::to_string(payload)
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;

        let labels: Vec<Value> = payload
            .get("labels")
            .and_then(serde_json::Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(|label| Value::from(label.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let mut fields = HashMap::new();
        fields.insert("case".to_string(), Value::from(case_json));
        fields.insert(
            "labels".to_string(),
            Value {
                kind: Some(Kind::ListValue(ListValue { values: labels })),
            },
        );
        Ok(fields)
    }

    fn from_qdrant_payload(fields: &HashMap<String, Value>) -> Result<Payload, StoreError> {
        let case_json = match fields.get("case").and_then(|v| v.kind.as_ref()) {
            Some(Kind::StringValue(s)) => s,
            _ => return Err(StoreError::InvalidPayload("Missing case field".to_string())),
        };

        serde_json::from_str(case_json).map_err(|e| StoreError::InvalidPayload(e.to_string()))
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

fn vector_params(info: &CollectionInfo) -> Option<&VectorParams> {
    let config = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?.config.as_ref()?;
    match config {
        vectors_config::Config::Params(params) => Some(params),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Scores are read as cosine similarity, so any other metric is rejected.
fn check_vector_params(params: &VectorParams, dimension: usize) -> Result<(), StoreError> {
    if params.size != dimension as u64 {
        return Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: params.size as usize,
        });
    }
    if params.distance != i32::from(Distance::Cosine) {
        let metric = Distance::try_from(params.distance)
            .map(|d| d.as_str_name())
            .unwrap_or("Unknown");
        return Err(StoreError::IncompatibleCollection(format!(
            "expected Cosine distance, collection uses {}",
            metric
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, id: &str, vector: &[f32], payload: Payload) -> Result<(), StoreError> {
        self.check_dimension(vector)?;

        let point = PointStruct::new(
            Self::point_id(id),
            vector.to_vec(),
            Self::to_qdrant_payload(&payload)?,
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to store case in Qdrant: {}", e)))?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPayload>, StoreError> {
        self.check_dimension(vector)?;

        let mut request =
            SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64).with_payload(true);

        if let Some(SearchFilter::LabelContains(label)) = filter {
            request = request.filter(Filter::must([Condition::matches("labels", label.clone())]));
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to search cases in Qdrant: {}", e)))?;

        response
            .result
            .into_iter()
            .map(|point| {
                Ok(ScoredPayload {
                    payload: Self::from_qdrant_payload(&point.payload)?,
                    similarity: point.score as f64,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to count cases in Qdrant: {}", e)))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn supports_native_filter(&self) -> bool {
        true
    }
}
