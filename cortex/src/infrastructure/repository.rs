// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Port to the vector storage engine.
//! Only `CaseMemory` talks to a store; scoring never sees native similarity.

use async_trait::async_trait;

use crate::domain::StoreError;

/// Stored payload: the case serialized as a JSON object, minus its vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Predicate applied to candidate payloads during search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// Payload `labels` array contains the tag
    LabelContains(String),
}

impl SearchFilter {
    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Self::LabelContains(label) => payload
                .get("labels")
                .and_then(serde_json::Value::as_array)
                .is_some_and(|labels| labels.iter().any(|l| l.as_str() == Some(label.as_str()))),
        }
    }
}

/// A search hit with the store's native similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
    pub payload: Payload,
    pub similarity: f64,
}

/// Nearest-neighbor index with upsert-by-id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the point stored under `id`
    async fn upsert(&self, id: &str, vector: &[f32], payload: Payload) -> Result<(), StoreError>;

    /// Top-`k` matches ordered by descending similarity.
    /// Stores without native filtering must return `Unavailable` when given a filter.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPayload>, StoreError>;

    /// Number of stored points
    async fn count(&self) -> Result<u64, StoreError>;

    /// Vector dimensionality fixed when the store was initialized
    fn dimension(&self) -> usize;

    /// Whether `search` accepts a filter natively
    fn supports_native_filter(&self) -> bool;
}
