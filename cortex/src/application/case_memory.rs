// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # CaseMemory: Precedent Storage & Retrieval
//!
//! Owns the only handle to the vector store and the vectorizer. Every other
//! component reaches stored cases through this type.
//!
//! ## Distance convention
//!
//! Stores report native cosine similarity. `CaseMemory` converts each score to
//! `distance = clamp(1 - similarity, 0, 1)` and keeps the store's ordering, so
//! neighbors come back closest first with ties in native return order.
//!
//! ## Label filtering
//!
//! When the store filters natively the predicate is pushed down. Otherwise a
//! wider candidate set (`over_fetch_factor × k`, or an explicit width) is
//! fetched and filtered here. [`CaseMemory::filter_strategy`] reports which.
//!
//! ## Consistency
//!
//! Writes are serialised by an internal lock; reads never take it. A case is
//! visible to reads that start after `add_case` returns, nothing stronger.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::vectorizer::FeatureVectorizer;
use crate::domain::{Case, CaseId, Decision, FeatureVector, MemoryError, Neighbor, StoreError};
use crate::infrastructure::history_file;
use crate::infrastructure::{Payload, ScoredPayload, SearchFilter, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Predicate evaluated inside the store
    Native,
    /// Wider unfiltered search, filtered in memory
    OverFetch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_cases: u64,
    pub dimension: usize,
    pub filter_strategy: FilterStrategy,
}

pub struct CaseMemory {
    store: Arc<dyn VectorStore>,
    vectorizer: Arc<FeatureVectorizer>,
    over_fetch_factor: usize,
    write_lock: Mutex<()>,
}

impl CaseMemory {
    /// Fails when the store and vectorizer disagree on dimensionality.
    pub fn new(
        store: Arc<dyn VectorStore>,
        vectorizer: Arc<FeatureVectorizer>,
        over_fetch_factor: usize,
    ) -> Result<Self, MemoryError> {
        if store.dimension() != vectorizer.dimension() {
            return Err(MemoryError::Configuration(format!(
                "vector store dimension {} does not match vectorizer output {}",
                store.dimension(),
                vectorizer.dimension()
            )));
        }
        if over_fetch_factor == 0 {
            return Err(MemoryError::Configuration(
                "over_fetch_factor must be at least 1".to_string(),
            ));
        }

        let memory = Self {
            store,
            vectorizer,
            over_fetch_factor,
            write_lock: Mutex::new(()),
        };

        info!(
            dimension = memory.vectorizer.dimension(),
            filter_strategy = ?memory.filter_strategy(),
            "Case memory initialized"
        );

        Ok(memory)
    }

    pub fn vectorizer(&self) -> &FeatureVectorizer {
        &self.vectorizer
    }

    pub fn filter_strategy(&self) -> FilterStrategy {
        if self.store.supports_native_filter() {
            FilterStrategy::Native
        } else {
            FilterStrategy::OverFetch
        }
    }

    /// Store a case, vectorizing its profile unless a vector is already attached.
    /// Generates an id when none is set. Returns the stored id.
    pub async fn add_case(&self, case: Case) -> Result<CaseId, MemoryError> {
        let prepared = prepare(self.ensure_vector(case).await?)?;

        let _guard = self.write_lock.lock().await;
        self.write(&prepared).await.map_err(MemoryError::Write)?;
        Ok(prepared.id)
    }

    /// k nearest cases, closest first.
    pub async fn retrieve_neighbors(
        &self,
        vector: &FeatureVector,
        k: usize,
    ) -> Result<Vec<Neighbor>, MemoryError> {
        let hits = self
            .store
            .search(vector.as_slice(), k, None)
            .await
            .map_err(MemoryError::Retrieval)?;

        debug!(requested = k, found = hits.len(), "Retrieved neighbors");
        hits.into_iter().map(to_neighbor).collect()
    }

    /// Up to k nearest cases carrying `label`, over-fetching `over_fetch_factor × k`
    /// candidates when the store cannot filter natively.
    pub async fn retrieve_labeled(
        &self,
        vector: &FeatureVector,
        label: &str,
        k: usize,
    ) -> Result<Vec<Neighbor>, MemoryError> {
        self.retrieve_labeled_within(vector, label, k, k.saturating_mul(self.over_fetch_factor))
            .await
    }

    /// Same as [`retrieve_labeled`](Self::retrieve_labeled) with an explicit
    /// candidate pool for the over-fetch path.
    pub async fn retrieve_labeled_within(
        &self,
        vector: &FeatureVector,
        label: &str,
        k: usize,
        candidates: usize,
    ) -> Result<Vec<Neighbor>, MemoryError> {
        let filter = SearchFilter::LabelContains(label.to_string());

        let hits = match self.filter_strategy() {
            FilterStrategy::Native => self
                .store
                .search(vector.as_slice(), k, Some(&filter))
                .await
                .map_err(MemoryError::Retrieval)?,
            FilterStrategy::OverFetch => {
                let mut hits = self
                    .store
                    .search(vector.as_slice(), candidates.max(k), None)
                    .await
                    .map_err(MemoryError::Retrieval)?;
                hits.retain(|hit| filter.matches(&hit.payload));
                hits.truncate(k);
                hits
            }
        };

        debug!(label, requested = k, found = hits.len(), "Retrieved labeled neighbors");
        hits.into_iter().map(to_neighbor).collect()
    }

    pub async fn get_stats(&self) -> Result<MemoryStats, MemoryError> {
        let total_cases = self.store.count().await.map_err(MemoryError::Retrieval)?;

        Ok(MemoryStats {
            total_cases,
            dimension: self.vectorizer.dimension(),
            filter_strategy: self.filter_strategy(),
        })
    }

    /// Bulk-load a history file. Returns the number of cases stored.
    ///
    /// The whole file is parsed, vectorized and encoded before the first write,
    /// so a malformed record or an embedding failure leaves memory untouched.
    /// A store failure part way through the batch cannot be rolled back and is
    /// reported as [`MemoryError::PartialLoad`] with the number of cases already
    /// committed.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize, MemoryError> {
        let path = path.as_ref();
        let cases = history_file::read_history(path)?;
        let loaded = self.load_cases(cases).await?;

        info!(path = %path.display(), loaded, "Loaded historical cases");
        Ok(loaded)
    }

    /// Bulk-insert already parsed cases. Records are always re-vectorized.
    /// Failure semantics as for [`load_from_file`](Self::load_from_file).
    pub async fn load_cases(&self, cases: Vec<Case>) -> Result<usize, MemoryError> {
        let mut prepared = Vec::with_capacity(cases.len());
        for mut case in cases {
            case.vector = None;
            prepared.push(prepare(self.ensure_vector(case).await?)?);
        }

        let _guard = self.write_lock.lock().await;
        for (written, case) in prepared.iter().enumerate() {
            if let Err(source) = self.write(case).await {
                if written == 0 {
                    return Err(MemoryError::Write(source));
                }
                warn!(written, total = prepared.len(), error = %source, "Bulk load interrupted, memory is partial");
                return Err(MemoryError::PartialLoad { written, source });
            }
        }
        Ok(prepared.len())
    }

    async fn ensure_vector(&self, mut case: Case) -> Result<Case, MemoryError> {
        if case.vector.is_none() {
            case.vector = Some(self.vectorizer.vectorize(&case.profile).await?);
        }
        Ok(case)
    }

    // Caller holds the write lock
    async fn write(&self, case: &PreparedCase) -> Result<(), StoreError> {
        self.store
            .upsert(case.id.as_str(), case.vector.as_slice(), case.payload.clone())
            .await?;

        debug!(case_id = %case.id, decision = %case.decision, "Stored case");
        Ok(())
    }
}

/// A case ready for the store: id assigned, vector detached, payload encoded.
struct PreparedCase {
    id: CaseId,
    decision: Decision,
    vector: FeatureVector,
    payload: Payload,
}

fn prepare(mut case: Case) -> Result<PreparedCase, MemoryError> {
    let id = case.id.get_or_insert_with(CaseId::generate).clone();
    let vector = case
        .vector
        .take()
        .ok_or_else(|| MemoryError::Encoding("case has no vector".to_string()))?;

    let payload = match serde_json::to_value(&case) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return Err(MemoryError::Encoding("case did not serialize to an object".to_string())),
        Err(e) => return Err(MemoryError::Encoding(e.to_string())),
    };

    Ok(PreparedCase {
        id,
        decision: case.decision,
        vector,
        payload,
    })
}

fn to_neighbor(hit: ScoredPayload) -> Result<Neighbor, MemoryError> {
    let case = decode_case(hit.payload)?;
    Ok(Neighbor::from_similarity(case, hit.similarity))
}

fn decode_case(payload: Payload) -> Result<Case, MemoryError> {
    serde_json::from_value(serde_json::Value::Object(payload))
        .map_err(|e| MemoryError::Retrieval(StoreError::InvalidPayload(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorizerConfig;
    use crate::domain::ApplicationProfile;
    use crate::infrastructure::in_memory_store::UnfilteredStore;
    use crate::infrastructure::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DownStore;

    #[async_trait]
    impl VectorStore for DownStore {
        async fn upsert(&self, _: &str, _: &[f32], _: Payload) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn search(&self, _: &[f32], _: usize, _: Option<&SearchFilter>) -> Result<Vec<ScoredPayload>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn dimension(&self) -> usize {
            9
        }

        fn supports_native_filter(&self) -> bool {
            true
        }
    }

    /// Accepts `limit` upserts, then reports the store as down.
    struct FailingAfter {
        inner: InMemoryVectorStore,
        limit: usize,
        upserts: AtomicUsize,
    }

    impl FailingAfter {
        fn new(limit: usize) -> Self {
            Self {
                inner: InMemoryVectorStore::new(9),
                limit,
                upserts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FailingAfter {
        async fn upsert(&self, id: &str, vector: &[f32], payload: Payload) -> Result<(), StoreError> {
            if self.upserts.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.upsert(id, vector, payload).await
        }

        async fn search(
            &self,
            vector: &[f32],
            k: usize,
            filter: Option<&SearchFilter>,
        ) -> Result<Vec<ScoredPayload>, StoreError> {
            self.inner.search(vector, k, filter).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }

        fn dimension(&self) -> usize {
            9
        }

        fn supports_native_filter(&self) -> bool {
            true
        }
    }

    fn vectorizer() -> Arc<FeatureVectorizer> {
        Arc::new(FeatureVectorizer::new(VectorizerConfig::default()))
    }

    fn memory() -> CaseMemory {
        CaseMemory::new(Arc::new(InMemoryVectorStore::new(9)), vectorizer(), 4).unwrap()
    }

    fn profile(income: f64, credit: &str) -> ApplicationProfile {
        ApplicationProfile::new(income, 2000.0, 4.0, 10000.0, 24.0, credit)
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let result = CaseMemory::new(Arc::new(InMemoryVectorStore::new(384)), vectorizer(), 4);
        assert!(matches!(result, Err(MemoryError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_add_case_generates_id() {
        let memory = memory();

        let id = memory.add_case(Case::new(profile(8000.0, "good"), Decision::Approve)).await.unwrap();
        let other = memory.add_case(Case::new(profile(8000.0, "good"), Decision::Approve)).await.unwrap();

        assert_ne!(id, other);
        assert_eq!(memory.get_stats().await.unwrap().total_cases, 2);
    }

    #[tokio::test]
    async fn test_neighbors_closest_first() {
        let memory = memory();
        memory
            .add_case(Case::new(profile(3000.0, "bad"), Decision::Decline).with_id("far"))
            .await
            .unwrap();
        memory
            .add_case(Case::new(profile(8000.0, "good"), Decision::Approve).with_id("near"))
            .await
            .unwrap();

        let query = memory.vectorizer().vectorize(&profile(8000.0, "good")).await.unwrap();
        let neighbors = memory.retrieve_neighbors(&query, 5).await.unwrap();

        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].case.id, Some(CaseId::from("near")));
        assert!(neighbors[0].distance < 1e-6);
        assert!(neighbors[0].distance <= neighbors[1].distance);
        assert!(neighbors.iter().all(|n| (0.0..=1.0).contains(&n.distance)));
        assert!(neighbors[0].case.vector.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_labeled_native_and_over_fetch_agree() {
        let native = memory();
        let unfiltered = CaseMemory::new(
            Arc::new(UnfilteredStore(InMemoryVectorStore::new(9))),
            vectorizer(),
            4,
        )
        .unwrap();
        assert_eq!(unfiltered.filter_strategy(), FilterStrategy::OverFetch);

        for memory in [&native, &unfiltered] {
            memory
                .add_case(Case::new(profile(8000.0, "good"), Decision::Approve).with_id("clean"))
                .await
                .unwrap();
            memory
                .add_case(
                    Case::new(profile(9000.0, "good"), Decision::Decline)
                        .with_id("fraud-1")
                        .with_label("fraud"),
                )
                .await
                .unwrap();
        }

        let query = native.vectorizer().vectorize(&profile(8000.0, "good")).await.unwrap();
        let a = native.retrieve_labeled(&query, "fraud", 1).await.unwrap();
        let b = unfiltered.retrieve_labeled(&query, "fraud", 1).await.unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(a[0].case.id, Some(CaseId::from("fraud-1")));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_retrieve_labeled_no_match() {
        let memory = memory();
        memory.add_case(Case::new(profile(8000.0, "good"), Decision::Approve)).await.unwrap();

        let query = memory.vectorizer().vectorize(&profile(8000.0, "good")).await.unwrap();
        assert!(memory.retrieve_labeled(&query, "fraud", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_empty_result() {
        let memory = CaseMemory::new(Arc::new(DownStore), vectorizer(), 4).unwrap();
        let query = memory.vectorizer().vectorize(&profile(8000.0, "good")).await.unwrap();

        assert!(matches!(memory.retrieve_neighbors(&query, 5).await, Err(MemoryError::Retrieval(_))));
        assert!(matches!(
            memory.add_case(Case::new(profile(1.0, "fair"), Decision::Decline)).await,
            Err(MemoryError::Write(_))
        ));
        assert!(matches!(memory.get_stats().await, Err(MemoryError::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_stats() {
        let memory = memory();
        let stats = memory.get_stats().await.unwrap();

        assert_eq!(stats.total_cases, 0);
        assert_eq!(stats.dimension, 9);
        assert_eq!(stats.filter_strategy, FilterStrategy::Native);
    }

    fn batch() -> Vec<Case> {
        (0..3)
            .map(|i| Case::new(profile(5000.0 + i as f64 * 1000.0, "fair"), Decision::Approve).with_id(i.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_interrupted_load_reports_committed_count() {
        let store = Arc::new(FailingAfter::new(1));
        let memory = CaseMemory::new(store.clone(), vectorizer(), 4).unwrap();

        let err = memory.load_cases(batch()).await.unwrap_err();

        assert!(matches!(
            err,
            MemoryError::PartialLoad {
                written: 1,
                source: StoreError::Unavailable(_)
            }
        ));
        assert_eq!(memory.get_stats().await.unwrap().total_cases, 1);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 2, "no writes after the failure");
    }

    #[tokio::test]
    async fn test_load_failing_on_first_write_stores_nothing() {
        let memory = CaseMemory::new(Arc::new(FailingAfter::new(0)), vectorizer(), 4).unwrap();

        let err = memory.load_cases(batch()).await.unwrap_err();

        assert!(matches!(err, MemoryError::Write(StoreError::Unavailable(_))));
        assert_eq!(memory.get_stats().await.unwrap().total_cases, 0);
    }
}
