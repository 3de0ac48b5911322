// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DecisionEngine: Precedent-Weighted Recommendations
//!
//! Runs one query to completion: vectorize → retrieve → anomaly check →
//! weighted vote → explanation. Holds no state between queries; the only
//! write path is [`DecisionEngine::learn`].
//!
//! ## Scoring
//!
//! Each neighbor votes with weight `1 / (distance + ε)`. The approval score is
//! the approving share of total weight, `0` when there are no neighbors.
//!
//! ## Precedence
//!
//! 1. Any anomaly → `DECLINE (Anomaly)`, confidence 1.0
//! 2. score `>` approve threshold → `APPROVE`, confidence = score
//! 3. score `<` decline threshold → `DECLINE`, confidence = 1 − score
//! 4. otherwise → `MANUAL_REVIEW`, confidence 0.5

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::application::anomaly_detector::AnomalyDetector;
use crate::application::case_memory::CaseMemory;
use crate::application::vectorizer::FeatureVectorizer;
use crate::config::{CortexConfig, DecisionConfig, EmbeddingConfig, StoreConfig};
use crate::domain::{
    ApplicationProfile, Case, CaseId, Decision, DecisionError, DecisionResult, MemoryError, Neighbor, Outcome,
    Recommendation, SimilarCase,
};
use crate::infrastructure::{
    HashEmbedder, InMemoryVectorStore, OllamaEmbedder, QdrantVectorStore, TextEmbedder, VectorStore,
};

pub struct DecisionEngine {
    memory: Arc<CaseMemory>,
    anomaly_detector: AnomalyDetector,
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(memory: Arc<CaseMemory>, anomaly_detector: AnomalyDetector, config: DecisionConfig) -> Self {
        Self {
            memory,
            anomaly_detector,
            config,
        }
    }

    /// Wire embedder, store, memory and detector from configuration.
    /// Any wiring problem is fatal here rather than at query time.
    pub async fn from_config(config: &CortexConfig) -> Result<Self, DecisionError> {
        config
            .validate()
            .map_err(|e| MemoryError::Configuration(e.to_string()))?;

        let dimension = config.vectorizer.dimension();
        let embedding_dimension = config.vectorizer.embedding_dimension;

        let embedder: Option<Arc<dyn TextEmbedder>> = match &config.embedding {
            EmbeddingConfig::None => None,
            EmbeddingConfig::Hash => Some(Arc::new(HashEmbedder::new(embedding_dimension))),
            EmbeddingConfig::Ollama { endpoint, model } => Some(Arc::new(OllamaEmbedder::new(
                endpoint.clone(),
                model.clone(),
                embedding_dimension,
            ))),
        };

        let vectorizer = match embedder {
            Some(embedder) => FeatureVectorizer::with_embedder(config.vectorizer.clone(), embedder)
                .map_err(|e| MemoryError::Configuration(e.to_string()))?,
            None => FeatureVectorizer::new(config.vectorizer.clone()),
        };

        let store: Arc<dyn VectorStore> = match &config.memory.store {
            StoreConfig::InMemory => Arc::new(InMemoryVectorStore::new(dimension)),
            StoreConfig::Qdrant { url, collection } => {
                let store = QdrantVectorStore::new(url, collection, dimension)
                    .map_err(|e| MemoryError::Configuration(e.to_string()))?;
                store
                    .initialize()
                    .await
                    .map_err(|e| MemoryError::Configuration(e.to_string()))?;
                Arc::new(store)
            }
        };

        let memory = Arc::new(CaseMemory::new(store, Arc::new(vectorizer), config.memory.over_fetch_factor)?);
        let anomaly_detector = AnomalyDetector::new(memory.clone(), config.anomaly.clone());

        Ok(Self::new(memory, anomaly_detector, config.decision.clone()))
    }

    pub fn memory(&self) -> &Arc<CaseMemory> {
        &self.memory
    }

    pub async fn load_history(&self, path: impl AsRef<Path>) -> Result<usize, DecisionError> {
        Ok(self.memory.load_from_file(path).await?)
    }

    /// Full pipeline for one application.
    ///
    /// An empty memory yields a complete result; a store or embedding failure
    /// is returned as an error instead.
    pub async fn evaluate_application(&self, profile: &ApplicationProfile) -> Result<DecisionResult, DecisionError> {
        let vector = self
            .memory
            .vectorizer()
            .vectorize(profile)
            .await
            .map_err(MemoryError::from)?;

        let neighbors = self.memory.retrieve_neighbors(&vector, self.config.neighbors).await?;
        let anomalies = self.anomaly_detector.analyze(profile, &vector, &neighbors).await?;

        let approval_score = self.approval_score(&neighbors);
        let (recommendation, confidence) = self.recommend(approval_score, &anomalies);
        let explanation = Self::explain(&neighbors, &anomalies);

        let similar_cases = neighbors
            .iter()
            .map(|neighbor| SimilarCase {
                id: neighbor.case.id.clone().unwrap_or_else(|| CaseId::from("Unknown")),
                decision: neighbor.case.decision,
                distance: round_to(neighbor.distance, 3),
                match_reason: self.match_reason(profile, &neighbor.case.profile),
            })
            .collect();

        info!(
            recommendation = %recommendation,
            approval_score,
            confidence,
            neighbors = neighbors.len(),
            anomalies = anomalies.len(),
            "Evaluated application"
        );

        Ok(DecisionResult {
            recommendation,
            confidence: round_to(confidence, 2),
            anomalies,
            explanation,
            similar_cases,
        })
    }

    /// Distance-weighted share of approving precedents, in [0, 1].
    pub fn approval_score(&self, neighbors: &[Neighbor]) -> f64 {
        let mut total_weight = 0.0;
        let mut approve_weight = 0.0;

        for neighbor in neighbors {
            let weight = 1.0 / (neighbor.distance + self.config.epsilon);
            total_weight += weight;
            if neighbor.case.decision == Decision::Approve {
                approve_weight += weight;
            }
        }

        if total_weight > 0.0 {
            approve_weight / total_weight
        } else {
            0.0
        }
    }

    /// Apply the precedence rules. Returns the unrounded confidence.
    pub fn recommend(&self, approval_score: f64, anomalies: &[String]) -> (Recommendation, f64) {
        if !anomalies.is_empty() {
            (Recommendation::DeclineAnomaly, 1.0)
        } else if approval_score > self.config.approve_above {
            (Recommendation::Approve, approval_score)
        } else if approval_score < self.config.decline_below {
            (Recommendation::Decline, 1.0 - approval_score)
        } else {
            (Recommendation::ManualReview, 0.5)
        }
    }

    pub fn explain(neighbors: &[Neighbor], anomalies: &[String]) -> String {
        if !anomalies.is_empty() {
            return format!("Flagged due to anomalies: {}", anomalies.join(", "));
        }

        let Some(closest) = neighbors.first() else {
            return "No historical precedents found.".to_string();
        };

        let approved = neighbors
            .iter()
            .filter(|n| n.case.decision == Decision::Approve)
            .count();

        format!(
            "Based on {} similar past cases ({} approved). Most similar case was {}.",
            neighbors.len(),
            approved,
            closest.case.decision
        )
    }

    /// Why a precedent resembles the query, in terms a reviewer can check.
    pub fn match_reason(&self, query: &ApplicationProfile, precedent: &ApplicationProfile) -> String {
        let mut reasons = Vec::new();

        if (query.income - precedent.income).abs() < self.config.similar_income_delta {
            reasons.push("Similar Income");
        }
        if query.credit_history == precedent.credit_history {
            reasons.push("Same Credit Profile");
        }

        if reasons.is_empty() {
            "General vector proximity".to_string()
        } else {
            reasons.join(", ")
        }
    }

    /// Record an adjudicated application as a new case.
    ///
    /// Every call appends; nothing already stored is updated.
    pub async fn learn(
        &self,
        profile: ApplicationProfile,
        final_decision: Decision,
        actual_outcome: Option<Outcome>,
    ) -> Result<CaseId, DecisionError> {
        let mut case = Case::new(profile, final_decision).with_id(CaseId::generate());
        case.outcome = actual_outcome;
        case.recorded_at = Some(Utc::now());

        let id = self.memory.add_case(case).await?;

        info!(case_id = %id, decision = %final_decision, outcome = ?actual_outcome, "Learned case");
        Ok(id)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CortexConfig;

    async fn engine() -> DecisionEngine {
        DecisionEngine::from_config(&CortexConfig::default()).await.unwrap()
    }

    fn neighbor(decision: Decision, distance: f64) -> Neighbor {
        Neighbor {
            case: Case::new(ApplicationProfile::default(), decision).with_id("n"),
            distance,
        }
    }

    #[tokio::test]
    async fn test_approval_score_is_distance_weighted() {
        let engine = engine().await;

        assert_eq!(engine.approval_score(&[]), 0.0);

        // One close approval outweighs two distant declines
        let neighbors = [
            neighbor(Decision::Approve, 0.0),
            neighbor(Decision::Decline, 0.5),
            neighbor(Decision::Decline, 0.5),
        ];
        let score = engine.approval_score(&neighbors);
        let expected = 20.0 / (20.0 + 2.0 / 0.55);
        assert!((score - expected).abs() < 1e-9);
        assert!(score > 0.6);
    }

    #[tokio::test]
    async fn test_threshold_boundaries() {
        let engine = engine().await;

        assert_eq!(engine.recommend(0.6, &[]), (Recommendation::ManualReview, 0.5));
        assert_eq!(engine.recommend(0.4, &[]), (Recommendation::ManualReview, 0.5));
        assert_eq!(engine.recommend(0.61, &[]), (Recommendation::Approve, 0.61));

        let (recommendation, confidence) = engine.recommend(0.1, &[]);
        assert_eq!(recommendation, Recommendation::Decline);
        assert!((confidence - 0.9).abs() < 1e-12);

        assert_eq!(engine.recommend(0.0, &[]), (Recommendation::Decline, 1.0));
    }

    #[tokio::test]
    async fn test_anomalies_override_vote() {
        let engine = engine().await;
        let anomalies = vec!["Negative Income".to_string()];

        assert_eq!(engine.recommend(1.0, &anomalies), (Recommendation::DeclineAnomaly, 1.0));
        assert_eq!(engine.recommend(0.5, &anomalies), (Recommendation::DeclineAnomaly, 1.0));
    }

    #[test]
    fn test_explanations() {
        assert_eq!(DecisionEngine::explain(&[], &[]), "No historical precedents found.");

        let anomalies = vec!["Negative Income".to_string(), "Suspicious Employment Length".to_string()];
        assert_eq!(
            DecisionEngine::explain(&[neighbor(Decision::Approve, 0.0)], &anomalies),
            "Flagged due to anomalies: Negative Income, Suspicious Employment Length"
        );

        let neighbors = [
            neighbor(Decision::Decline, 0.1),
            neighbor(Decision::Approve, 0.2),
            neighbor(Decision::Approve, 0.3),
        ];
        assert_eq!(
            DecisionEngine::explain(&neighbors, &[]),
            "Based on 3 similar past cases (2 approved). Most similar case was decline."
        );
    }

    #[tokio::test]
    async fn test_match_reasons() {
        let engine = engine().await;
        let query = ApplicationProfile::new(5000.0, 0.0, 0.0, 0.0, 0.0, "good");

        let both = ApplicationProfile::new(5999.0, 100.0, 1.0, 1.0, 1.0, "good");
        assert_eq!(engine.match_reason(&query, &both), "Similar Income, Same Credit Profile");

        let credit_only = ApplicationProfile::new(6000.0, 0.0, 0.0, 0.0, 0.0, "good");
        assert_eq!(engine.match_reason(&query, &credit_only), "Same Credit Profile");

        let income_only = ApplicationProfile::new(4500.0, 0.0, 0.0, 0.0, 0.0, "fair");
        assert_eq!(engine.match_reason(&query, &income_only), "Similar Income");

        let neither = ApplicationProfile::new(20000.0, 0.0, 0.0, 0.0, 0.0, "bad");
        assert_eq!(engine.match_reason(&query, &neither), "General vector proximity");
    }

    #[tokio::test]
    async fn test_learn_appends() {
        let engine = engine().await;
        let profile = ApplicationProfile::new(5000.0, 4000.0, 2.0, 5000.0, 12.0, "fair");

        let first = engine.learn(profile.clone(), Decision::Approve, Some(Outcome::Repaid)).await.unwrap();
        let second = engine.learn(profile, Decision::Approve, Some(Outcome::Repaid)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(engine.memory().get_stats().await.unwrap().total_cases, 2);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(0.8333333, 2), 0.83);
        assert_eq!(round_to(0.0004, 3), 0.0);
        assert_eq!(round_to(1.0, 2), 1.0);
    }
}
