// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Anomaly detection over a single application.
//!
//! Three independent checks, always all run, results concatenated in order:
//! hard business rules, nearest-neighbor outlier distance, and proximity to
//! a case labeled as fraud.

use std::sync::Arc;

use tracing::warn;

use crate::application::case_memory::CaseMemory;
use crate::config::AnomalyConfig;
use crate::domain::{ApplicationProfile, FeatureVector, MemoryError, Neighbor};

/// Structural validity rule evaluated without consulting memory.
pub trait ProfileRule: Send + Sync {
    /// Human-readable violation, or `None` when the profile passes
    fn check(&self, profile: &ApplicationProfile) -> Option<String>;
}

pub struct NegativeIncome;

impl ProfileRule for NegativeIncome {
    fn check(&self, profile: &ApplicationProfile) -> Option<String> {
        (profile.income < 0.0).then(|| "Negative Income".to_string())
    }
}

pub struct EmploymentLengthCeiling {
    pub max_years: f64,
}

impl ProfileRule for EmploymentLengthCeiling {
    fn check(&self, profile: &ApplicationProfile) -> Option<String> {
        (profile.employment_length > self.max_years).then(|| "Suspicious Employment Length".to_string())
    }
}

pub struct AnomalyDetector {
    memory: Arc<CaseMemory>,
    config: AnomalyConfig,
    rules: Vec<Box<dyn ProfileRule>>,
}

impl AnomalyDetector {
    /// Detector with the built-in rule set
    pub fn new(memory: Arc<CaseMemory>, config: AnomalyConfig) -> Self {
        let rules: Vec<Box<dyn ProfileRule>> = vec![
            Box::new(NegativeIncome),
            Box::new(EmploymentLengthCeiling {
                max_years: config.max_employment_length,
            }),
        ];

        Self { memory, config, rules }
    }

    /// Append a rule; rules report in registration order.
    pub fn with_rule(mut self, rule: impl ProfileRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn check_hard_rules(&self, profile: &ApplicationProfile) -> Vec<String> {
        self.rules.iter().filter_map(|rule| rule.check(profile)).collect()
    }

    /// Only the single nearest neighbor matters; an empty set raises nothing.
    pub fn detect_outliers(&self, neighbors: &[Neighbor]) -> Vec<String> {
        match neighbors.first() {
            Some(nearest) if nearest.distance > self.config.outlier_distance => {
                vec![format!("High Dissimilarity (Nearest Dist: {:.2})", nearest.distance)]
            }
            _ => Vec::new(),
        }
    }

    pub async fn check_fraud_similarity(&self, vector: &FeatureVector) -> Result<Vec<String>, MemoryError> {
        let fraud_neighbors = self
            .memory
            .retrieve_labeled_within(
                vector,
                &self.config.fraud_label,
                self.config.fraud_neighbors,
                self.config.fraud_search_width,
            )
            .await?;

        Ok(fraud_neighbors
            .first()
            .filter(|closest| closest.distance < self.config.fraud_distance)
            .map(|closest| {
                vec![format!(
                    "Matches Known Fraud Pattern (Case #{}, Dist: {:.2})",
                    closest.case.id_or_unknown(),
                    closest.distance
                )]
            })
            .unwrap_or_default())
    }

    /// Ordered anomaly descriptions; empty means none found.
    pub async fn analyze(
        &self,
        profile: &ApplicationProfile,
        vector: &FeatureVector,
        neighbors: &[Neighbor],
    ) -> Result<Vec<String>, MemoryError> {
        let mut anomalies = self.check_hard_rules(profile);
        anomalies.extend(self.detect_outliers(neighbors));
        anomalies.extend(self.check_fraud_similarity(vector).await?);

        if !anomalies.is_empty() {
            warn!(count = anomalies.len(), anomalies = ?anomalies, "Anomalies detected");
        }

        Ok(anomalies)
    }
}
