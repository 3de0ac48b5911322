// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Feature vectorizer.
//!
//! Layout: `[income, expenses, employment_length, loan_amount, loan_term,
//! credit_history, embedding_0 .. embedding_{E-1}]`. The layout and width must
//! stay fixed for the lifetime of a memory.

use std::sync::Arc;

use tracing::warn;

use crate::config::VectorizerConfig;
use crate::domain::{ApplicationProfile, CreditHistory, EmbeddingError, FeatureVector};
use crate::infrastructure::TextEmbedder;

/// Profile-derived scalars ahead of the embedding block
pub const PROFILE_FEATURES: usize = 6;

pub struct FeatureVectorizer {
    config: VectorizerConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
}

impl FeatureVectorizer {
    /// Vectorizer whose embedding block is always zero-filled.
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Vectorizer that embeds profile descriptions.
    /// Fails when the embedder width differs from the configured block width.
    pub fn with_embedder(
        config: VectorizerConfig,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self, EmbeddingError> {
        if embedder.dimension() != config.embedding_dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: config.embedding_dimension,
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            config,
            embedder: Some(embedder),
        })
    }

    /// Output vector length
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    /// Deterministic numeric and categorical part of the vector.
    pub fn profile_features(&self, profile: &ApplicationProfile) -> [f32; PROFILE_FEATURES] {
        let c = &self.config;
        [
            normalize(profile.income, c.income_ceiling),
            normalize(profile.expenses, c.expenses_ceiling),
            normalize(profile.employment_length, c.employment_length_ceiling),
            normalize(profile.loan_amount, c.loan_amount_ceiling),
            normalize(profile.loan_term, c.loan_term_ceiling),
            credit_score(profile),
        ]
    }

    /// Full feature vector. Calls the embedder at most once, and only when
    /// the profile carries a non-blank description.
    pub async fn vectorize(&self, profile: &ApplicationProfile) -> Result<FeatureVector, EmbeddingError> {
        let mut values = Vec::with_capacity(self.dimension());
        values.extend_from_slice(&self.profile_features(profile));

        match (profile.description_text(), &self.embedder) {
            (Some(text), Some(embedder)) => {
                let block = embedder.embed(text).await?;
                if block.len() != self.config.embedding_dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.embedding_dimension,
                        actual: block.len(),
                    });
                }
                values.extend(block);
            }
            _ => values.resize(self.dimension(), 0.0),
        }

        Ok(FeatureVector::new(values))
    }
}

fn normalize(value: f64, ceiling: f64) -> f32 {
    (value / ceiling).clamp(0.0, 1.0) as f32
}

fn credit_score(profile: &ApplicationProfile) -> f32 {
    match profile.credit_grade() {
        Some(grade) => grade.score(),
        None => {
            warn!(
                value = profile.credit_history.as_deref().unwrap_or_default(),
                "Unrecognised credit_history value, using neutral score"
            );
            CreditHistory::default().score()
        }
    }
}
