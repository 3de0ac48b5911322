// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Adjudicated cases held in memory, and the neighbors retrieval returns.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::ApplicationProfile;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    /// Fresh collision-resistant id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Decline => "decline",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed loan outcome, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "repaid")]
    Repaid,
    #[serde(rename = "default")]
    Defaulted,
}

/// Fixed-schema feature vector: six profile scalars followed by the
/// auxiliary text-embedding block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A historical, decided application.
///
/// The vector is derived once at insertion and never serialized into the
/// stored payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CaseId>,

    pub profile: ApplicationProfile,

    pub decision: Decision,

    #[serde(default)]
    pub outcome: Option<Outcome>,

    #[serde(default)]
    pub labels: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub vector: Option<FeatureVector>,
}

impl Case {
    pub fn new(profile: ApplicationProfile, decision: Decision) -> Self {
        Self {
            id: None,
            profile,
            decision,
            outcome: None,
            labels: BTreeSet::new(),
            recorded_at: None,
            vector: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<CaseId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Display id, `"?"` when the case was never assigned one.
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_ref().map(CaseId::as_str).unwrap_or("?")
    }
}

/// A retrieved case and its distance from the query, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub case: Case,
    pub distance: f64,
}

impl Neighbor {
    /// Build a neighbor from a native cosine similarity.
    pub fn from_similarity(case: Case, similarity: f64) -> Self {
        Self {
            case,
            distance: similarity_to_distance(similarity),
        }
    }
}

/// `clamp(1 - similarity, 0, 1)`. Assumes a cosine-based store metric.
pub fn similarity_to_distance(similarity: f64) -> f64 {
    (1.0 - similarity).clamp(0.0, 1.0)
}
