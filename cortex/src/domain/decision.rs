// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Result shape handed back to callers (CLI, UI, chat layer).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::case::{CaseId, Decision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "APPROVE")]
    Approve,
    #[serde(rename = "DECLINE")]
    Decline,
    #[serde(rename = "MANUAL_REVIEW")]
    ManualReview,
    #[serde(rename = "DECLINE (Anomaly)")]
    DeclineAnomaly,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Decline => "DECLINE",
            Self::ManualReview => "MANUAL_REVIEW",
            Self::DeclineAnomaly => "DECLINE (Anomaly)",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one precedent in a [`DecisionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    pub id: CaseId,
    pub decision: Decision,
    pub distance: f64,
    pub match_reason: String,
}

/// Recommendation for one application. Built fresh per query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub anomalies: Vec<String>,
    pub explanation: String,
    pub similar_cases: Vec<SimilarCase>,
}
