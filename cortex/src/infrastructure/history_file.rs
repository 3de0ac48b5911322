// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reader for historical case files.
//!
//! The file is a JSON array of records:
//! `{"id": 17, "profile": {...}, "decision": "approve", "outcome": "repaid", "labels": ["fraud"]}`.
//! Integer ids are accepted and normalised to strings. Every record is parsed
//! before any is returned, so one bad record rejects the whole file.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{ApplicationProfile, Case, CaseId, Decision, MemoryError, Outcome};

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordId {
    Integer(i64),
    Text(String),
}

#[derive(Deserialize)]
struct HistoricalRecord {
    id: RecordId,
    profile: ApplicationProfile,
    decision: Decision,
    #[serde(default)]
    outcome: Option<Outcome>,
    #[serde(default)]
    labels: Option<Vec<String>>,
}

impl HistoricalRecord {
    fn into_case(self) -> Result<Case, String> {
        let id = match self.id {
            RecordId::Integer(n) => n.to_string(),
            RecordId::Text(s) if s.trim().is_empty() => return Err("empty id".to_string()),
            RecordId::Text(s) => s,
        };

        Ok(Case {
            id: Some(CaseId(id)),
            profile: self.profile,
            decision: self.decision,
            outcome: self.outcome,
            labels: self.labels.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
            recorded_at: None,
            vector: None,
        })
    }
}

/// Parse a history document held in memory.
pub fn parse_history(content: &str) -> Result<Vec<Case>, MemoryError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(content)
        .map_err(|e| MemoryError::MalformedHistory(format!("expected a JSON array of records: {}", e)))?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<HistoricalRecord>(value)
                .map_err(|e| e.to_string())
                .and_then(HistoricalRecord::into_case)
                .map_err(|reason| MemoryError::MalformedRecord { index, reason })
        })
        .collect()
}

/// Read and parse a history file.
pub fn read_history(path: impl AsRef<Path>) -> Result<Vec<Case>, MemoryError> {
    let content = std::fs::read_to_string(path)?;
    parse_history(&content)
}
