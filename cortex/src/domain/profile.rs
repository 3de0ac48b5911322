// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Loan application profile as submitted by a caller or stored with a case.

use serde::{Deserialize, Serialize};

/// Categorical credit history grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditHistory {
    Bad,
    Poor,
    #[default]
    Fair,
    Good,
    Excellent,
}

impl CreditHistory {
    /// Parse a raw grade. Matching is exact, as stored grades are compared verbatim.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "bad" => Some(Self::Bad),
            "poor" => Some(Self::Poor),
            "fair" => Some(Self::Fair),
            "good" => Some(Self::Good),
            "excellent" => Some(Self::Excellent),
            _ => None,
        }
    }

    /// Fixed scalar used in the feature vector.
    pub fn score(self) -> f32 {
        match self {
            Self::Bad => 0.0,
            Self::Poor => 0.2,
            Self::Fair => 0.5,
            Self::Good => 0.8,
            Self::Excellent => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bad => "bad",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Application profile.
///
/// Missing numeric fields deserialize to 0. `credit_history` is kept as the raw
/// string so that unrecognised grades survive storage and can be reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationProfile {
    #[serde(default)]
    pub income: f64,

    #[serde(default)]
    pub expenses: f64,

    /// Years in current employment
    #[serde(default)]
    pub employment_length: f64,

    #[serde(default)]
    pub loan_amount: f64,

    /// Months
    #[serde(default)]
    pub loan_term: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_history: Option<String>,

    /// Free text fed to the embedding collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApplicationProfile {
    pub fn new(
        income: f64,
        expenses: f64,
        employment_length: f64,
        loan_amount: f64,
        loan_term: f64,
        credit_history: &str,
    ) -> Self {
        Self {
            income,
            expenses,
            employment_length,
            loan_amount,
            loan_term,
            credit_history: Some(credit_history.to_string()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolved grade. `None` when a value is present but unrecognised;
    /// an absent value resolves to the default grade.
    pub fn credit_grade(&self) -> Option<CreditHistory> {
        match self.credit_history.as_deref() {
            None => Some(CreditHistory::default()),
            Some(raw) => CreditHistory::parse(raw),
        }
    }

    /// Description text, if it carries anything worth embedding.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_zero() {
        let profile: ApplicationProfile =
            serde_json::from_str(r#"{"income": 5000, "credit_history": "good"}"#).unwrap();

        assert_eq!(profile.income, 5000.0);
        assert_eq!(profile.expenses, 0.0);
        assert_eq!(profile.loan_term, 0.0);
        assert_eq!(profile.credit_grade(), Some(CreditHistory::Good));
    }

    #[test]
    fn test_credit_grade_resolution() {
        let mut profile = ApplicationProfile::default();
        assert_eq!(profile.credit_grade(), Some(CreditHistory::Fair));

        profile.credit_history = Some("platinum".to_string());
        assert_eq!(profile.credit_grade(), None);

        profile.credit_history = Some("Good".to_string());
        assert_eq!(profile.credit_grade(), None, "grades are case-sensitive");
    }

    #[test]
    fn test_blank_description_is_ignored() {
        let profile = ApplicationProfile::default().with_description("   ");
        assert!(profile.description_text().is_none());

        let profile = ApplicationProfile::default().with_description(" car loan ");
        assert_eq!(profile.description_text(), Some("car loan"));
    }
}
