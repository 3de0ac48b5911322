// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: vectorization, case memory, anomaly checks and the
//! decision pipeline built on top of them.

pub mod vectorizer;
pub mod case_memory;
pub mod anomaly_detector;
pub mod decision_engine;

pub use vectorizer::{FeatureVectorizer, PROFILE_FEATURES};
pub use case_memory::{CaseMemory, FilterStrategy, MemoryStats};
pub use anomaly_detector::{AnomalyDetector, EmploymentLengthCeiling, NegativeIncome, ProfileRule};
pub use decision_engine::DecisionEngine;
