// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Failures raised by a vector store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Incompatible collection: {0}")]
    IncompatibleCollection(String),
}

/// Failures raised by a text embedding collaborator.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding service unreachable: {0}")]
    Network(String),
    #[error("Embedding provider error: {0}")]
    Provider(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Fatal wiring problem detected at initialization.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Evidence could not be obtained. Distinct from an empty neighbor set.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] StoreError),
    #[error("Failed to store case: {0}")]
    Write(#[source] StoreError),
    /// Bulk load stopped after `written` cases were committed; memory is partial.
    #[error("Bulk load interrupted after {written} cases were stored: {source}")]
    PartialLoad {
        written: usize,
        #[source]
        source: StoreError,
    },
    #[error("Vectorization failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Failed to encode case payload: {0}")]
    Encoding(String),
    #[error("Malformed history file: {0}")]
    MalformedHistory(String),
    #[error("Malformed historical record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error("Failed to read history file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
