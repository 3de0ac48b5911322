// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: vector store and embedding adapters, history files

pub mod repository;
pub mod in_memory_store;
pub mod qdrant_repository;
pub mod embedding_client;
pub mod history_file;

pub use repository::{Payload, ScoredPayload, SearchFilter, VectorStore};
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_repository::QdrantVectorStore;
pub use embedding_client::{HashEmbedder, OllamaEmbedder, TextEmbedder};
