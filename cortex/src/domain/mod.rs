// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain types for the credit decision memory.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Profiles, cases, neighbors, results and error types

pub mod profile;
pub mod case;
pub mod decision;
pub mod error;

pub use profile::*;
pub use case::*;
pub use decision::*;
pub use error::*;
