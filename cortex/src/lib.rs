// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credit Cortex
//!
//! Precedent-based credit decisions: applications are vectorized, compared
//! against adjudicated historical cases, screened for anomalies and scored by
//! a distance-weighted vote of their nearest neighbors.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Case memory and decision pipeline for loan applications

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod config;
pub mod logging;

pub use domain::*;
pub use application::*;
pub use config::CortexConfig;
