// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo State Management
//!
//! The only shared state of a run:
//! - [`Store`]: the typed genotype key/value store (one table per entity
//!   kind, many concurrent readers, serialized writers),
//! - bookkeeping registries (`active_agents`, `population_status`,
//!   per-specie evaluation counters),
//! - whole-store snapshot/restore.
//!
//! The mesh never touches the store during an evaluation cycle; only the
//! exoself and the population controller read and write it, outside the hot
//! path.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod persistence;
pub mod registry;
pub mod store;

pub use error::{Result, StateError};
pub use persistence::StoreSnapshot;
pub use registry::{ActiveAgentRegistry, EvaluationCounters, PopulationStatusCell};
pub use store::{AgentGraph, Store};
