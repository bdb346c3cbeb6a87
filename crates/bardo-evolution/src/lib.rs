// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo Evolution
//!
//! Genotype operations: seed construction from a morphology, agent cloning
//! with id remapping, the mutation-operator engine, structural fingerprints
//! and the tuning-phase selection/duration functions.
//!
//! Everything here works through the store: operators read entities, edit
//! them, and write whole records back. The phenotype mesh never runs while
//! its genotype is being mutated.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clone;
pub mod error;
pub mod fingerprint;
pub mod genotype;
pub mod linker;
pub mod morphology;
pub mod mutation;
pub mod tuning;

pub use clone::clone_agent;
pub use error::{EvolutionError, Result};
pub use fingerprint::{compute_fingerprint, update_fingerprint};
pub use genotype::construct_agent;
pub use morphology::{ActuatorSpec, Morphology, MorphologyRegistry, SensorSpec};
pub use mutation::{mutate_agent, MutationOutcome};
pub use tuning::{select_for_tuning, tuning_budget};
