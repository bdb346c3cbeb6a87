// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo Population Services
//!
//! The evolutionary controller: species-scoped populations, hall-of-fame
//! retention with Pareto-aware domination, selection algorithms, per-window
//! statistics, and the generational / steady-state loops, exposed through a
//! small run-control surface.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod controller;
pub mod error;
pub mod hof;
pub mod selection;
pub mod stats;

pub use controller::{Experiment, RunContext, RunReport};
pub use error::{PopulationError, Result};
pub use hof::{champion_of, update_hof, HofOutcome};
pub use selection::assemble_next_generation;
