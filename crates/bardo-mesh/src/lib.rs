// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo Phenotype Mesh
//!
//! Instantiates a genotype as a concurrent graph of tasks: one thread per
//! neuron, sensor and actuator plus a cortex coordinator, all owned by an
//! exoself supervisor. Tasks communicate only through typed messages over
//! per-task mailboxes; the genotype store is never touched during a cycle.
//!
//! Startup is two-phase: every task is spawned idle and blocks until the
//! exoself resolves id references to concrete mailbox handles and delivers
//! its configuration. The cycle protocol is sense → propagate → act:
//! the cortex syncs sensors, signals ripple through the neurons (recurrent
//! links are primed with a default signal so cycle 1 never deadlocks), and
//! actuators report scape fitness back to the cortex.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod actuator;
pub mod cortex;
pub mod error;
pub mod exoself;
pub mod messages;
pub mod neuron;
pub mod scape;
pub mod sensor;
pub mod substrate;

pub use error::{MeshError, Result};
pub use exoself::{evaluate_agent, EvaluationOptions, MeshResult};
pub use scape::{EndFlag, Scape, ScapeHandle, ScapeProvider, ScapeRegistry, ScapeResponse};
