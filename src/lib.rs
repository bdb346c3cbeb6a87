// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo
//!
//! A Topology and Weight Evolving Artificial Neural Network (TWEANN)
//! engine. Bardo evolves both the structure and the parameters of directed
//! neural graphs through generational or steady-state search, then executes
//! the evolved graphs as meshes of cooperating tasks that sense an
//! environment, think, and act.
//!
//! This umbrella crate re-exports the workspace components:
//! - [`neural`]: activation, aggregation and plasticity kernels
//! - [`structures`]: ids, genotype records, constraints, configuration
//! - [`state`]: the genotype store, registries and snapshots
//! - [`evolution`]: genotype construction, cloning, mutation, tuning
//! - [`mesh`]: the phenotype execution mesh
//! - [`population`]: the evolutionary controller and run surface
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bardo::prelude::*;
//!
//! # struct MyMorphology;
//! # impl bardo::evolution::Morphology for MyMorphology {
//! #     fn sensors(&self) -> Vec<bardo::evolution::SensorSpec> { vec![] }
//! #     fn actuators(&self) -> Vec<bardo::evolution::ActuatorSpec> { vec![] }
//! # }
//! let store = Arc::new(Store::new());
//! let morphologies = MorphologyRegistry::new();
//! morphologies.register("my_morphology", Arc::new(MyMorphology));
//! let scapes = ScapeRegistry::new();
//!
//! let experiment = Experiment::start(RunContext {
//!     store,
//!     morphologies,
//!     scapes,
//!     config: ExperimentConfig::default(),
//!     constraints: vec![Constraint::for_morphology("my_morphology")],
//! });
//! let report = experiment.wait().unwrap();
//! println!("best fitness: {:?}", report.best_fitness);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use bardo_evolution as evolution;
pub use bardo_mesh as mesh;
pub use bardo_neural as neural;
pub use bardo_population as population;
pub use bardo_state as state;
pub use bardo_structures as structures;

pub mod logging;

/// The names most embeddings need.
pub mod prelude {
    pub use bardo_evolution::{Morphology, MorphologyRegistry};
    pub use bardo_mesh::{EndFlag, Scape, ScapeRegistry, ScapeResponse};
    pub use bardo_population::{Experiment, RunContext, RunReport};
    pub use bardo_state::Store;
    pub use bardo_structures::{Constraint, EvoAlg, ExperimentConfig, Limit, SelectionAlgorithm};
}
