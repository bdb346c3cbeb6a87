// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo Core Data Structures
//!
//! Typed identifiers and the entity records the whole engine is built on:
//! agents, cortices, neurons, sensors, actuators, substrates, species,
//! populations, plus the constraint palettes and experiment configuration.
//!
//! Entities are immutable snapshots: the store layer replaces whole records
//! on update, and every cross-entity reference is a typed id, never an
//! owning pointer.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod constraint;
pub mod error;
pub mod fingerprint;
pub mod genotype;
pub mod ids;
pub mod population;

pub use config::{ExperimentConfig, Limit, OpMode};
pub use constraint::{
    Constraint, EncodingType, Heredity, Linkform, MutationOperator, PerturbationQty,
    StrategyMutator, SubstratePlasticity, TotTopologicalMutations, TuningDuration,
    TuningSelection,
};
pub use error::{Result, StructuresError};
pub use fingerprint::{
    ElementKind, Fingerprint, GeneralizedActuator, GeneralizedEvoHistEntry, GeneralizedSensor,
    TopologySummary,
};
pub use genotype::{
    Actuator, Agent, Cortex, ElementRef, EvoHistEntry, InputLink, Neuron, ScapeRef, Sensor,
    SignalFormat, SignalSource, SignalTarget, Substrate, SynapticWeight,
};
pub use ids::{
    ActuatorId, AgentId, CortexId, LayerIndex, NeuronId, PopulationId, SensorId, SpecieId,
    SubstrateId,
};
pub use population::{
    distinct_fingerprints, Champion, Distinguisher, EvoAlg, FitnessStats, InnovationFactor, OpTag,
    Population, PopulationStatus, SelectionAlgorithm, Specie, SpecieStat, Trace,
};
