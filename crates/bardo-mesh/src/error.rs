// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mesh-layer error type.

use thiserror::Error;

use bardo_state::StateError;

#[derive(Debug, Error)]
pub enum MeshError {
    /// Store access failed while materializing or persisting a genotype
    #[error(transparent)]
    State(#[from] StateError),

    /// Evolution-layer failure during tuning selection
    #[error(transparent)]
    Evolution(#[from] bardo_evolution::EvolutionError),

    /// No scape registered under the requested name
    #[error("unknown scape: {0}")]
    UnknownScape(String),

    /// A task's mailbox disconnected mid-evaluation (task crash)
    #[error("mesh task failed: {0}")]
    TaskFailed(String),

    /// The scape never delivered a fitness reply
    #[error("missing fitness reply from scape `{0}`")]
    MissingFitness(String),
}

pub type Result<T> = std::result::Result<T, MeshError>;
