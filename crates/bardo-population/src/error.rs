// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Population-layer error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PopulationError {
    #[error(transparent)]
    State(#[from] bardo_state::StateError),

    #[error(transparent)]
    Evolution(#[from] bardo_evolution::EvolutionError),

    #[error(transparent)]
    Mesh(#[from] bardo_mesh::MeshError),

    /// Repeated evaluation failures exhausted the restart budget
    #[error("run supervision gave up: {0}")]
    SupervisionExhausted(String),

    /// The controller thread ended without a report
    #[error("controller terminated abnormally")]
    ControllerLost,
}

pub type Result<T> = std::result::Result<T, PopulationError>;
