// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Evolution-layer error type.

use thiserror::Error;

use bardo_state::StateError;

#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Store access failed
    #[error(transparent)]
    State(#[from] StateError),

    /// No morphology registered under the requested name
    #[error("unknown morphology: {0}")]
    UnknownMorphology(String),

    /// A morphology returned an unusable adapter set
    #[error("bad morphology `{0}`: {1}")]
    BadMorphology(String, String),

    /// The mutation engine could not apply a single operator
    #[error("mutation stalled for agent {0}")]
    MutationStalled(String),

    /// A structural invariant broke mid-mutation; implementation bug
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, EvolutionError>;
