// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! State-layer error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// A read named an id the store does not hold
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert collided with an existing id
    #[error("already present: {0}")]
    AlreadyPresent(String),

    /// A cross-entity reference does not resolve; implementation bug
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Snapshot serialization / deserialization failure
    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Invalid lifecycle transition on the population status record
    #[error("invalid op-tag transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, StateError>;
