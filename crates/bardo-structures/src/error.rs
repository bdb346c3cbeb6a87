// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error type for data-structure level failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructuresError {
    /// Invalid parameters provided to a constructor or accessor
    #[error("Bad Parameters: {0}")]
    BadParameters(String),

    /// A structural invariant does not hold; this is an implementation bug
    #[error("Invariant Violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, StructuresError>;
