// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Bardo Neural Computation
//!
//! ALL per-neuron computation in one place:
//! - **Activation**: output transfer functions (`tanh`, `sigmoid`, `relu`, ...)
//! - **Aggregation**: input-vector reduction (`dot_product`, `mult_product`, `diff_product`)
//! - **Plasticity**: weight-update rules (Hebbian family, Oja, neuromodulation, iterative)
//! - **Utilities**: saturation, vector statistics, random draws
//!
//! This crate is a leaf: it depends on nothing else in the workspace and its
//! kernels are pure functions over `f64` slices, so every layer above it
//! (genotype, mesh, population) shares the exact same arithmetic.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod activation;
pub mod aggregation;
pub mod plasticity;
pub mod random;
pub mod utils;

pub use activation::ActivationFunction;
pub use aggregation::AggregationFunction;
pub use plasticity::PlasticityFunction;
pub use utils::{saturate, WEIGHT_SAT_LIMIT};
