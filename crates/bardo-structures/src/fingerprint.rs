// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structural fingerprints.
//!
//! A fingerprint is the genotype with every unique id stripped, leaving only
//! structure: layer histogram, generalized evolutionary history, generalized
//! adapters and a topology summary. Two agents are species-equivalent
//! exactly when their fingerprints are equal, so the type derives full
//! structural equality and hashing.

use serde::{Deserialize, Serialize};

use bardo_neural::ActivationFunction;

use crate::constraint::{EncodingType, MutationOperator};
use crate::genotype::SignalFormat;
use crate::ids::LayerIndex;

/// Element kind, used where an id has been generalized away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Bias,
    Neuron,
    Sensor,
    Actuator,
    Cortex,
}

/// Evo-history entry with ids reduced to `(kind, layer)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneralizedEvoHistEntry {
    pub operator: MutationOperator,
    pub elements: Vec<(ElementKind, Option<LayerIndex>)>,
}

/// Sensor record with identity, fanout and generation nulled out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneralizedSensor {
    pub name: String,
    pub vl: usize,
    pub format: SignalFormat,
}

/// Actuator record with identity, fanin and generation nulled out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneralizedActuator {
    pub name: String,
    pub vl: usize,
    pub format: SignalFormat,
}

/// Aggregate connectivity counts of one genotype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TopologySummary {
    pub encoding: Option<EncodingType>,
    pub tot_neurons: usize,
    pub tot_n_ils: usize,
    pub tot_n_ols: usize,
    pub tot_n_ros: usize,
    /// Activation-function histogram, sorted by tag for stable equality.
    pub af_distribution: Vec<(ActivationFunction, usize)>,
}

/// The full structural fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Fingerprint {
    /// `(layer, neuron count)` per occupied layer, sorted by layer.
    pub generalized_pattern: Vec<(LayerIndex, usize)>,
    pub generalized_evo_hist: Vec<GeneralizedEvoHistEntry>,
    pub generalized_sensors: Vec<GeneralizedSensor>,
    pub generalized_actuators: Vec<GeneralizedActuator>,
    pub topology: TopologySummary,
}
