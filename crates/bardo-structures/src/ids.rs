// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Identity types for every entity kind.
//!
//! An id pairs a layer coordinate with a random unique part drawn from a
//! non-cryptographic RNG (`u64`, far more than 1e12 distinct values).
//! Sensors sit at layer −1, actuators at +1 and neurons in `[0, 1)`, so
//! ordering on [`LayerIndex`] defines the feed-forward partial order of the
//! whole network. Ids of kinds without a meaningful coordinate (agents,
//! cortices, ...) carry only the unique part.

use core::fmt;

use serde::{Deserialize, Serialize};

use bardo_neural::random::random_u64;

/// Layer coordinate with total ordering and bit-pattern equality/hashing,
/// so it can key maps and appear inside ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerIndex(f64);

impl LayerIndex {
    /// Sensors live in front of every neuron.
    pub const SENSOR: LayerIndex = LayerIndex(-1.0);
    /// Actuators live behind every neuron.
    pub const ACTUATOR: LayerIndex = LayerIndex(1.0);

    pub fn new(value: f64) -> Self {
        LayerIndex(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Midpoint between two coordinates (used when inserting a spliced
    /// neuron between two existing layers).
    pub fn midpoint(a: LayerIndex, b: LayerIndex) -> LayerIndex {
        LayerIndex((a.0 + b.0) / 2.0)
    }
}

impl PartialEq for LayerIndex {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for LayerIndex {}

impl PartialOrd for LayerIndex {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LayerIndex {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl core::hash::Hash for LayerIndex {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for LayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! plain_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Allocate a fresh id from the thread-local RNG.
            pub fn generate() -> Self {
                $name(random_u64())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

plain_id!(
    /// Population id (one active population per run)
    PopulationId,
    "Population"
);
plain_id!(
    /// Specie id
    SpecieId,
    "Specie"
);
plain_id!(
    /// Agent id (one individual in the population)
    AgentId,
    "Agent"
);
plain_id!(
    /// Cortex id (the coordinator owned by one agent)
    CortexId,
    "Cortex"
);
plain_id!(
    /// Substrate id (only for substrate-encoded agents)
    SubstrateId,
    "Substrate"
);
plain_id!(
    /// Sensor id; sensors always sit at layer −1
    SensorId,
    "Sensor"
);
plain_id!(
    /// Actuator id; actuators always sit at layer +1
    ActuatorId,
    "Actuator"
);

impl SensorId {
    pub fn layer(&self) -> LayerIndex {
        LayerIndex::SENSOR
    }
}

impl ActuatorId {
    pub fn layer(&self) -> LayerIndex {
        LayerIndex::ACTUATOR
    }
}

/// Neuron id: the layer coordinate is part of the identity so recurrence
/// decisions never need a store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeuronId {
    pub layer: LayerIndex,
    pub unique: u64,
}

impl NeuronId {
    pub fn generate(layer: LayerIndex) -> Self {
        NeuronId {
            layer,
            unique: random_u64(),
        }
    }

    pub fn layer(&self) -> LayerIndex {
        self.layer
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Neuron({}:{})", self.layer, self.unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_ordering() {
        assert!(LayerIndex::SENSOR < LayerIndex::new(0.0));
        assert!(LayerIndex::new(0.5) < LayerIndex::ACTUATOR);
        assert!(LayerIndex::new(0.25) < LayerIndex::new(0.5));
    }

    #[test]
    fn test_layer_midpoint() {
        let mid = LayerIndex::midpoint(LayerIndex::new(0.0), LayerIndex::new(0.5));
        assert_eq!(mid, LayerIndex::new(0.25));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = AgentId::generate();
        let b = AgentId::generate();
        assert_ne!(a, b);

        let n1 = NeuronId::generate(LayerIndex::new(0.5));
        let n2 = NeuronId::generate(LayerIndex::new(0.5));
        assert_ne!(n1, n2);
        assert_eq!(n1.layer(), n2.layer());
    }

    #[test]
    fn test_layer_hash_matches_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(LayerIndex::new(0.5));
        assert!(set.contains(&LayerIndex::new(0.5)));
        assert!(!set.contains(&LayerIndex::new(0.25)));
    }
}
