// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Whole-store snapshots.
//!
//! A snapshot captures every table plus the population trace in one atomic
//! read (table locks are taken while dumping), serialized with `bincode`.

use serde::{Deserialize, Serialize};

use bardo_structures::{
    Actuator, Agent, Cortex, Neuron, Population, Sensor, Specie, Substrate,
};

use crate::error::Result;
use crate::store::Store;

/// Serializable image of the full store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreSnapshot {
    pub populations: Vec<Population>,
    pub species: Vec<Specie>,
    pub agents: Vec<Agent>,
    pub cortices: Vec<Cortex>,
    pub neurons: Vec<Neuron>,
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
    pub substrates: Vec<Substrate>,
}

impl StoreSnapshot {
    /// Capture the current store contents.
    pub fn capture(store: &Store) -> Self {
        store.dump_tables()
    }

    /// Replace the store contents with this snapshot.
    pub fn restore(self, store: &Store) {
        store.load_tables(self);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bardo_structures::{EvoAlg, PopulationId, SelectionAlgorithm, Trace};

    #[test]
    fn test_snapshot_roundtrip() {
        let store = Store::new();
        let population = Population {
            id: PopulationId::generate(),
            specie_ids: vec![],
            evo_alg: EvoAlg::Generational,
            selection_algorithm: SelectionAlgorithm::HofCompetition,
            trace: Trace::default(),
        };
        let pid = population.id;
        store.write_population(population);

        let bytes = StoreSnapshot::capture(&store).to_bytes().unwrap();
        let restored = Store::new();
        StoreSnapshot::from_bytes(&bytes).unwrap().restore(&restored);
        assert!(restored.has_population(&pid));
    }
}
