// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The typed genotype store.
//!
//! One `RwLock`'d table per entity kind: reads clone immutable snapshots,
//! writes replace whole records. Deleting an agent cascades to everything
//! it owns.

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::trace;

use bardo_structures::{
    Actuator, ActuatorId, Agent, AgentId, Cortex, CortexId, Neuron, NeuronId, Population,
    PopulationId, Sensor, SensorId, Specie, SpecieId, Substrate, SubstrateId,
};

use crate::error::{Result, StateError};

macro_rules! store_table {
    ($field:ident, $id:ty, $entity:ty, $read:ident, $write:ident, $delete:ident, $exists:ident) => {
        pub fn $read(&self, id: &$id) -> Result<$entity> {
            self.$field
                .read()
                .get(id)
                .cloned()
                .ok_or_else(|| StateError::NotFound(id.to_string()))
        }

        /// Insert or replace the whole record, keyed by its own id.
        pub fn $write(&self, entity: $entity) {
            self.$field.write().insert(entity.id, entity);
        }

        pub fn $delete(&self, id: &$id) -> Result<()> {
            self.$field
                .write()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StateError::NotFound(id.to_string()))
        }

        pub fn $exists(&self, id: &$id) -> bool {
            self.$field.read().contains_key(id)
        }
    };
}

/// Process-wide entity store. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct Store {
    populations: RwLock<AHashMap<PopulationId, Population>>,
    species: RwLock<AHashMap<SpecieId, Specie>>,
    agents: RwLock<AHashMap<AgentId, Agent>>,
    cortices: RwLock<AHashMap<CortexId, Cortex>>,
    neurons: RwLock<AHashMap<NeuronId, Neuron>>,
    sensors: RwLock<AHashMap<SensorId, Sensor>>,
    actuators: RwLock<AHashMap<ActuatorId, Actuator>>,
    substrates: RwLock<AHashMap<SubstrateId, Substrate>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    store_table!(populations, PopulationId, Population, read_population, write_population, delete_population, has_population);
    store_table!(species, SpecieId, Specie, read_specie, write_specie, delete_specie, has_specie);
    store_table!(agents, AgentId, Agent, read_agent, write_agent, delete_agent, has_agent);
    store_table!(cortices, CortexId, Cortex, read_cortex, write_cortex, delete_cortex, has_cortex);
    store_table!(neurons, NeuronId, Neuron, read_neuron, write_neuron, delete_neuron, has_neuron);
    store_table!(sensors, SensorId, Sensor, read_sensor, write_sensor, delete_sensor, has_sensor);
    store_table!(actuators, ActuatorId, Actuator, read_actuator, write_actuator, delete_actuator, has_actuator);
    store_table!(substrates, SubstrateId, Substrate, read_substrate, write_substrate, delete_substrate, has_substrate);

    /// Read the whole graph an agent owns in one pass.
    pub fn agent_graph(&self, agent_id: &AgentId) -> Result<AgentGraph> {
        let agent = self.read_agent(agent_id)?;
        let cortex = self.read_cortex(&agent.cortex_id)?;
        let mut neurons = AHashMap::with_capacity(cortex.neuron_ids.len());
        for nid in &cortex.neuron_ids {
            neurons.insert(*nid, self.read_neuron(nid)?);
        }
        let sensors = cortex
            .sensor_ids
            .iter()
            .map(|id| self.read_sensor(id))
            .collect::<Result<Vec<_>>>()?;
        let actuators = cortex
            .actuator_ids
            .iter()
            .map(|id| self.read_actuator(id))
            .collect::<Result<Vec<_>>>()?;
        let substrate = match &agent.substrate_id {
            Some(sid) => Some(self.read_substrate(sid)?),
            None => None,
        };
        Ok(AgentGraph {
            agent,
            cortex,
            neurons,
            sensors,
            actuators,
            substrate,
        })
    }

    /// Delete an agent and everything it owns. The cascade ignores elements
    /// that are already gone so a half-deleted agent can be cleaned up.
    pub fn delete_agent_cascade(&self, agent_id: &AgentId) -> Result<()> {
        let agent = self.read_agent(agent_id)?;
        if let Ok(cortex) = self.read_cortex(&agent.cortex_id) {
            for nid in &cortex.neuron_ids {
                let _ = self.delete_neuron(nid);
            }
            for sid in &cortex.sensor_ids {
                let _ = self.delete_sensor(sid);
            }
            for aid in &cortex.actuator_ids {
                let _ = self.delete_actuator(aid);
            }
            let _ = self.delete_cortex(&agent.cortex_id);
        }
        if let Some(sub_id) = &agent.substrate_id {
            // CPPs/CEPs live in the sensor/actuator tables.
            if let Ok(substrate) = self.read_substrate(sub_id) {
                for sid in &substrate.cpp_ids {
                    let _ = self.delete_sensor(sid);
                }
                for aid in &substrate.cep_ids {
                    let _ = self.delete_actuator(aid);
                }
            }
            let _ = self.delete_substrate(sub_id);
        }
        self.delete_agent(agent_id)?;
        trace!(agent = %agent_id, "deleted agent cascade");
        Ok(())
    }

    /// Verify the agent's graph is referentially closed; returns the first
    /// dangling reference as an invariant violation.
    pub fn check_referential_closure(&self, agent_id: &AgentId) -> Result<()> {
        let graph = self.agent_graph(agent_id)?;
        for neuron in graph.neurons.values() {
            for link in neuron
                .input_idps
                .iter()
                .chain(neuron.input_idps_modulation.iter())
            {
                match &link.source {
                    bardo_structures::SignalSource::Bias => {}
                    bardo_structures::SignalSource::Sensor(id) => {
                        if !self.has_sensor(id) {
                            return Err(StateError::InvariantViolation(format!(
                                "{} references missing {}",
                                neuron.id, id
                            )));
                        }
                    }
                    bardo_structures::SignalSource::Neuron(id) => {
                        if !self.has_neuron(id) {
                            return Err(StateError::InvariantViolation(format!(
                                "{} references missing {}",
                                neuron.id, id
                            )));
                        }
                    }
                }
            }
            for target in &neuron.output_ids {
                let ok = match target {
                    bardo_structures::SignalTarget::Neuron(id) => self.has_neuron(id),
                    bardo_structures::SignalTarget::Actuator(id) => self.has_actuator(id),
                };
                if !ok {
                    return Err(StateError::InvariantViolation(format!(
                        "{} outputs to missing element",
                        neuron.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn dump_tables(&self) -> crate::persistence::StoreSnapshot {
        crate::persistence::StoreSnapshot {
            populations: self.populations.read().values().cloned().collect(),
            species: self.species.read().values().cloned().collect(),
            agents: self.agents.read().values().cloned().collect(),
            cortices: self.cortices.read().values().cloned().collect(),
            neurons: self.neurons.read().values().cloned().collect(),
            sensors: self.sensors.read().values().cloned().collect(),
            actuators: self.actuators.read().values().cloned().collect(),
            substrates: self.substrates.read().values().cloned().collect(),
        }
    }

    pub(crate) fn load_tables(&self, snapshot: crate::persistence::StoreSnapshot) {
        *self.populations.write() = snapshot.populations.into_iter().map(|e| (e.id, e)).collect();
        *self.species.write() = snapshot.species.into_iter().map(|e| (e.id, e)).collect();
        *self.agents.write() = snapshot.agents.into_iter().map(|e| (e.id, e)).collect();
        *self.cortices.write() = snapshot.cortices.into_iter().map(|e| (e.id, e)).collect();
        *self.neurons.write() = snapshot.neurons.into_iter().map(|e| (e.id, e)).collect();
        *self.sensors.write() = snapshot.sensors.into_iter().map(|e| (e.id, e)).collect();
        *self.actuators.write() = snapshot.actuators.into_iter().map(|e| (e.id, e)).collect();
        *self.substrates.write() = snapshot.substrates.into_iter().map(|e| (e.id, e)).collect();
    }
}

/// An agent's full owned graph, read in one pass.
#[derive(Debug, Clone)]
pub struct AgentGraph {
    pub agent: Agent,
    pub cortex: Cortex,
    pub neurons: AHashMap<NeuronId, Neuron>,
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
    pub substrate: Option<Substrate>,
}

impl AgentGraph {
    /// Neurons ordered as the cortex lists them.
    pub fn neurons_in_order(&self) -> impl Iterator<Item = &Neuron> {
        self.cortex
            .neuron_ids
            .iter()
            .filter_map(|id| self.neurons.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bardo_neural::{ActivationFunction, AggregationFunction, PlasticityFunction};
    use bardo_structures::{
        Constraint, EncodingType, Heredity, LayerIndex, MutationOperator, PerturbationQty,
        ScapeRef, SignalFormat, TotTopologicalMutations, TuningDuration, TuningSelection,
    };

    fn test_agent(store: &Store) -> AgentId {
        let agent_id = AgentId::generate();
        let cortex_id = CortexId::generate();
        let neuron = Neuron {
            id: NeuronId::generate(LayerIndex::new(0.0)),
            cortex_id,
            generation: 0,
            activation: ActivationFunction::Tanh,
            plasticity: PlasticityFunction::None,
            neural_params: vec![],
            aggregation: AggregationFunction::DotProduct,
            input_idps: vec![],
            input_idps_modulation: vec![],
            output_ids: vec![],
            ro_ids: vec![],
        };
        let sensor = Sensor {
            id: SensorId::generate(),
            name: "s".into(),
            cortex_id: Some(cortex_id),
            scape: ScapeRef::Private("sim".into()),
            vl: 2,
            fanout_ids: vec![neuron.id],
            generation: 0,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        };
        let actuator = Actuator {
            id: ActuatorId::generate(),
            name: "a".into(),
            cortex_id: Some(cortex_id),
            scape: ScapeRef::Private("sim".into()),
            vl: 1,
            fanin_ids: vec![neuron.id],
            generation: 0,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        };
        let cortex = Cortex {
            id: cortex_id,
            agent_id,
            sensor_ids: vec![sensor.id],
            actuator_ids: vec![actuator.id],
            neuron_ids: vec![neuron.id],
        };
        let agent = Agent {
            id: agent_id,
            specie_id: SpecieId::generate(),
            cortex_id,
            substrate_id: None,
            generation: 0,
            encoding: EncodingType::Neural,
            fingerprint: Default::default(),
            constraint: Constraint::default(),
            evo_hist: vec![],
            fitness: vec![],
            main_fitness: 0.0,
            pattern: vec![(neuron.id.layer(), vec![neuron.id])],
            tuning_selection_f: TuningSelection::DynamicRandom,
            annealing_parameter: 1.0,
            tuning_duration_f: TuningDuration::Const(10),
            perturbation_range: 1.0,
            perturbation_qty: PerturbationQty::Multiple,
            mutation_operators: MutationOperator::standard_set(),
            tot_topological_mutations_f: TotTopologicalMutations::NCountLinear(1.0),
            heredity_type: Heredity::Darwinian,
            parent_ids: vec![],
            offspring_ids: vec![],
            champion: false,
            fs: 1.0,
        };
        store.write_neuron(neuron);
        store.write_sensor(sensor);
        store.write_actuator(actuator);
        store.write_cortex(cortex);
        store.write_agent(agent);
        agent_id
    }

    #[test]
    fn test_read_write_roundtrip() {
        let store = Store::new();
        let id = test_agent(&store);
        let agent = store.read_agent(&id).unwrap();
        assert_eq!(agent.id, id);
    }

    #[test]
    fn test_missing_read_is_not_found() {
        let store = Store::new();
        let err = store.read_agent(&AgentId::generate()).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn test_agent_graph_resolves_every_element() {
        let store = Store::new();
        let id = test_agent(&store);
        let graph = store.agent_graph(&id).unwrap();
        assert_eq!(graph.neurons.len(), 1);
        assert_eq!(graph.sensors.len(), 1);
        assert_eq!(graph.actuators.len(), 1);
        assert!(graph.substrate.is_none());
        store.check_referential_closure(&id).unwrap();
    }

    #[test]
    fn test_delete_cascade_empties_tables() {
        let store = Store::new();
        let id = test_agent(&store);
        let graph = store.agent_graph(&id).unwrap();
        store.delete_agent_cascade(&id).unwrap();
        assert!(!store.has_agent(&id));
        assert!(!store.has_cortex(&graph.cortex.id));
        for nid in graph.neurons.keys() {
            assert!(!store.has_neuron(nid));
        }
        assert!(!store.has_sensor(&graph.sensors[0].id));
        assert!(!store.has_actuator(&graph.actuators[0].id));
    }
}
