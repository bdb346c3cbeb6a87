// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Agent cloning.
//!
//! Two passes over the owned graph: (a) allocate a fresh id for every owned
//! entity into a scratch mapping, (b) rewrite each entity's cross-references
//! through that mapping and write the clones. Bias maps to itself.
//! Structure and weights are preserved exactly; the clone starts with no
//! offspring and its evolutionary history rewritten through the mapping.

use ahash::AHashMap;
use tracing::trace;

use bardo_state::Store;
use bardo_structures::{
    Actuator, ActuatorId, AgentId, CortexId, ElementRef, EvoHistEntry, NeuronId, Sensor, SensorId,
    SignalSource, SignalTarget, SubstrateId,
};

use crate::error::Result;

struct IdMap {
    neurons: AHashMap<NeuronId, NeuronId>,
    sensors: AHashMap<SensorId, SensorId>,
    actuators: AHashMap<ActuatorId, ActuatorId>,
}

impl IdMap {
    fn neuron(&self, id: &NeuronId) -> NeuronId {
        self.neurons.get(id).copied().unwrap_or(*id)
    }

    fn sensor(&self, id: &SensorId) -> SensorId {
        self.sensors.get(id).copied().unwrap_or(*id)
    }

    fn actuator(&self, id: &ActuatorId) -> ActuatorId {
        self.actuators.get(id).copied().unwrap_or(*id)
    }

    fn source(&self, s: &SignalSource) -> SignalSource {
        match s {
            SignalSource::Bias => SignalSource::Bias,
            SignalSource::Sensor(id) => SignalSource::Sensor(self.sensor(id)),
            SignalSource::Neuron(id) => SignalSource::Neuron(self.neuron(id)),
        }
    }

    fn target(&self, t: &SignalTarget) -> SignalTarget {
        match t {
            SignalTarget::Neuron(id) => SignalTarget::Neuron(self.neuron(id)),
            SignalTarget::Actuator(id) => SignalTarget::Actuator(self.actuator(id)),
        }
    }

    fn element(&self, e: &ElementRef) -> ElementRef {
        match e {
            ElementRef::Bias => ElementRef::Bias,
            ElementRef::Neuron(id) => ElementRef::Neuron(self.neuron(id)),
            ElementRef::Sensor(id) => ElementRef::Sensor(self.sensor(id)),
            ElementRef::Actuator(id) => ElementRef::Actuator(self.actuator(id)),
            ElementRef::Cortex(id) => ElementRef::Cortex(*id),
        }
    }
}

fn clone_sensor(store: &Store, map: &IdMap, sensor: &Sensor, cortex_id: CortexId) {
    let mut clone = sensor.clone();
    clone.id = map.sensor(&sensor.id);
    clone.cortex_id = Some(cortex_id);
    clone.fanout_ids = sensor.fanout_ids.iter().map(|id| map.neuron(id)).collect();
    store.write_sensor(clone);
}

fn clone_actuator(store: &Store, map: &IdMap, actuator: &Actuator, cortex_id: CortexId) {
    let mut clone = actuator.clone();
    clone.id = map.actuator(&actuator.id);
    clone.cortex_id = Some(cortex_id);
    clone.fanin_ids = actuator.fanin_ids.iter().map(|id| map.neuron(id)).collect();
    store.write_actuator(clone);
}

/// Clone an agent and everything it owns. Returns the clone's id.
pub fn clone_agent(store: &Store, agent_id: &AgentId) -> Result<AgentId> {
    let graph = store.agent_graph(agent_id)?;

    // Pass A: allocate ids.
    let new_agent_id = AgentId::generate();
    let new_cortex_id = CortexId::generate();
    let mut map = IdMap {
        neurons: AHashMap::with_capacity(graph.neurons.len()),
        sensors: AHashMap::new(),
        actuators: AHashMap::new(),
    };
    for id in graph.neurons.keys() {
        map.neurons.insert(*id, NeuronId::generate(id.layer()));
    }
    for s in &graph.sensors {
        map.sensors.insert(s.id, SensorId::generate());
    }
    for a in &graph.actuators {
        map.actuators.insert(a.id, ActuatorId::generate());
    }
    if let Some(substrate) = &graph.substrate {
        for id in &substrate.cpp_ids {
            map.sensors.insert(*id, SensorId::generate());
        }
        for id in &substrate.cep_ids {
            map.actuators.insert(*id, ActuatorId::generate());
        }
    }

    // Pass B: rewrite references and write the clones.
    for neuron in graph.neurons.values() {
        let mut clone = neuron.clone();
        clone.id = map.neuron(&neuron.id);
        clone.cortex_id = new_cortex_id;
        for link in clone
            .input_idps
            .iter_mut()
            .chain(clone.input_idps_modulation.iter_mut())
        {
            link.source = map.source(&link.source);
        }
        clone.output_ids = neuron.output_ids.iter().map(|t| map.target(t)).collect();
        clone.ro_ids = neuron.ro_ids.iter().map(|id| map.neuron(id)).collect();
        store.write_neuron(clone);
    }
    for sensor in &graph.sensors {
        clone_sensor(store, &map, sensor, new_cortex_id);
    }
    for actuator in &graph.actuators {
        clone_actuator(store, &map, actuator, new_cortex_id);
    }

    let new_substrate_id = match &graph.substrate {
        None => None,
        Some(substrate) => {
            for id in &substrate.cpp_ids {
                let cpp = store.read_sensor(id)?;
                clone_sensor(store, &map, &cpp, new_cortex_id);
            }
            for id in &substrate.cep_ids {
                let cep = store.read_actuator(id)?;
                clone_actuator(store, &map, &cep, new_cortex_id);
            }
            let mut clone = substrate.clone();
            clone.id = SubstrateId::generate();
            clone.agent_id = new_agent_id;
            clone.cpp_ids = substrate.cpp_ids.iter().map(|id| map.sensor(id)).collect();
            clone.cep_ids = substrate.cep_ids.iter().map(|id| map.actuator(id)).collect();
            let id = clone.id;
            store.write_substrate(clone);
            Some(id)
        }
    };

    store.write_cortex(bardo_structures::Cortex {
        id: new_cortex_id,
        agent_id: new_agent_id,
        sensor_ids: graph.cortex.sensor_ids.iter().map(|id| map.sensor(id)).collect(),
        actuator_ids: graph
            .cortex
            .actuator_ids
            .iter()
            .map(|id| map.actuator(id))
            .collect(),
        neuron_ids: graph.cortex.neuron_ids.iter().map(|id| map.neuron(id)).collect(),
    });

    let mut clone = graph.agent.clone();
    clone.id = new_agent_id;
    clone.cortex_id = new_cortex_id;
    clone.substrate_id = new_substrate_id;
    clone.offspring_ids = vec![];
    clone.pattern = graph
        .agent
        .pattern
        .iter()
        .map(|(layer, ids)| (*layer, ids.iter().map(|id| map.neuron(id)).collect()))
        .collect();
    clone.evo_hist = graph
        .agent
        .evo_hist
        .iter()
        .map(|entry| EvoHistEntry {
            operator: entry.operator,
            elements: entry.elements.iter().map(|e| map.element(e)).collect(),
        })
        .collect();
    store.write_agent(clone);

    trace!(parent = %agent_id, clone = %new_agent_id, "cloned agent");
    Ok(new_agent_id)
}
