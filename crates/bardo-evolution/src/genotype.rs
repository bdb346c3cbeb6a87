// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Seed genotype construction.
//!
//! A new agent starts minimal: the morphology's init sensors and actuators,
//! and one layer-0 neuron per actuator input component, each neuron fed by
//! every init sensor. Everything else is grown by mutation.
//!
//! Substrate-encoded agents get the same treatment one level up: their
//! neurons connect coordinate pre-processors (CPPs) to connection-expression
//! points (CEPs), while the real sensors and actuators talk to the dense
//! substrate at runtime.

use tracing::debug;

use bardo_neural::random::pick;
use bardo_neural::PlasticityFunction;
use bardo_state::Store;
use bardo_structures::{
    Actuator, ActuatorId, Agent, AgentId, Constraint, Cortex, CortexId, EncodingType, Fingerprint,
    InputLink, LayerIndex, Neuron, NeuronId, PerturbationQty, Sensor, SensorId, SignalFormat,
    SignalSource, Specie, Substrate, SubstrateId,
};

use crate::error::Result;
use crate::fingerprint::update_fingerprint;
use crate::linker::{link_neuron_to_actuator, link_sensor_to_neuron};
use crate::morphology::{ActuatorSpec, MorphologyRegistry, SensorSpec};

pub(crate) fn instantiate_sensor(spec: &SensorSpec, cortex_id: Option<CortexId>) -> Sensor {
    Sensor {
        id: SensorId::generate(),
        name: spec.name.clone(),
        cortex_id,
        scape: spec.scape.clone(),
        vl: spec.vl,
        fanout_ids: vec![],
        generation: 0,
        format: spec.format.clone(),
        parameters: spec.parameters.clone(),
    }
}

pub(crate) fn instantiate_actuator(spec: &ActuatorSpec, cortex_id: Option<CortexId>) -> Actuator {
    Actuator {
        id: ActuatorId::generate(),
        name: spec.name.clone(),
        cortex_id,
        scape: spec.scape.clone(),
        vl: spec.vl,
        fanin_ids: vec![],
        generation: 0,
        format: spec.format.clone(),
        parameters: spec.parameters.clone(),
    }
}

/// Build a blank neuron at `layer` with functions drawn from the constraint.
pub(crate) fn seed_neuron(constraint: &Constraint, cortex_id: CortexId, layer: LayerIndex, generation: u64) -> Neuron {
    let plasticity = *pick(&constraint.neural_pfs);
    let mut neuron = Neuron {
        id: NeuronId::generate(layer),
        cortex_id,
        generation,
        activation: *pick(&constraint.neural_afs),
        plasticity,
        neural_params: plasticity.neural_parameters(),
        aggregation: *pick(&constraint.neural_aggr_fs),
        input_idps: vec![],
        input_idps_modulation: vec![],
        output_ids: vec![],
        ro_ids: vec![],
    };
    if plasticity.needs_modulation() {
        // The modulatory channel must never be empty; a bias entry keeps the
        // rule well-defined until evolution links a real modulator.
        neuron.input_idps_modulation.push(InputLink::new(
            SignalSource::Bias,
            vec![bardo_structures::SynapticWeight::new(
                bardo_neural::random::random_f64() - 0.5,
                plasticity.weight_parameters(),
            )],
        ));
    }
    neuron
}

/// Construct a seed agent for `specie` and write its whole graph to the
/// store. Returns the new agent id; the caller registers it with the specie.
pub fn construct_agent(
    store: &Store,
    registry: &MorphologyRegistry,
    specie: &Specie,
) -> Result<AgentId> {
    let constraint = &specie.constraint;
    let morphology = registry.get(&constraint.morphology)?;
    let encoding = *pick(&constraint.encodings);

    let agent_id = AgentId::generate();
    let cortex_id = CortexId::generate();

    let sensors: Vec<Sensor> = morphology
        .get_init_sensors()
        .iter()
        .map(|s| instantiate_sensor(s, Some(cortex_id)))
        .collect();
    let actuators: Vec<Actuator> = morphology
        .get_init_actuators()
        .iter()
        .map(|a| instantiate_actuator(a, Some(cortex_id)))
        .collect();
    for s in &sensors {
        store.write_sensor(s.clone());
    }
    for a in &actuators {
        store.write_actuator(a.clone());
    }

    let substrate_id = match encoding {
        EncodingType::Neural => None,
        EncodingType::Substrate => Some(SubstrateId::generate()),
    };

    // The evolvable network bridges either sensors → actuators directly, or
    // CPPs → CEPs when a substrate sits in between.
    let (feed_ids, drive): (Vec<SensorId>, Vec<Actuator>) = match encoding {
        EncodingType::Neural => (
            sensors.iter().map(|s| s.id).collect(),
            actuators.clone(),
        ),
        EncodingType::Substrate => {
            let plasticity = *pick(&constraint.substrate_plasticities);
            let dims = sensors
                .iter()
                .find_map(|s| match &s.format {
                    SignalFormat::Symmetric { dims } => Some(dims.len().max(2)),
                    SignalFormat::NoGeo => None,
                })
                .unwrap_or(2);
            let cpps: Vec<Sensor> = morphology
                .get_init_substrate_cpps(dims, plasticity)
                .iter()
                .map(|s| instantiate_sensor(s, Some(cortex_id)))
                .collect();
            let ceps: Vec<Actuator> = morphology
                .get_init_substrate_ceps(dims, plasticity)
                .iter()
                .map(|a| instantiate_actuator(a, Some(cortex_id)))
                .collect();
            for s in &cpps {
                store.write_sensor(s.clone());
            }
            for a in &ceps {
                store.write_actuator(a.clone());
            }
            store.write_substrate(Substrate {
                id: substrate_id.expect("substrate encoding allocates an id"),
                agent_id,
                densities: vec![3],
                linkform: *pick(&constraint.substrate_linkforms),
                plasticity,
                cpp_ids: cpps.iter().map(|s| s.id).collect(),
                cep_ids: ceps.iter().map(|a| a.id).collect(),
            });
            (cpps.iter().map(|s| s.id).collect(), ceps)
        }
    };

    // One neuron per driven input component, all in layer 0.
    let layer = LayerIndex::new(0.0);
    let mut neuron_ids = Vec::new();
    for target in &drive {
        for _ in 0..target.vl {
            let neuron = seed_neuron(constraint, cortex_id, layer, 0);
            neuron_ids.push(neuron.id);
            store.write_neuron(neuron);
        }
    }

    store.write_cortex(Cortex {
        id: cortex_id,
        agent_id,
        sensor_ids: sensors.iter().map(|s| s.id).collect(),
        actuator_ids: actuators.iter().map(|a| a.id).collect(),
        neuron_ids: neuron_ids.clone(),
    });

    let agent = Agent {
        id: agent_id,
        specie_id: specie.id,
        cortex_id,
        substrate_id,
        generation: 0,
        encoding,
        fingerprint: Fingerprint::default(),
        constraint: constraint.clone(),
        evo_hist: vec![],
        fitness: vec![],
        main_fitness: 0.0,
        pattern: vec![(layer, neuron_ids.clone())],
        tuning_selection_f: *pick(&constraint.tuning_selection_fs),
        annealing_parameter: *pick(&constraint.annealing_parameters),
        tuning_duration_f: constraint.tuning_duration_f,
        perturbation_range: *pick(&constraint.perturbation_ranges),
        perturbation_qty: PerturbationQty::Multiple,
        mutation_operators: constraint.mutation_operators.clone(),
        tot_topological_mutations_f: *pick(&constraint.tot_topological_mutations_fs),
        heredity_type: *pick(&constraint.heredity_types),
        parent_ids: vec![],
        offspring_ids: vec![],
        champion: false,
        fs: 1.0,
    };
    store.write_agent(agent);

    // Wire the seed topology: every feed sensor into every neuron, neurons
    // round-robin onto the driven actuators.
    let mut neuron_iter = neuron_ids.iter();
    for target in &drive {
        for _ in 0..target.vl {
            let nid = neuron_iter.next().expect("one neuron per drive component");
            for sid in &feed_ids {
                link_sensor_to_neuron(store, sid, nid)?;
            }
            link_neuron_to_actuator(store, nid, &target.id)?;
        }
    }

    update_fingerprint(store, &agent_id)?;
    debug!(agent = %agent_id, ?encoding, neurons = neuron_ids.len(), "constructed seed agent");
    Ok(agent_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::Morphology;
    use bardo_structures::{PopulationId, ScapeRef, SpecieId};
    use std::sync::Arc;

    pub(crate) struct XorLike;

    impl Morphology for XorLike {
        fn sensors(&self) -> Vec<SensorSpec> {
            vec![SensorSpec::new("xor_inputs", 2, ScapeRef::Private("xor".into()))]
        }

        fn actuators(&self) -> Vec<ActuatorSpec> {
            vec![ActuatorSpec::new("xor_output", 1, ScapeRef::Private("xor".into()))]
        }
    }

    fn specie_for(registry: &MorphologyRegistry) -> Specie {
        registry.register("xor_like", Arc::new(XorLike));
        let mut constraint = Constraint::for_morphology("xor_like");
        // One activation function so seed fingerprints are deterministic.
        constraint.neural_afs = vec![bardo_neural::ActivationFunction::Tanh];
        Specie::new(SpecieId::generate(), PopulationId::generate(), constraint)
    }

    #[test]
    fn test_seed_agent_is_well_formed() {
        let store = Store::new();
        let registry = MorphologyRegistry::new();
        let specie = specie_for(&registry);
        let agent_id = construct_agent(&store, &registry, &specie).unwrap();

        let graph = store.agent_graph(&agent_id).unwrap();
        assert_eq!(graph.sensors.len(), 1);
        assert_eq!(graph.actuators.len(), 1);
        // One neuron per actuator component.
        assert_eq!(graph.neurons.len(), 1);
        store.check_referential_closure(&agent_id).unwrap();

        let neuron = graph.neurons.values().next().unwrap();
        assert_eq!(neuron.input_idps.len(), 1);
        assert_eq!(neuron.input_idps[0].weights.len(), 2);
        assert_eq!(neuron.output_ids.len(), 1);
        assert!(neuron.ro_ids.is_empty());

        // Pattern partitions the cortex neurons.
        let mut pattern_ids = graph.agent.pattern_neuron_ids();
        let mut cortex_ids = graph.cortex.neuron_ids.clone();
        pattern_ids.sort();
        cortex_ids.sort();
        assert_eq!(pattern_ids, cortex_ids);

        // Fingerprint is populated.
        assert_eq!(graph.agent.fingerprint.topology.tot_neurons, 1);
    }

    #[test]
    fn test_seed_agents_share_fingerprint() {
        let store = Store::new();
        let registry = MorphologyRegistry::new();
        let specie = specie_for(&registry);
        let a = construct_agent(&store, &registry, &specie).unwrap();
        let b = construct_agent(&store, &registry, &specie).unwrap();
        let fa = store.read_agent(&a).unwrap().fingerprint;
        let fb = store.read_agent(&b).unwrap().fingerprint;
        // Same morphology, same seed topology: only weights differ, and
        // weights are not part of the fingerprint.
        assert_eq!(fa, fb);
    }
}
