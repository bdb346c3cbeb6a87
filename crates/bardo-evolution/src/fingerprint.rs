// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fingerprint computation.
//!
//! The fingerprint strips every unique id out of a genotype and keeps only
//! structure: layer histogram, generalized evolutionary history, generalized
//! adapters and a topology summary. Agents with equal fingerprints are
//! structurally equivalent for species and hall-of-fame bucketing.

use ahash::AHashMap;

use bardo_neural::ActivationFunction;
use bardo_state::Store;
use bardo_structures::{
    AgentId, ElementKind, ElementRef, Fingerprint, GeneralizedActuator, GeneralizedEvoHistEntry,
    GeneralizedSensor, TopologySummary,
};

use crate::error::Result;

fn generalize_element(e: &ElementRef) -> (ElementKind, Option<bardo_structures::LayerIndex>) {
    let kind = match e {
        ElementRef::Bias => ElementKind::Bias,
        ElementRef::Neuron(_) => ElementKind::Neuron,
        ElementRef::Sensor(_) => ElementKind::Sensor,
        ElementRef::Actuator(_) => ElementKind::Actuator,
        ElementRef::Cortex(_) => ElementKind::Cortex,
    };
    (kind, e.layer())
}

/// Compute the fingerprint of an agent from the store.
pub fn compute_fingerprint(store: &Store, agent_id: &AgentId) -> Result<Fingerprint> {
    let graph = store.agent_graph(agent_id)?;

    let generalized_pattern = graph
        .agent
        .pattern
        .iter()
        .map(|(layer, ids)| (*layer, ids.len()))
        .collect();

    let generalized_evo_hist = graph
        .agent
        .evo_hist
        .iter()
        .map(|entry| GeneralizedEvoHistEntry {
            operator: entry.operator,
            elements: entry.elements.iter().map(generalize_element).collect(),
        })
        .collect();

    let generalized_sensors = graph
        .sensors
        .iter()
        .map(|s| GeneralizedSensor {
            name: s.name.clone(),
            vl: s.vl,
            format: s.format.clone(),
        })
        .collect();

    let generalized_actuators = graph
        .actuators
        .iter()
        .map(|a| GeneralizedActuator {
            name: a.name.clone(),
            vl: a.vl,
            format: a.format.clone(),
        })
        .collect();

    let mut tot_n_ils = 0;
    let mut tot_n_ols = 0;
    let mut tot_n_ros = 0;
    let mut histogram: AHashMap<ActivationFunction, usize> = AHashMap::new();
    for neuron in graph.neurons.values() {
        tot_n_ils += neuron.input_idps.len() + neuron.input_idps_modulation.len();
        tot_n_ols += neuron.output_ids.len();
        tot_n_ros += neuron.ro_ids.len();
        *histogram.entry(neuron.activation).or_insert(0) += 1;
    }
    let mut af_distribution: Vec<_> = histogram.into_iter().collect();
    af_distribution.sort_by_key(|(af, _)| *af);

    Ok(Fingerprint {
        generalized_pattern,
        generalized_evo_hist,
        generalized_sensors,
        generalized_actuators,
        topology: TopologySummary {
            encoding: Some(graph.agent.encoding),
            tot_neurons: graph.neurons.len(),
            tot_n_ils,
            tot_n_ols,
            tot_n_ros,
            af_distribution,
        },
    })
}

/// Recompute and persist the fingerprint on the agent record.
pub fn update_fingerprint(store: &Store, agent_id: &AgentId) -> Result<()> {
    let fingerprint = compute_fingerprint(store, agent_id)?;
    let mut agent = store.read_agent(agent_id)?;
    agent.fingerprint = fingerprint;
    store.write_agent(agent);
    Ok(())
}
