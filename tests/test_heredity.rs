// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Heredity semantics of the tuning phase: Darwinian genotypes keep their
//! pre-tuning weights, Lamarckian genotypes keep the tuned ones.

mod common;

use bardo::mesh::{evaluate_agent, EvaluationOptions, Scape, ScapeRegistry, ScapeResponse};
use bardo::neural::ActivationFunction;
use bardo::state::Store;
use bardo::structures::{Heredity, TuningDuration};

use common::build_single_neuron_agent;

/// Fitness equals the network's output, so tuning hill-climbs the single
/// weight directly.
struct MaximizeOutputScape;

impl Scape for MaximizeOutputScape {
    fn sense(&mut self, _sensor: &bardo::structures::Sensor) -> Vec<f64> {
        vec![1.0]
    }

    fn actuate(
        &mut self,
        _actuator: &bardo::structures::Actuator,
        output: &[f64],
    ) -> ScapeResponse {
        ScapeResponse::halt(vec![output[0]])
    }
}

fn stored_weight(store: &Store, agent_id: &bardo::structures::AgentId) -> f64 {
    let graph = store.agent_graph(agent_id).unwrap();
    let neuron = graph.neurons.values().next().unwrap();
    neuron.input_idps[0].weights[0].value
}

fn run_tuning(heredity: Heredity) -> (f64, f64, Vec<f64>) {
    let store = Store::new();
    let scapes = ScapeRegistry::new();
    scapes.register_private("maximize", || Box::new(MaximizeOutputScape));

    let agent_id = build_single_neuron_agent(
        &store,
        "maximize",
        &[0.5],
        None,
        // Linear output: the achieved fitness IS the weight value.
        ActivationFunction::Linear,
        TuningDuration::Const(25),
        heredity,
    );
    let initial = stored_weight(&store, &agent_id);

    let result = evaluate_agent(&store, &scapes, &agent_id, &EvaluationOptions::default()).unwrap();
    assert!(result.tuning_attempts > 0);

    (initial, stored_weight(&store, &agent_id), result.fitness)
}

#[test]
fn test_darwinian_offspring_inherit_pre_tuning_weights() {
    let (initial, stored, fitness) = run_tuning(Heredity::Darwinian);
    assert_eq!(initial, stored, "darwinian genotype must keep its weights");
    // Tuning still reports the best fitness it found.
    assert!(fitness[0] >= initial);
}

#[test]
fn test_lamarckian_offspring_inherit_post_tuning_weights() {
    let (_initial, stored, fitness) = run_tuning(Heredity::Lamarckian);
    // Output is linear in the single weight, so the persisted weight must
    // equal the best fitness the tuning phase achieved.
    assert!(
        (stored - fitness[0]).abs() < 1e-9,
        "stored {} vs fitness {}",
        stored,
        fitness[0]
    );
}
