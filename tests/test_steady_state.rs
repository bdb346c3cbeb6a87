// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Steady-state loop: evaluations accounting and hall-of-fame driven
//! reproduction without generation boundaries.

mod common;

use std::sync::Arc;

use bardo::evolution::MorphologyRegistry;
use bardo::mesh::ScapeRegistry;
use bardo::population::{Experiment, RunContext};
use bardo::state::Store;
use bardo::structures::{EvoAlg, ExperimentConfig, Limit};

use common::{xor_constraint, XorMorphology, XorScape};

#[test]
fn test_steady_state_run_respects_evaluation_limit() {
    let store = Arc::new(Store::new());
    let morphologies = MorphologyRegistry::new();
    morphologies.register("xor", Arc::new(XorMorphology));
    let scapes = ScapeRegistry::new();
    scapes.register_private("xor", || Box::new(XorScape::new()));

    let config = ExperimentConfig {
        evo_alg: EvoAlg::SteadyState,
        init_specie_size: 5,
        specie_size_limit: 8,
        generation_limit: Limit::Inf,
        evaluations_limit: Limit::Finite(40.0),
        fitness_goal: Limit::Inf,
        step_size: 10,
        ..Default::default()
    };

    let report = Experiment::start(RunContext {
        store: store.clone(),
        morphologies,
        scapes,
        config: config.clone(),
        constraints: vec![xor_constraint()],
    })
    .wait()
    .unwrap();

    assert!(report.tot_evaluations >= 40);
    assert!(!report.goal_reached);

    let population = store.read_population(&report.population_id).unwrap();
    let specie = store.read_specie(&population.specie_ids[0]).unwrap();
    assert!(!specie.hall_of_fame.is_empty());
    // The active set never exceeds its cap.
    assert!(specie.agent_ids.len() <= config.specie_size_limit);
    // Every surviving agent resolves cleanly in the store.
    for id in &specie.agent_ids {
        store.check_referential_closure(id).unwrap();
    }
}
