// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end XOR: generational evolution with competition selection.
//!
//! XOR needs hidden structure, so a run that improves on the one-neuron
//! baseline demonstrates topology evolution, weight tuning, hall-of-fame
//! retention and selection working together. Full convergence to ~4.0 is
//! probabilistic, so the hard assertion is a conservative floor.

mod common;

use std::sync::Arc;

use bardo::evolution::MorphologyRegistry;
use bardo::mesh::ScapeRegistry;
use bardo::population::{Experiment, RunContext};
use bardo::state::Store;
use bardo::structures::{EvoAlg, ExperimentConfig, Limit, SelectionAlgorithm};

use common::{xor_constraint, XorMorphology, XorScape};

#[test]
fn test_xor_generational_run_improves_over_baseline() {
    let store = Arc::new(Store::new());
    let morphologies = MorphologyRegistry::new();
    morphologies.register("xor", Arc::new(XorMorphology));
    let scapes = ScapeRegistry::new();
    scapes.register_private("xor", || Box::new(XorScape::new()));

    let config = ExperimentConfig {
        evo_alg: EvoAlg::Generational,
        selection_algorithm: SelectionAlgorithm::HofCompetition,
        init_specie_size: 20,
        specie_size_limit: 20,
        generation_limit: Limit::Finite(30.0),
        evaluations_limit: Limit::Inf,
        fitness_goal: Limit::Finite(3.99),
        step_size: 200,
        shof_ratio: 1.0,
        fitness_stagnation: true,
        max_parallel: 4,
        ..Default::default()
    };

    let report = Experiment::start(RunContext {
        store: store.clone(),
        morphologies,
        scapes,
        config,
        constraints: vec![xor_constraint()],
    })
    .wait()
    .unwrap();

    let best = report.best_fitness.first().copied().unwrap_or(0.0);
    // A constant-output network scores 0; a single linear separator tops
    // out near 2. Evolution must do visibly better than both, and a lucky
    // run may hit the 3.99 goal outright.
    assert!(
        report.goal_reached || best > 1.0,
        "evolution failed to improve: best {}",
        best
    );
    assert!(report.tot_evaluations > 20);
    assert!(!report.trace.stats.is_empty());

    // The hall of fame holds evaluated champions with live genotypes.
    let population = store.read_population(&report.population_id).unwrap();
    let specie = store.read_specie(&population.specie_ids[0]).unwrap();
    assert!(!specie.hall_of_fame.is_empty());
    for champ in &specie.hall_of_fame {
        assert!(store.has_agent(&champ.agent_id));
        store.check_referential_closure(&champ.agent_id).unwrap();
    }
}
