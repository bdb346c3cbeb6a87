// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stop-condition precedence and the op-tag lifecycle.

mod common;

use std::sync::Arc;

use bardo::evolution::MorphologyRegistry;
use bardo::mesh::{Scape, ScapeRegistry, ScapeResponse};
use bardo::population::{Experiment, RunContext};
use bardo::state::Store;
use bardo::structures::{EvoAlg, ExperimentConfig, Limit, OpTag};

use common::XorMorphology;

/// Declares the task solved on the very first actuation.
struct InstantGoalScape;

impl Scape for InstantGoalScape {
    fn sense(&mut self, sensor: &bardo::structures::Sensor) -> Vec<f64> {
        vec![0.0; sensor.vl]
    }

    fn actuate(
        &mut self,
        _actuator: &bardo::structures::Actuator,
        _output: &[f64],
    ) -> ScapeResponse {
        ScapeResponse {
            fitness: vec![1.0],
            end_flag: bardo::mesh::EndFlag::GoalReached,
        }
    }
}

fn context(store: Arc<Store>, config: ExperimentConfig, scapes: ScapeRegistry) -> RunContext {
    let morphologies = MorphologyRegistry::new();
    morphologies.register("xor", Arc::new(XorMorphology));
    RunContext {
        store,
        morphologies,
        scapes,
        config,
        constraints: vec![common::xor_constraint()],
    }
}

#[test]
fn test_goal_reached_finishes_generation_and_emits_final_stats() {
    let store = Arc::new(Store::new());
    let scapes = ScapeRegistry::new();
    scapes.register_private("xor", || Box::new(InstantGoalScape));

    let config = ExperimentConfig {
        evo_alg: EvoAlg::Generational,
        init_specie_size: 4,
        specie_size_limit: 4,
        // Only the goal signal can end this run.
        generation_limit: Limit::Inf,
        evaluations_limit: Limit::Inf,
        fitness_goal: Limit::Inf,
        max_parallel: 2,
        ..Default::default()
    };
    let report = Experiment::start(context(store.clone(), config.clone(), scapes))
        .wait()
        .unwrap();

    assert!(report.goal_reached);
    // The in-flight generation completed: selection populated the next one.
    assert!(report.generations >= 1);
    let population = store.read_population(&report.population_id).unwrap();
    for specie_id in &population.specie_ids {
        let specie = store.read_specie(specie_id).unwrap();
        assert_eq!(specie.agent_ids.len(), config.specie_size_limit);
        assert!(!specie.hall_of_fame.is_empty());
    }
    // Final stats were emitted.
    assert!(!report.trace.stats.is_empty());
    assert!(report.tot_evaluations >= config.init_specie_size as u64);
}

#[test]
fn test_pause_resume_stop_lifecycle() {
    let store = Arc::new(Store::new());
    let scapes = ScapeRegistry::new();
    scapes.register_private("xor", || Box::new(common::XorScape::new()));

    let config = ExperimentConfig {
        evo_alg: EvoAlg::Generational,
        init_specie_size: 3,
        specie_size_limit: 3,
        generation_limit: Limit::Inf,
        evaluations_limit: Limit::Inf,
        max_parallel: 2,
        ..Default::default()
    };
    let experiment = Experiment::start(context(store, config, scapes));

    experiment.pause();
    // Give the controller a moment to honor the tag.
    std::thread::sleep(std::time::Duration::from_millis(200));
    assert_eq!(experiment.status().op_tag, OpTag::Pause);

    experiment.resume();
    std::thread::sleep(std::time::Duration::from_millis(100));

    experiment.stop();
    let report = experiment.wait().unwrap();
    assert!(!report.trace.stats.is_empty());
}
