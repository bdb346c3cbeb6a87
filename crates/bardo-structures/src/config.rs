// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Experiment configuration surface.

use serde::{Deserialize, Serialize};

use crate::population::{EvoAlg, SelectionAlgorithm};

/// Operation modes a run may execute agents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpMode {
    /// Genotype training against the training scape.
    Gt,
    Validation,
    Test,
}

/// A stop-condition bound; `Inf` disables the condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Finite(f64),
    Inf,
}

impl Limit {
    /// True when `value` has reached or passed the bound.
    pub fn reached(&self, value: f64) -> bool {
        match self {
            Limit::Finite(bound) => value >= *bound,
            Limit::Inf => false,
        }
    }

    /// True when `value` strictly exceeds the bound (fitness goals).
    pub fn exceeded(&self, value: f64) -> bool {
        match self {
            Limit::Finite(bound) => value > *bound,
            Limit::Inf => false,
        }
    }
}

/// Every knob of a run, with the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub op_modes: Vec<OpMode>,
    pub evo_alg: EvoAlg,
    pub selection_algorithm: SelectionAlgorithm,
    /// Fraction of losers carried forward by selection.
    pub survival_percentage: f64,
    pub init_specie_size: usize,
    pub specie_size_limit: usize,
    pub generation_limit: Limit,
    pub evaluations_limit: Limit,
    pub fitness_goal: Limit,
    /// Evaluations between stats snapshots.
    pub step_size: u64,
    /// Share of the next generation drawn from the hall of fame.
    pub shof_ratio: f64,
    /// Chance a selected champion re-enters as itself instead of spawning
    /// an offspring.
    pub re_entry_probability: f64,
    /// Enables the fitness-stagnation (`fs`) update rule.
    pub fitness_stagnation: bool,
    /// Exponent on `tot_n` in the steady-state parent weighting.
    pub population_mgr_efficiency: f64,
    /// Exponent on `tot_n` in selection-algorithm scores.
    pub selection_algorithm_efficiency: f64,
    /// Default recurrent priming vector.
    pub ro_signal: Vec<f64>,
    /// Saturation bound on neuron outputs.
    pub output_sat_limit: f64,
    /// Concurrent agent evaluations in the generational loop.
    pub max_parallel: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            op_modes: vec![OpMode::Gt],
            evo_alg: EvoAlg::Generational,
            selection_algorithm: SelectionAlgorithm::HofCompetition,
            survival_percentage: 0.5,
            init_specie_size: 10,
            specie_size_limit: 10,
            generation_limit: Limit::Finite(100.0),
            evaluations_limit: Limit::Inf,
            fitness_goal: Limit::Inf,
            step_size: 500,
            shof_ratio: 1.0,
            re_entry_probability: 0.0,
            fitness_stagnation: false,
            population_mgr_efficiency: 0.0,
            selection_algorithm_efficiency: 0.0,
            ro_signal: vec![0.0],
            output_sat_limit: std::f64::consts::TAU,
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}
