// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Population-level records: populations, species, champions, statistics
//! and the volatile run-status record.

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::fingerprint::Fingerprint;
use crate::ids::{AgentId, PopulationId, SpecieId};

/// Evolution loop flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvoAlg {
    Generational,
    SteadyState,
}

/// Selection algorithm tag (scores documented at the implementation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
    HofCompetition,
    HofRank,
    HofTop3,
    HofEfficiency,
    HofRandom,
}

/// Distinguisher functions partition hall-of-fame slots by structural niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distinguisher {
    /// Total neuron count.
    TotN,
    /// Number of attached sensors.
    TotSensors,
    /// Number of attached actuators.
    TotActuators,
}

/// Component-wise fitness statistics of a specie's current generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FitnessStats {
    pub avg: Vec<f64>,
    pub std: Vec<f64>,
    pub max: Vec<f64>,
    pub min: Vec<f64>,
}

/// Tracks whether a specie is still producing better champions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnovationFactor {
    pub stale_generations: u64,
    pub best_fitness_seen: f64,
}

impl Default for InnovationFactor {
    fn default() -> Self {
        InnovationFactor {
            stale_generations: 0,
            best_fitness_seen: f64::NEG_INFINITY,
        }
    }
}

/// Hall-of-fame entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Champion {
    /// Outputs of the specie's distinguishers; champions sharing this value
    /// compete for the same niche.
    pub hof_fingerprint: Vec<i64>,
    pub agent_id: AgentId,
    pub fitness: Vec<f64>,
    pub validation_fitness: Option<f64>,
    pub main_fitness: f64,
    pub tot_n: usize,
    pub generation: u64,
    pub fs: f64,
}

/// Per-specie statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecieStat {
    pub morphology: String,
    pub specie_id: SpecieId,
    pub avg_neurons: f64,
    pub std_neurons: f64,
    pub avg_fitness: Vec<f64>,
    pub std_fitness: Vec<f64>,
    pub max_fitness: Vec<f64>,
    pub min_fitness: Vec<f64>,
    /// Count of distinct fingerprints among the specie's agents.
    pub diversity: usize,
    pub tot_evaluations: u64,
    /// Nanoseconds of wall clock attributed to the snapshot window.
    pub time_ns: u128,
    pub validation_fitness: Option<f64>,
}

/// Population trace: history of stats snapshots plus evaluation totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Trace {
    /// Newest first; each element is one snapshot across all species.
    pub stats: Vec<Vec<SpecieStat>>,
    pub tot_evaluations: u64,
    pub step_size: u64,
}

/// A specie: agents sharing one constraint, with hall of fame and stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specie {
    pub id: SpecieId,
    pub population_id: PopulationId,
    pub constraint: Constraint,
    /// Current-generation membership.
    pub agent_ids: Vec<AgentId>,
    pub seed_agent_ids: Vec<AgentId>,
    pub fitness: FitnessStats,
    pub innovation: InnovationFactor,
    pub hall_of_fame: Vec<Champion>,
    pub distinguishers: Vec<Distinguisher>,
    /// Newest-first history of this specie's snapshots.
    pub stats: Vec<SpecieStat>,
}

impl Specie {
    pub fn new(id: SpecieId, population_id: PopulationId, constraint: Constraint) -> Self {
        Specie {
            id,
            population_id,
            constraint,
            agent_ids: vec![],
            seed_agent_ids: vec![],
            fitness: FitnessStats::default(),
            innovation: InnovationFactor::default(),
            hall_of_fame: vec![],
            distinguishers: vec![Distinguisher::TotN],
            stats: vec![],
        }
    }
}

/// The one active population of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub id: PopulationId,
    pub specie_ids: Vec<SpecieId>,
    pub evo_alg: EvoAlg,
    pub selection_algorithm: SelectionAlgorithm,
    pub trace: Trace,
}

/// Lifecycle control tag for a running population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    Continue,
    Pause,
    Done,
}

/// Volatile control record for the active run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStatus {
    pub op_tag: OpTag,
    pub pop_gen: u64,
    /// Evaluations since the last stats snapshot.
    pub eval_acc: u64,
    pub cycle_acc: u64,
    pub time_acc_ns: u128,
    pub tot_evaluations: u64,
    pub goal_reached: bool,
}

impl Default for PopulationStatus {
    fn default() -> Self {
        PopulationStatus {
            op_tag: OpTag::Continue,
            pop_gen: 0,
            eval_acc: 0,
            cycle_acc: 0,
            time_acc_ns: 0,
            tot_evaluations: 0,
            goal_reached: false,
        }
    }
}

/// Structural-lineage fingerprint equality shortcut used by diversity
/// counting.
pub fn distinct_fingerprints(fps: &[&Fingerprint]) -> usize {
    use std::collections::HashSet;
    let mut set = HashSet::new();
    for fp in fps {
        set.insert(*fp);
    }
    set.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innovation_default_never_beats_real_fitness() {
        let innov = InnovationFactor::default();
        assert!(0.0 > innov.best_fitness_seen);
    }

    #[test]
    fn test_distinct_fingerprints() {
        let a = Fingerprint::default();
        let b = Fingerprint::default();
        assert_eq!(distinct_fingerprints(&[&a, &b]), 1);
    }
}
